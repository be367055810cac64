//! Encrypted field envelope
//!
//! The portable form of one encrypted value: which cipher produced it, which
//! logical key it belongs to, and the payload itself. The envelope carries
//! everything deciphering needs besides the key material, so records stay
//! readable across process restarts and key rotations.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crypto::CipherSpec;
use crate::error::{Error, Result};

/// One encrypted field value
///
/// Byte-oriented ciphers store their output base64-encoded in `ciphertext`;
/// format-preserving ciphers store the formatted text directly. The
/// `algorithm` tag decides which reading applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// Stable tag of the cipher that produced the payload
    #[serde(rename = "algorithm")]
    pub algorithm: String,

    /// Logical key identifier the payload was produced under
    #[serde(rename = "keyIdentifier")]
    pub key_identifier: String,

    /// The encrypted payload
    #[serde(rename = "ciphertext")]
    pub ciphertext: String,

    /// Caller-supplied context stored alongside the payload
    #[serde(rename = "metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl EncryptedField {
    /// Wraps byte-cipher output, base64-encoding the payload
    pub fn from_bytes(spec: CipherSpec, key_identifier: &str, ciphertext: &[u8]) -> Self {
        Self {
            algorithm: spec.tag().to_string(),
            key_identifier: key_identifier.to_string(),
            ciphertext: BASE64.encode(ciphertext),
            metadata: None,
        }
    }

    /// Wraps format-preserving output, storing the text as-is
    pub fn from_text(spec: CipherSpec, key_identifier: &str, ciphertext: String) -> Self {
        Self {
            algorithm: spec.tag().to_string(),
            key_identifier: key_identifier.to_string(),
            ciphertext,
            metadata: None,
        }
    }

    /// Attaches caller metadata, replacing any existing map
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Resolves the algorithm tag, failing closed on unknown tags
    pub fn cipher_spec(&self) -> Result<CipherSpec> {
        CipherSpec::from_tag(&self.algorithm)
    }

    /// Decodes the payload of a byte-oriented cipher
    pub fn byte_payload(&self) -> Result<Vec<u8>> {
        BASE64.decode(&self.ciphertext).map_err(|_| {
            Error::AuthenticationFailure("encrypted payload is not valid base64".into())
        })
    }

    /// Returns the payload of a format-preserving cipher
    pub fn text_payload(&self) -> &str {
        &self.ciphertext
    }

    /// Serializes the envelope as compact JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses an envelope from its JSON form
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_names() {
        let field = EncryptedField::from_bytes(CipherSpec::AesGcm, "payments-key", &[1, 2, 3]);
        let json = field.to_json().unwrap();

        assert!(json.contains(r#""algorithm":"AEAD/AES_GCM""#));
        assert!(json.contains(r#""keyIdentifier":"payments-key""#));
        assert!(json.contains(r#""ciphertext":"AQID""#));
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn test_round_trip_with_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("table".to_string(), "customers".to_string());
        metadata.insert("column".to_string(), "iban".to_string());

        let field = EncryptedField::from_bytes(CipherSpec::AesSiv, "pii-key", &[9; 24])
            .with_metadata(metadata);
        let parsed = EncryptedField::from_json(&field.to_json().unwrap()).unwrap();

        assert_eq!(parsed, field);
        assert_eq!(
            parsed.metadata.as_ref().unwrap().get("column").unwrap(),
            "iban"
        );
    }

    #[test]
    fn test_byte_payload_round_trip() {
        let field = EncryptedField::from_bytes(CipherSpec::AesGcm, "k", &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(field.byte_payload().unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_text_payload_is_verbatim() {
        let field = EncryptedField::from_text(CipherSpec::Ff3, "k", "8812719303".into());
        assert_eq!(field.text_payload(), "8812719303");
        let json = field.to_json().unwrap();
        assert!(json.contains(r#""ciphertext":"8812719303""#));
    }

    #[test]
    fn test_unknown_algorithm_fails_closed() {
        let mut field = EncryptedField::from_bytes(CipherSpec::AesGcm, "k", &[1]);
        field.algorithm = "AEAD/TWOFISH".into();
        assert!(matches!(
            field.cipher_spec(),
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_corrupt_base64_payload_rejected() {
        let mut field = EncryptedField::from_bytes(CipherSpec::AesGcm, "k", &[1, 2, 3]);
        field.ciphertext = "@@@".into();
        assert!(matches!(
            field.byte_payload(),
            Err(Error::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_missing_required_field_is_configuration_error() {
        let raw = r#"{"algorithm": "AEAD/AES_GCM", "ciphertext": "AQID"}"#;
        assert!(matches!(
            EncryptedField::from_json(raw),
            Err(Error::Configuration(_))
        ));
    }
}
