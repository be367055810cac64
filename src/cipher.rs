//! Field cipher facade
//!
//! [`FieldCipher`] ties the pieces together: a key vault for material, a
//! default key and cipher for the common case, and per-call options for the
//! rest. Byte values go through [`FieldCipher::encipher`]; string values may
//! also use the format-preserving path via [`FieldCipher::encipher_text`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::crypto::{
    AeadCipher, CipherSpec, DeterministicAeadCipher, FormatPreservingCipher, KeysetAead,
    KeysetDeterministicAead, KeysetFpe,
};
use crate::envelope::EncryptedField;
use crate::error::{Error, Result};
use crate::fpe::{Alphabet, Tweak};
use crate::metrics::timer;
use crate::vault::KeyVault;

/// Per-call settings for encipher and decipher operations
///
/// Everything is optional; unset fields fall back to the cipher's defaults.
#[derive(Default, Clone)]
pub struct FieldOptions {
    key_identifier: Option<String>,
    cipher: Option<CipherSpec>,
    associated_data: Option<Vec<u8>>,
    alphabet: Option<Alphabet>,
    tweak: Option<Tweak>,
    metadata: Option<BTreeMap<String, String>>,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enciphers under this key instead of the configured default
    pub fn with_key_identifier(mut self, identifier: &str) -> Self {
        self.key_identifier = Some(identifier.to_string());
        self
    }

    /// Enciphers with this cipher instead of the configured default
    pub fn with_cipher(mut self, spec: CipherSpec) -> Self {
        self.cipher = Some(spec);
        self
    }

    /// Binds the payload to associated data
    ///
    /// Deciphering must supply the same bytes or fail authentication. Only
    /// the AEAD families consume this.
    pub fn with_associated_data(mut self, associated_data: &[u8]) -> Self {
        self.associated_data = Some(associated_data.to_vec());
        self
    }

    /// Uses this alphabet for format-preserving calls
    ///
    /// Deciphering must supply the same alphabet the value was enciphered
    /// under.
    pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = Some(alphabet);
        self
    }

    /// Uses this tweak for format-preserving calls
    pub fn with_tweak(mut self, tweak: Tweak) -> Self {
        self.tweak = Some(tweak);
        self
    }

    /// Stores caller metadata in the produced envelope
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn associated_data(&self) -> &[u8] {
        self.associated_data.as_deref().unwrap_or(b"")
    }
}

/// Field-level encryption engine
pub struct FieldCipher {
    vault: Arc<dyn KeyVault>,
    default_key: String,
    default_cipher: CipherSpec,
    alphabet: Alphabet,
    tweak: Tweak,
}

impl FieldCipher {
    pub fn builder() -> FieldCipherBuilder {
        FieldCipherBuilder::default()
    }

    /// The vault this cipher resolves keys through
    pub fn vault(&self) -> &Arc<dyn KeyVault> {
        &self.vault
    }

    /// Enciphers a byte value into an envelope
    ///
    /// Serves the AEAD families; format-preserving encryption is defined
    /// over text and must go through [`FieldCipher::encipher_text`].
    pub fn encipher(&self, plaintext: &[u8], options: &FieldOptions) -> Result<EncryptedField> {
        timer!("fieldenc.encipher");
        let key_identifier = options
            .key_identifier
            .as_deref()
            .unwrap_or(&self.default_key);
        let spec = options.cipher.unwrap_or(self.default_cipher);
        log::debug!("enciphering field under '{}' with {}", key_identifier, spec);

        let material = self.vault.key(key_identifier)?;
        let ciphertext = match spec {
            CipherSpec::AesGcm => {
                KeysetAead::new(&material).encrypt(plaintext, options.associated_data())?
            }
            CipherSpec::AesSiv => KeysetDeterministicAead::new(&material)
                .encrypt_deterministically(plaintext, options.associated_data())?,
            CipherSpec::Ff3 => {
                return Err(Error::UnsupportedOperation(
                    "format-preserving encryption applies to text values".into(),
                ))
            }
        };

        let field = EncryptedField::from_bytes(spec, key_identifier, &ciphertext);
        Ok(match &options.metadata {
            Some(metadata) => field.with_metadata(metadata.clone()),
            None => field,
        })
    }

    /// Deciphers an envelope back to its byte value
    pub fn decipher(&self, field: &EncryptedField, options: &FieldOptions) -> Result<Vec<u8>> {
        timer!("fieldenc.decipher");
        let spec = field.cipher_spec()?;
        log::debug!(
            "deciphering field under '{}' with {}",
            field.key_identifier,
            spec
        );

        let material = self.vault.key(&field.key_identifier)?;
        match spec {
            CipherSpec::AesGcm => KeysetAead::new(&material)
                .decrypt(&field.byte_payload()?, options.associated_data()),
            CipherSpec::AesSiv => KeysetDeterministicAead::new(&material)
                .decrypt_deterministically(&field.byte_payload()?, options.associated_data()),
            CipherSpec::Ff3 => Err(Error::UnsupportedOperation(
                "format-preserving payloads decipher to text values".into(),
            )),
        }
    }

    /// Enciphers a text value into an envelope
    ///
    /// With a format-preserving cipher selected the output keeps the input's
    /// length and alphabet; the AEAD families encrypt the UTF-8 bytes.
    pub fn encipher_text(&self, plaintext: &str, options: &FieldOptions) -> Result<EncryptedField> {
        let spec = options.cipher.unwrap_or(self.default_cipher);
        if spec != CipherSpec::Ff3 {
            return self.encipher(plaintext.as_bytes(), options);
        }

        timer!("fieldenc.encipher");
        let key_identifier = options
            .key_identifier
            .as_deref()
            .unwrap_or(&self.default_key);
        log::debug!("enciphering field under '{}' with {}", key_identifier, spec);

        let material = self.vault.key(key_identifier)?;
        let alphabet = options.alphabet.as_ref().unwrap_or(&self.alphabet);
        let tweak = options.tweak.as_ref().unwrap_or(&self.tweak);
        let ciphertext = KeysetFpe::new(&material, alphabet).encrypt_text(plaintext, tweak)?;

        let field = EncryptedField::from_text(spec, key_identifier, ciphertext);
        Ok(match &options.metadata {
            Some(metadata) => field.with_metadata(metadata.clone()),
            None => field,
        })
    }

    /// Deciphers an envelope back to its text value
    pub fn decipher_text(&self, field: &EncryptedField, options: &FieldOptions) -> Result<String> {
        match field.cipher_spec()? {
            CipherSpec::Ff3 => {
                timer!("fieldenc.decipher");
                log::debug!(
                    "deciphering field under '{}' with {}",
                    field.key_identifier,
                    CipherSpec::Ff3
                );
                let material = self.vault.key(&field.key_identifier)?;
                let alphabet = options.alphabet.as_ref().unwrap_or(&self.alphabet);
                let tweak = options.tweak.as_ref().unwrap_or(&self.tweak);
                KeysetFpe::new(&material, alphabet).decrypt_text(field.text_payload(), tweak)
            }
            _ => String::from_utf8(self.decipher(field, options)?).map_err(|_| {
                Error::DomainValidation("deciphered payload is not valid UTF-8".into())
            }),
        }
    }
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher")
            .field("default_key", &self.default_key)
            .field("default_cipher", &self.default_cipher)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FieldCipher`]
///
/// A vault and a default key identifier are required; the default cipher is
/// probabilistic AEAD and the format-preserving defaults are decimal digits
/// with a zero tweak.
#[derive(Default)]
pub struct FieldCipherBuilder {
    vault: Option<Arc<dyn KeyVault>>,
    default_key: Option<String>,
    default_cipher: Option<CipherSpec>,
    alphabet: Option<Alphabet>,
    tweak: Option<Tweak>,
}

impl FieldCipherBuilder {
    pub fn with_vault(mut self, vault: Arc<dyn KeyVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn with_default_key(mut self, identifier: &str) -> Self {
        self.default_key = Some(identifier.to_string());
        self
    }

    pub fn with_default_cipher(mut self, spec: CipherSpec) -> Self {
        self.default_cipher = Some(spec);
        self
    }

    pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = Some(alphabet);
        self
    }

    pub fn with_tweak(mut self, tweak: Tweak) -> Self {
        self.tweak = Some(tweak);
        self
    }

    pub fn build(self) -> Result<FieldCipher> {
        let vault = self
            .vault
            .ok_or_else(|| Error::Configuration("field cipher requires a key vault".into()))?;
        let default_key = self.default_key.ok_or_else(|| {
            Error::Configuration("field cipher requires a default key identifier".into())
        })?;

        Ok(FieldCipher {
            vault,
            default_key,
            default_cipher: self.default_cipher.unwrap_or(CipherSpec::AesGcm),
            alphabet: self.alphabet.unwrap_or_else(Alphabet::digits),
            tweak: self.tweak.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyset::{
        DataKeyConfig, KeyData, KeyEntry, KeysetConfig, KeyStatus, OutputFormat,
        KEYSET_FORMAT_VERSION,
    };
    use crate::vault::{ConfigSecretResolver, StandardKeyVault};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    fn data_key(identifier: &str, key: &[u8]) -> DataKeyConfig {
        DataKeyConfig {
            identifier: identifier.into(),
            material: KeysetConfig {
                primary_key_id: 1,
                key: vec![KeyEntry {
                    key_id: 1,
                    status: KeyStatus::Enabled,
                    key_data: KeyData {
                        type_tag: "fieldencryption/aes".into(),
                        value: BASE64.encode(key),
                        output_format: OutputFormat::Prefixed,
                    },
                }],
                version: KEYSET_FORMAT_VERSION,
            },
        }
    }

    fn cipher() -> FieldCipher {
        let resolver = ConfigSecretResolver::new(vec![
            data_key("aead-key", &[0x10; 32]),
            data_key("siv-key", &[0x20; 64]),
            data_key("fpe-key", &[0x30; 32]),
        ])
        .unwrap();
        let vault = Arc::new(StandardKeyVault::lazy(Arc::new(resolver)));
        FieldCipher::builder()
            .with_vault(vault)
            .with_default_key("aead-key")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_vault_and_key() {
        assert!(matches!(
            FieldCipher::builder().build(),
            Err(Error::Configuration(_))
        ));

        let resolver = ConfigSecretResolver::new(vec![]).unwrap();
        let vault = Arc::new(StandardKeyVault::lazy(Arc::new(resolver)));
        assert!(matches!(
            FieldCipher::builder().with_vault(vault).build(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_default_aead_round_trip() {
        let cipher = cipher();
        let field = cipher.encipher(b"card number", &FieldOptions::new()).unwrap();

        assert_eq!(field.algorithm, "AEAD/AES_GCM");
        assert_eq!(field.key_identifier, "aead-key");
        assert_eq!(
            cipher.decipher(&field, &FieldOptions::new()).unwrap(),
            b"card number"
        );
    }

    #[test]
    fn test_aead_is_probabilistic() {
        let cipher = cipher();
        let a = cipher.encipher(b"same value", &FieldOptions::new()).unwrap();
        let b = cipher.encipher(b"same value", &FieldOptions::new()).unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_deterministic_cipher_selection() {
        let cipher = cipher();
        let options = FieldOptions::new()
            .with_cipher(CipherSpec::AesSiv)
            .with_key_identifier("siv-key");

        let a = cipher.encipher(b"lookup token", &options).unwrap();
        let b = cipher.encipher(b"lookup token", &options).unwrap();
        assert_eq!(a.ciphertext, b.ciphertext);
        assert_eq!(a.algorithm, "DAEAD/AES_SIV");
        assert_eq!(cipher.decipher(&a, &options).unwrap(), b"lookup token");
    }

    #[test]
    fn test_associated_data_must_match() {
        let cipher = cipher();
        let options = FieldOptions::new().with_associated_data(b"row-42");
        let field = cipher.encipher(b"bound value", &options).unwrap();

        assert_eq!(cipher.decipher(&field, &options).unwrap(), b"bound value");
        assert!(matches!(
            cipher.decipher(&field, &FieldOptions::new()),
            Err(Error::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_format_preserving_round_trip() {
        let cipher = cipher();
        let options = FieldOptions::new()
            .with_cipher(CipherSpec::Ff3)
            .with_key_identifier("fpe-key");

        let field = cipher.encipher_text("5544600070008000", &options).unwrap();
        assert_eq!(field.algorithm, "FPE/FF3_1");
        assert_eq!(field.ciphertext.len(), 16);
        assert!(field.ciphertext.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(field.ciphertext, "5544600070008000");

        assert_eq!(
            cipher.decipher_text(&field, &options).unwrap(),
            "5544600070008000"
        );
    }

    #[test]
    fn test_format_preserving_respects_tweak() {
        let cipher = cipher();
        let base = FieldOptions::new()
            .with_cipher(CipherSpec::Ff3)
            .with_key_identifier("fpe-key");
        let tweaked = base
            .clone()
            .with_tweak(Tweak::new(&[1, 2, 3, 4, 5, 6, 7]).unwrap());

        let a = cipher.encipher_text("1234567890", &base).unwrap();
        let b = cipher.encipher_text("1234567890", &tweaked).unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);

        // Deciphering under the wrong tweak yields a different value, not an
        // error; the tweak is part of the call contract.
        assert_ne!(
            cipher.decipher_text(&b, &base).unwrap(),
            "1234567890"
        );
        assert_eq!(cipher.decipher_text(&b, &tweaked).unwrap(), "1234567890");
    }

    #[test]
    fn test_per_call_alphabet_override() {
        let cipher = cipher();
        let options = FieldOptions::new()
            .with_cipher(CipherSpec::Ff3)
            .with_key_identifier("fpe-key")
            .with_alphabet(Alphabet::new("0123456789abcdef").unwrap());

        let field = cipher.encipher_text("deadbeef4077", &options).unwrap();
        assert_eq!(field.ciphertext.len(), 12);
        assert!(field
            .ciphertext
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(cipher.decipher_text(&field, &options).unwrap(), "deadbeef4077");

        // The configured default alphabet cannot read hex symbols.
        let without_override = FieldOptions::new()
            .with_cipher(CipherSpec::Ff3)
            .with_key_identifier("fpe-key");
        assert!(cipher.decipher_text(&field, &without_override).is_err());
    }

    #[test]
    fn test_short_fpe_input_rejected() {
        let cipher = cipher();
        let options = FieldOptions::new()
            .with_cipher(CipherSpec::Ff3)
            .with_key_identifier("fpe-key");
        assert!(matches!(
            cipher.encipher_text("2025", &options),
            Err(Error::DomainValidation(_))
        ));
    }

    #[test]
    fn test_fpe_rejects_byte_api() {
        let cipher = cipher();
        let options = FieldOptions::new().with_cipher(CipherSpec::Ff3);
        assert!(matches!(
            cipher.encipher(b"123456", &options),
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_text_under_aead_round_trips() {
        let cipher = cipher();
        let field = cipher
            .encipher_text("not format preserved", &FieldOptions::new())
            .unwrap();
        assert_eq!(field.algorithm, "AEAD/AES_GCM");
        assert_eq!(
            cipher.decipher_text(&field, &FieldOptions::new()).unwrap(),
            "not format preserved"
        );
    }

    #[test]
    fn test_metadata_lands_in_envelope() {
        let cipher = cipher();
        let mut metadata = BTreeMap::new();
        metadata.insert("origin".to_string(), "unit-test".to_string());
        let field = cipher
            .encipher(b"x", &FieldOptions::new().with_metadata(metadata))
            .unwrap();
        assert_eq!(
            field.metadata.unwrap().get("origin").map(String::as_str),
            Some("unit-test")
        );
    }

    #[test]
    fn test_unknown_key_identifier() {
        let cipher = cipher();
        let options = FieldOptions::new().with_key_identifier("no-such-key");
        assert!(matches!(
            cipher.encipher(b"x", &options),
            Err(Error::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_empty_plaintext_round_trips() {
        let cipher = cipher();
        let field = cipher.encipher(b"", &FieldOptions::new()).unwrap();
        assert_eq!(
            cipher.decipher(&field, &FieldOptions::new()).unwrap(),
            Vec::<u8>::new()
        );
    }
}
