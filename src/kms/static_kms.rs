//! KEK provider backed by a key supplied directly in configuration
//!
//! Useful for tests and for deployments where the KEK is injected through a
//! secret-managed environment rather than fetched from a cloud KMS. The key
//! protects keyset material with AES-GCM.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;

use crate::crypto::{AeadCipher, AesGcmCipher};
use crate::error::{Error, Result};
use crate::kms::{KekConfig, KeyEncryption, KeyEncryptionFactory};

/// Type tag under which the static provider registers
pub const STATIC_KEK_TYPE: &str = "STATIC";

/// KEK provider holding its key in process memory
pub struct StaticKeyEncryption {
    aead: AesGcmCipher,
}

impl StaticKeyEncryption {
    /// Creates the provider from a raw 16 or 32 byte key
    pub fn new(key: &[u8]) -> Result<Self> {
        Ok(Self {
            aead: AesGcmCipher::new(key)?,
        })
    }
}

impl KeyEncryption for StaticKeyEncryption {
    fn encrypt_key(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.aead.encrypt(plaintext, b"")
    }

    fn decrypt_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.aead.decrypt(ciphertext, b"")
    }
}

/// Factory for [`StaticKeyEncryption`]
///
/// Expects the raw key as base64 under the `key` field of the provider
/// configuration.
pub struct StaticKeyEncryptionFactory;

impl KeyEncryptionFactory for StaticKeyEncryptionFactory {
    fn kek_type(&self) -> &'static str {
        STATIC_KEK_TYPE
    }

    fn create(&self, config: &KekConfig) -> Result<Arc<dyn KeyEncryption>> {
        let encoded = config
            .kek_config
            .as_ref()
            .and_then(|c| c.get("key"))
            .and_then(|k| k.as_str())
            .ok_or_else(|| {
                Error::Configuration(
                    "static KEK configuration requires a base64 'key' field".into(),
                )
            })?;
        let key = BASE64.decode(encoded).map_err(|e| {
            Error::Configuration(format!("static KEK key is not valid base64: {}", e))
        })?;
        Ok(Arc::new(StaticKeyEncryption::new(&key)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let kek = StaticKeyEncryption::new(&[0xA5; 32]).unwrap();
        let wrapped = kek.encrypt_key(b"keyset bytes").unwrap();
        assert_ne!(wrapped, b"keyset bytes");
        assert_eq!(kek.decrypt_key(&wrapped).unwrap(), b"keyset bytes");
    }

    #[test]
    fn test_tampered_wrapping_rejected() {
        let kek = StaticKeyEncryption::new(&[0xA5; 32]).unwrap();
        let mut wrapped = kek.encrypt_key(b"keyset bytes").unwrap();
        let last = wrapped.len() - 1;
        wrapped[last] ^= 1;
        assert!(matches!(
            kek.decrypt_key(&wrapped),
            Err(Error::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let kek_a = StaticKeyEncryption::new(&[0xA5; 32]).unwrap();
        let kek_b = StaticKeyEncryption::new(&[0x5A; 32]).unwrap();
        let wrapped = kek_a.encrypt_key(b"keyset bytes").unwrap();
        assert!(kek_b.decrypt_key(&wrapped).is_err());
    }

    #[test]
    fn test_factory_requires_key_field() {
        let config = KekConfig {
            kek_type: STATIC_KEK_TYPE.into(),
            kek_uri: String::new(),
            kek_config: Some(serde_json::json!({})),
        };
        assert!(matches!(
            StaticKeyEncryptionFactory.create(&config),
            Err(Error::Configuration(_))
        ));

        let config = KekConfig {
            kek_type: STATIC_KEK_TYPE.into(),
            kek_uri: String::new(),
            kek_config: None,
        };
        assert!(matches!(
            StaticKeyEncryptionFactory.create(&config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_factory_rejects_bad_base64() {
        let config = KekConfig {
            kek_type: STATIC_KEK_TYPE.into(),
            kek_uri: String::new(),
            kek_config: Some(serde_json::json!({"key": "%%%"})),
        };
        assert!(matches!(
            StaticKeyEncryptionFactory.create(&config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_factory_builds_working_provider() {
        let config = KekConfig {
            kek_type: STATIC_KEK_TYPE.into(),
            kek_uri: "static://unit-test".into(),
            kek_config: Some(serde_json::json!({"key": BASE64.encode([0x11_u8; 16])})),
        };
        let provider = StaticKeyEncryptionFactory.create(&config).unwrap();
        let wrapped = provider.encrypt_key(b"p").unwrap();
        assert_eq!(provider.decrypt_key(&wrapped).unwrap(), b"p");
    }
}
