//! Key-encryption-key providers
//!
//! A [`KeyEncryption`] provider wraps and unwraps keyset material under a
//! key-encryption key held elsewhere, identified in configuration by a type
//! tag and URI. Providers are constructed through a process-wide registry of
//! factories keyed by type tag: registration is explicit and idempotent, and
//! lookup of an unregistered tag fails closed.

mod static_kms;

pub use static_kms::{StaticKeyEncryption, StaticKeyEncryptionFactory, STATIC_KEK_TYPE};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

static FACTORIES: RwLock<Option<HashMap<String, Arc<dyn KeyEncryptionFactory>>>> =
    RwLock::new(None);

/// Wraps and unwraps key material under an external key-encryption key
pub trait KeyEncryption: Send + Sync {
    /// Encrypts keyset material for storage
    fn encrypt_key(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Recovers keyset material from its encrypted form
    fn decrypt_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

impl fmt::Debug for dyn KeyEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn KeyEncryption")
    }
}

/// Builds [`KeyEncryption`] providers for one KEK type tag
pub trait KeyEncryptionFactory: Send + Sync {
    /// The type tag this factory serves
    fn kek_type(&self) -> &'static str;

    /// Creates a provider for the given configuration
    fn create(&self, config: &KekConfig) -> Result<Arc<dyn KeyEncryption>>;
}

/// Configuration of one key-encryption key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KekConfig {
    /// Type tag selecting the registered factory
    #[serde(rename = "kekType")]
    pub kek_type: String,

    /// Provider-specific key locator
    #[serde(rename = "kekUri", default)]
    pub kek_uri: String,

    /// Opaque provider-specific settings
    #[serde(rename = "kekConfig", default, skip_serializing_if = "Option::is_none")]
    pub kek_config: Option<serde_json::Value>,
}

/// Registers a KEK provider factory under its type tag
///
/// The first registration of a tag wins; repeating it is a no-op, so
/// library and host initialization can both run unconditionally.
pub fn register_kek_factory(factory: Arc<dyn KeyEncryptionFactory>) {
    let mut guard = FACTORIES.write().unwrap();
    let map = guard.get_or_insert_with(HashMap::new);
    let tag = factory.kek_type();
    if !map.contains_key(tag) {
        log::debug!("registering KEK factory for type '{}'", tag);
        map.insert(tag.to_string(), factory);
    }
}

/// Registers the factories shipped with this crate
pub fn register_builtin_kek_factories() {
    register_kek_factory(Arc::new(StaticKeyEncryptionFactory));
}

/// Creates a KEK provider from configuration
///
/// An unregistered type tag is a configuration error; it never falls back
/// to another provider.
pub fn kek_provider(config: &KekConfig) -> Result<Arc<dyn KeyEncryption>> {
    let guard = FACTORIES.read().unwrap();
    let factory = guard
        .as_ref()
        .and_then(|map| map.get(config.kek_type.as_str()))
        .ok_or_else(|| {
            Error::Configuration(format!(
                "no KEK factory registered for type '{}'",
                config.kek_type
            ))
        })?;
    factory.create(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingFactory {
        tag: &'static str,
        creations: Arc<AtomicUsize>,
    }

    impl KeyEncryptionFactory for RecordingFactory {
        fn kek_type(&self) -> &'static str {
            self.tag
        }

        fn create(&self, _config: &KekConfig) -> Result<Arc<dyn KeyEncryption>> {
            self.creations.fetch_add(1, Ordering::SeqCst);
            Err(Error::KeyEncryptionUnavailable("test factory".into()))
        }
    }

    fn config(kek_type: &str) -> KekConfig {
        KekConfig {
            kek_type: kek_type.into(),
            kek_uri: String::new(),
            kek_config: None,
        }
    }

    #[test]
    fn test_unregistered_type_fails_closed() {
        let err = kek_provider(&config("NO_SUCH_PROVIDER")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("NO_SUCH_PROVIDER"));
    }

    #[test]
    fn test_registration_is_idempotent() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        register_kek_factory(Arc::new(RecordingFactory {
            tag: "TEST_IDEMPOTENT",
            creations: Arc::clone(&first),
        }));
        register_kek_factory(Arc::new(RecordingFactory {
            tag: "TEST_IDEMPOTENT",
            creations: Arc::clone(&second),
        }));

        let _ = kek_provider(&config("TEST_IDEMPOTENT"));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_builtin_registration_provides_static() {
        register_builtin_kek_factories();
        register_builtin_kek_factories();

        let mut config = config(STATIC_KEK_TYPE);
        config.kek_config = Some(serde_json::json!({
            "key": base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                [0x55_u8; 32],
            ),
        }));
        let provider = kek_provider(&config).unwrap();

        let wrapped = provider.encrypt_key(b"inner keyset json").unwrap();
        assert_eq!(provider.decrypt_key(&wrapped).unwrap(), b"inner keyset json");
    }

    #[test]
    fn test_kek_config_parses_from_json() {
        let raw = r#"{
            "kekType": "STATIC",
            "kekConfig": {"key": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="}
        }"#;
        let config: KekConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.kek_type, "STATIC");
        assert!(config.kek_uri.is_empty());
        assert!(config.kek_config.is_some());
    }
}
