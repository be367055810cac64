//! Declarative engine configuration
//!
//! [`CipherConfig`] is the JSON document a deployment ships: where key
//! material lives, how it is protected, and which defaults apply. Building a
//! [`FieldCipher`] from it wires up the matching resolver, KEK provider and
//! vault; the secret-store sources additionally need the store's resolver
//! injected by the host.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cipher::{FieldCipher, FieldCipherBuilder};
use crate::crypto::CipherSpec;
use crate::error::{Error, Result};
use crate::fpe::{Alphabet, Tweak};
use crate::keyset::{DataKeyConfig, EncryptedDataKeyConfig};
use crate::kms::{self, KekConfig, KeyEncryption};
use crate::vault::{
    ConfigSecretResolver, EncryptedConfigSecretResolver, KekUnwrappingResolver, KeyVault,
    SecretResolver, StandardKeyVault,
};

/// Where keyset material comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeySource {
    /// Plaintext keysets inline in the configuration
    #[serde(rename = "CONFIG")]
    Config,
    /// KEK-wrapped keysets inline in the configuration
    #[serde(rename = "CONFIG_ENCRYPTED")]
    ConfigEncrypted,
    /// Plaintext keysets fetched from an injected secret store
    #[serde(rename = "SECRET_STORE")]
    SecretStore,
    /// KEK-wrapped keysets fetched from an injected secret store
    #[serde(rename = "SECRET_STORE_ENCRYPTED")]
    SecretStoreEncrypted,
}

impl KeySource {
    fn name(&self) -> &'static str {
        match self {
            KeySource::Config => "CONFIG",
            KeySource::ConfigEncrypted => "CONFIG_ENCRYPTED",
            KeySource::SecretStore => "SECRET_STORE",
            KeySource::SecretStoreEncrypted => "SECRET_STORE_ENCRYPTED",
        }
    }
}

/// Format-preserving encryption settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FpeConfig {
    /// Alphabet symbols, in numeral order; decimal digits when absent
    #[serde(rename = "alphabet", default, skip_serializing_if = "Option::is_none")]
    pub alphabet: Option<String>,

    /// Base64 tweak bytes (7, or 8 for legacy payloads); zero when absent
    #[serde(rename = "tweak", default, skip_serializing_if = "Option::is_none")]
    pub tweak: Option<String>,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherConfig {
    #[serde(rename = "keySource")]
    pub key_source: KeySource,

    /// Key used when a call names none
    #[serde(rename = "defaultKeyIdentifier")]
    pub default_key_identifier: String,

    /// Cipher used when a call names none; probabilistic AEAD when absent
    #[serde(rename = "defaultCipher", default, skip_serializing_if = "Option::is_none")]
    pub default_cipher: Option<CipherSpec>,

    /// Keysets for the `CONFIG` source
    #[serde(rename = "dataKeys", default, skip_serializing_if = "Vec::is_empty")]
    pub data_keys: Vec<DataKeyConfig>,

    /// Wrapped keysets for the `CONFIG_ENCRYPTED` source
    #[serde(
        rename = "encryptedDataKeys",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub encrypted_data_keys: Vec<EncryptedDataKeyConfig>,

    /// Key-encryption key for the encrypted sources
    #[serde(rename = "kek", default, skip_serializing_if = "Option::is_none")]
    pub kek: Option<KekConfig>,

    /// Resolve every identifier at build time instead of on first use
    #[serde(rename = "eagerKeyResolution", default)]
    pub eager_key_resolution: bool,

    #[serde(rename = "fpe", default, skip_serializing_if = "Option::is_none")]
    pub fpe: Option<FpeConfig>,
}

impl CipherConfig {
    /// Parses a configuration document, strictly
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Builds the engine for the configuration-backed key sources
    ///
    /// The secret-store sources cannot be served from configuration alone
    /// and fail here; use [`CipherConfig::build_cipher_with_store`].
    pub fn build_cipher(&self) -> Result<FieldCipher> {
        match self.key_source {
            KeySource::Config | KeySource::ConfigEncrypted => {
                self.assemble(self.config_resolver()?)
            }
            source => Err(Error::Configuration(format!(
                "key source {} requires an injected secret store resolver",
                source.name()
            ))),
        }
    }

    /// Builds the engine with an injected secret store resolver
    ///
    /// For `SECRET_STORE` the store's documents are used as-is; for
    /// `SECRET_STORE_ENCRYPTED` every fetched document is unwrapped with the
    /// configured KEK first.
    pub fn build_cipher_with_store(&self, store: Arc<dyn SecretResolver>) -> Result<FieldCipher> {
        let resolver: Arc<dyn SecretResolver> = match self.key_source {
            KeySource::SecretStore => store,
            KeySource::SecretStoreEncrypted => {
                Arc::new(KekUnwrappingResolver::new(store, self.kek_provider()?))
            }
            source => {
                return Err(Error::Configuration(format!(
                    "key source {} does not take a secret store resolver",
                    source.name()
                )))
            }
        };
        self.assemble(resolver)
    }

    fn config_resolver(&self) -> Result<Arc<dyn SecretResolver>> {
        match self.key_source {
            KeySource::Config => {
                if self.data_keys.is_empty() {
                    return Err(Error::Configuration(
                        "key source CONFIG requires a dataKeys section".into(),
                    ));
                }
                Ok(Arc::new(ConfigSecretResolver::new(self.data_keys.clone())?))
            }
            KeySource::ConfigEncrypted => {
                if self.encrypted_data_keys.is_empty() {
                    return Err(Error::Configuration(
                        "key source CONFIG_ENCRYPTED requires an encryptedDataKeys section"
                            .into(),
                    ));
                }
                Ok(Arc::new(EncryptedConfigSecretResolver::new(
                    self.encrypted_data_keys.clone(),
                    self.kek_provider()?,
                )?))
            }
            source => Err(Error::Configuration(format!(
                "key source {} is not configuration backed",
                source.name()
            ))),
        }
    }

    fn kek_provider(&self) -> Result<Arc<dyn KeyEncryption>> {
        let kek = self.kek.as_ref().ok_or_else(|| {
            Error::Configuration(format!(
                "key source {} requires a kek section",
                self.key_source.name()
            ))
        })?;
        kms::register_builtin_kek_factories();
        kms::kek_provider(kek)
    }

    fn assemble(&self, resolver: Arc<dyn SecretResolver>) -> Result<FieldCipher> {
        let vault: Arc<dyn KeyVault> = if self.eager_key_resolution {
            Arc::new(StandardKeyVault::eager(resolver)?)
        } else {
            Arc::new(StandardKeyVault::lazy(resolver))
        };

        let mut builder: FieldCipherBuilder = FieldCipher::builder()
            .with_vault(vault)
            .with_default_key(&self.default_key_identifier);
        if let Some(spec) = self.default_cipher {
            builder = builder.with_default_cipher(spec);
        }
        if let Some(fpe) = &self.fpe {
            if let Some(symbols) = &fpe.alphabet {
                builder = builder.with_alphabet(Alphabet::new(symbols)?);
            }
            if let Some(encoded) = &fpe.tweak {
                let bytes = BASE64.decode(encoded).map_err(|e| {
                    Error::Configuration(format!("fpe tweak is not valid base64: {}", e))
                })?;
                builder = builder.with_tweak(Tweak::new(&bytes)?);
            }
        }
        builder.build()
    }
}
