//! Configuration-backed secret resolvers and resolver adapters

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::keyset::{DataKeyConfig, EncryptedDataKeyConfig};
use crate::kms::KeyEncryption;
use crate::vault::SecretResolver;

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut ids: Vec<String> = map.keys().cloned().collect();
    ids.sort();
    ids
}

fn index_unique<T, F>(items: Vec<T>, identifier: F) -> Result<HashMap<String, T>>
where
    F: Fn(&T) -> &str,
{
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        let id = identifier(&item).to_string();
        if map.insert(id.clone(), item).is_some() {
            return Err(Error::Configuration(format!(
                "duplicate key identifier '{}' in configuration",
                id
            )));
        }
    }
    Ok(map)
}

/// Resolver over keysets carried in plaintext configuration
pub struct ConfigSecretResolver {
    documents: HashMap<String, Vec<u8>>,
}

impl ConfigSecretResolver {
    /// Indexes the configured data keys, rejecting duplicate identifiers
    pub fn new(data_keys: Vec<DataKeyConfig>) -> Result<Self> {
        let indexed = index_unique(data_keys, |dk| dk.identifier.as_str())?;
        let mut documents = HashMap::with_capacity(indexed.len());
        for (identifier, data_key) in indexed {
            documents.insert(identifier, serde_json::to_vec(&data_key.material)?);
        }
        Ok(Self { documents })
    }
}

impl SecretResolver for ConfigSecretResolver {
    fn list_identifiers(&self) -> Result<Vec<String>> {
        Ok(sorted_keys(&self.documents))
    }

    fn fetch_secret(&self, identifier: &str) -> Result<Vec<u8>> {
        self.documents
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(identifier.to_string()))
    }
}

/// Adapter that KEK-unwraps every secret fetched from an inner resolver
///
/// Turns a resolver over wrapped blobs into a resolver over keyset-config
/// documents. Pairs with an external secret store holding KMS ciphertext.
pub struct KekUnwrappingResolver {
    inner: Arc<dyn SecretResolver>,
    kek: Arc<dyn KeyEncryption>,
}

impl KekUnwrappingResolver {
    pub fn new(inner: Arc<dyn SecretResolver>, kek: Arc<dyn KeyEncryption>) -> Self {
        Self { inner, kek }
    }
}

impl SecretResolver for KekUnwrappingResolver {
    fn list_identifiers(&self) -> Result<Vec<String>> {
        self.inner.list_identifiers()
    }

    fn fetch_secret(&self, identifier: &str) -> Result<Vec<u8>> {
        let wrapped = self.inner.fetch_secret(identifier)?;
        self.kek.decrypt_key(&wrapped)
    }
}

/// Resolver over KEK-wrapped keysets carried in configuration
///
/// Each configured value is base64 KMS ciphertext of a keyset-config JSON
/// document. Unwrapping happens on fetch, so a vault in lazy mode touches
/// the KEK provider only for identifiers that are actually used.
pub struct EncryptedConfigSecretResolver {
    entries: HashMap<String, EncryptedDataKeyConfig>,
    kek: Arc<dyn KeyEncryption>,
}

impl EncryptedConfigSecretResolver {
    /// Indexes the wrapped data keys, rejecting duplicate identifiers
    pub fn new(
        encrypted_keys: Vec<EncryptedDataKeyConfig>,
        kek: Arc<dyn KeyEncryption>,
    ) -> Result<Self> {
        Ok(Self {
            entries: index_unique(encrypted_keys, |ek| ek.identifier.as_str())?,
            kek,
        })
    }
}

impl SecretResolver for EncryptedConfigSecretResolver {
    fn list_identifiers(&self) -> Result<Vec<String>> {
        Ok(sorted_keys(&self.entries))
    }

    fn fetch_secret(&self, identifier: &str) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(identifier)
            .ok_or_else(|| Error::KeyNotFound(identifier.to_string()))?;
        self.kek.decrypt_key(&entry.ciphertext()?)
    }
}
