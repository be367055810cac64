//! Write-once caching key vault

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::keyset::KeyMaterial;
use crate::metrics::counter;
use crate::vault::{KeyVault, SecretResolver};

/// Key vault backed by a [`SecretResolver`]
///
/// Each identifier is resolved at most once for the vault's lifetime; the
/// resulting material is immutable until the process restarts. Concurrent
/// first requests for one identifier are serialized through a per-identifier
/// gate so the resolver sees a single fetch.
pub struct StandardKeyVault {
    resolver: Arc<dyn SecretResolver>,
    cache: RwLock<HashMap<String, Arc<KeyMaterial>>>,
    // One gate per identifier, kept for the vault's lifetime.
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StandardKeyVault {
    /// Creates a vault that resolves identifiers on first use
    pub fn lazy(resolver: Arc<dyn SecretResolver>) -> Self {
        Self {
            resolver,
            cache: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a vault with every listed identifier resolved up front
    ///
    /// Any identifier that fails to resolve fails the construction, so a
    /// misconfigured deployment surfaces at startup rather than mid-request.
    pub fn eager(resolver: Arc<dyn SecretResolver>) -> Result<Self> {
        let vault = Self::lazy(resolver);
        for identifier in vault.resolver.list_identifiers()? {
            vault.key(&identifier)?;
        }
        log::debug!("eagerly resolved {} key identifiers", vault.key_count());
        Ok(vault)
    }

    fn gate(&self, identifier: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap();
        Arc::clone(gates.entry(identifier.to_string()).or_default())
    }
}

impl KeyVault for StandardKeyVault {
    fn key(&self, identifier: &str) -> Result<Arc<KeyMaterial>> {
        if let Some(material) = self.cache.read().unwrap().get(identifier) {
            return Ok(Arc::clone(material));
        }

        let gate = self.gate(identifier);
        let _resolving = gate.lock().unwrap();

        // A concurrent caller may have resolved while we waited on the gate.
        if let Some(material) = self.cache.read().unwrap().get(identifier) {
            return Ok(Arc::clone(material));
        }

        log::debug!("resolving key material for '{}'", identifier);
        counter!("fieldenc.vault.resolve");
        let mut raw = self.resolver.fetch_secret(identifier)?;
        let parsed = KeyMaterial::from_json(&raw);
        raw.zeroize();
        let material = Arc::new(parsed?);

        let mut cache = self.cache.write().unwrap();
        match cache.get(identifier) {
            // Cache entries are write-once; an existing entry is never
            // replaced, only checked against the fresh resolution.
            Some(existing) => {
                if existing.equivalent(&material) {
                    Ok(Arc::clone(existing))
                } else {
                    Err(Error::Configuration(format!(
                        "resolver returned diverging key material for '{}'",
                        identifier
                    )))
                }
            }
            None => {
                cache.insert(identifier.to_string(), Arc::clone(&material));
                Ok(material)
            }
        }
    }

    fn key_count(&self) -> usize {
        self.cache.read().unwrap().len()
    }
}
