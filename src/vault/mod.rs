//! Key vaults and secret resolution
//!
//! A [`KeyVault`] turns logical key identifiers into validated
//! [`KeyMaterial`](crate::keyset::KeyMaterial), caching each resolution for
//! the life of the vault. Where the raw keyset bytes come from is the
//! [`SecretResolver`]'s concern: built-in resolvers read from configuration
//! (plain or KEK-wrapped); deployments with an external secret store plug in
//! their own. Resolvers compose, so a store of KEK-wrapped secrets is just a
//! store resolver behind [`KekUnwrappingResolver`].

mod resolvers;
mod standard;

pub use resolvers::{ConfigSecretResolver, EncryptedConfigSecretResolver, KekUnwrappingResolver};
pub use standard::StandardKeyVault;

use std::sync::Arc;

use crate::error::Result;
use crate::keyset::KeyMaterial;

/// Resolves logical key identifiers to cached key material
pub trait KeyVault: Send + Sync {
    /// Returns the material for an identifier, resolving it on first use
    ///
    /// Resolution happens at most once per identifier; afterwards the cached
    /// material is returned unconditionally. A failed resolution leaves the
    /// cache untouched and may be retried.
    fn key(&self, identifier: &str) -> Result<Arc<KeyMaterial>>;

    /// Number of identifiers currently resolved into the cache
    fn key_count(&self) -> usize;
}

/// Supplies raw keyset-config documents for logical key identifiers
///
/// The bytes returned by [`SecretResolver::fetch_secret`] must parse as a
/// keyset-config JSON document; validation happens in the vault.
pub trait SecretResolver: Send + Sync {
    /// Lists every identifier this resolver can serve
    fn list_identifiers(&self) -> Result<Vec<String>>;

    /// Fetches the keyset-config bytes for one identifier
    fn fetch_secret(&self, identifier: &str) -> Result<Vec<u8>>;
}
