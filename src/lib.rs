//! Field-level encryption for structured records
//!
//! This crate encrypts individual field values rather than whole rows or
//! documents, so a datastore can hold a mix of protected and cleartext
//! columns and every protected value stays independently decipherable. Three
//! cipher families cover the usual shapes of field data:
//!
//! * `AEAD/AES_GCM`: probabilistic authenticated encryption, the default.
//! * `DAEAD/AES_SIV`: deterministic authenticated encryption, for values
//!   that must keep working as equality-lookup tokens.
//! * `FPE/FF3_1`: format-preserving encryption, for values whose length and
//!   alphabet are load-bearing (card numbers, national identifiers).
//!
//! Key material is organized into keysets: versioned key entries with one
//! primary, so keys rotate without rewriting old payloads. A
//! [`vault::KeyVault`] resolves logical key identifiers to keysets through a
//! [`vault::SecretResolver`], caching each resolution for the life of the
//! process; keysets can live in configuration, plain or wrapped by a
//! key-encryption key, or in an external secret store.
//!
//! Every encrypted value travels as an [`EncryptedField`] envelope that
//! records the cipher tag and key identifier alongside the payload, which is
//! all a reader needs besides access to the same key material.
//!
//! # Example
//!
//! ```
//! use fieldencryption::{CipherConfig, FieldOptions};
//!
//! # fn main() -> fieldencryption::Result<()> {
//! let config = CipherConfig::from_json(
//!     r#"{
//!         "keySource": "CONFIG",
//!         "defaultKeyIdentifier": "example",
//!         "dataKeys": [{
//!             "identifier": "example",
//!             "material": {
//!                 "primaryKeyId": 1,
//!                 "key": [{
//!                     "keyId": 1,
//!                     "status": "ENABLED",
//!                     "keyData": {
//!                         "typeTag": "fieldencryption/aes",
//!                         "value": "q83vASNFZ4mrze8BI0VniavN7wEjRWeJq83vASNFZ4k=",
//!                         "outputFormat": "PREFIXED"
//!                     }
//!                 }]
//!             }
//!         }]
//!     }"#,
//! )?;
//!
//! let cipher = config.build_cipher()?;
//! let field = cipher.encipher(b"4111 1111 1111 1111", &FieldOptions::new())?;
//! assert_eq!(
//!     cipher.decipher(&field, &FieldOptions::new())?,
//!     b"4111 1111 1111 1111"
//! );
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod fpe;
pub mod keyset;
pub mod kms;
pub mod metrics;
pub mod vault;

pub use cipher::{FieldCipher, FieldCipherBuilder, FieldOptions};
pub use config::{CipherConfig, FpeConfig, KeySource};
pub use crypto::CipherSpec;
pub use envelope::EncryptedField;
pub use error::{Error, Result};
