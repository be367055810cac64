//! Keyset configuration and resolved key material
//!
//! A keyset is the declarative form of a logical key: a set of versioned key
//! entries with exactly one marked primary, supporting rotation without
//! changing the logical key identifier. `KeysetConfig` is the serde view of
//! that form; `KeyMaterial` is the validated, decoded handle the vault hands
//! to cipher operations.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Raw key byte lengths accepted at load time
///
/// 16/24/32 cover the AES key sizes; 64 covers two-key constructions such as
/// AES-SIV. Violations fail at load, never at first cipher use.
pub const ALLOWED_RAW_KEY_SIZES: [usize; 4] = [16, 24, 32, 64];

/// Keyset format version this crate reads and writes
pub const KEYSET_FORMAT_VERSION: u32 = 1;

const fn default_version() -> u32 {
    KEYSET_FORMAT_VERSION
}

/// Lifecycle status of a keyset entry
///
/// Disabled entries are loadable but are never selected as primary and never
/// used for cipher operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    #[serde(rename = "ENABLED")]
    Enabled,
    #[serde(rename = "DISABLED")]
    Disabled,
}

/// Output format of ciphertext produced with a keyset entry
///
/// `Prefixed` entries contribute a 5-byte `0x01 || key-id(be32)` header ahead
/// of the AEAD bytes, which is how deciphering routes to the entry that
/// produced a payload after rotation. `Raw` entries emit bare cipher output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    #[serde(rename = "PREFIXED")]
    Prefixed,
    #[serde(rename = "RAW")]
    Raw,
}

/// Key payload of a keyset entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyData {
    /// Opaque tag describing the key type
    #[serde(rename = "typeTag")]
    pub type_tag: String,

    /// Base64-encoded raw key bytes
    #[serde(rename = "value")]
    pub value: String,

    /// Output format for ciphertext produced with this key
    #[serde(rename = "outputFormat")]
    pub output_format: OutputFormat,
}

/// One versioned key within a keyset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEntry {
    #[serde(rename = "keyId")]
    pub key_id: u32,

    #[serde(rename = "status")]
    pub status: KeyStatus,

    #[serde(rename = "keyData")]
    pub key_data: KeyData,
}

/// Declarative description of a keyset
///
/// Source-of-truth in configuration; immutable once loaded. Parsing is
/// strict: missing required fields are configuration errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysetConfig {
    #[serde(rename = "primaryKeyId")]
    pub primary_key_id: u32,

    #[serde(rename = "key")]
    pub key: Vec<KeyEntry>,

    /// Keyset format version; absent means the current version
    #[serde(rename = "version", default = "default_version")]
    pub version: u32,
}

impl KeysetConfig {
    /// Parses a keyset config from its JSON form
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let config: KeysetConfig = serde_json::from_slice(raw)?;
        Ok(config)
    }
}

/// A logical key identifier paired with its keyset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataKeyConfig {
    #[serde(rename = "identifier")]
    pub identifier: String,

    #[serde(rename = "material")]
    pub material: KeysetConfig,
}

/// A logical key identifier paired with KMS-enveloped keyset material
///
/// The `material` value is base64 KMS ciphertext; a `KeyEncryption` provider
/// reveals the inner `KeysetConfig` JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedDataKeyConfig {
    #[serde(rename = "identifier")]
    pub identifier: String,

    #[serde(rename = "material")]
    pub material: String,
}

impl EncryptedDataKeyConfig {
    /// Decodes the base64 KMS ciphertext carried in `material`
    pub fn ciphertext(&self) -> Result<Vec<u8>> {
        BASE64.decode(&self.material).map_err(|e| {
            Error::Configuration(format!(
                "encrypted keyset material for '{}' is not valid base64: {}",
                self.identifier, e
            ))
        })
    }
}

/// One decoded key within resolved key material
pub struct KeyMaterialEntry {
    key_id: u32,
    status: KeyStatus,
    output_format: OutputFormat,
    type_tag: String,
    key_bytes: Vec<u8>,
}

impl KeyMaterialEntry {
    /// Returns the entry's key id
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Returns the entry's lifecycle status
    pub fn status(&self) -> KeyStatus {
        self.status
    }

    /// Returns the entry's ciphertext output format
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Returns the opaque key type tag
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Returns the raw key bytes for the duration of one cipher operation
    pub fn key_bytes(&self) -> &[u8] {
        &self.key_bytes
    }

    /// Returns the ciphertext header this entry writes, if any
    pub fn output_prefix(&self) -> Option<[u8; 5]> {
        match self.output_format {
            OutputFormat::Prefixed => {
                let id = self.key_id.to_be_bytes();
                Some([0x01, id[0], id[1], id[2], id[3]])
            }
            OutputFormat::Raw => None,
        }
    }
}

impl Drop for KeyMaterialEntry {
    fn drop(&mut self) {
        self.key_bytes.zeroize();
    }
}

impl fmt::Debug for KeyMaterialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterialEntry")
            .field("key_id", &self.key_id)
            .field("status", &self.status)
            .field("output_format", &self.output_format)
            .field("type_tag", &self.type_tag)
            .field("key_bytes", &"<hidden>")
            .finish()
    }
}

/// Resolved, validated key material for one logical key identifier
///
/// Owned by the vault that resolved it; cipher operations receive a reference
/// for the duration of one call and must not persist it.
#[derive(Debug)]
pub struct KeyMaterial {
    primary_key_id: u32,
    primary_index: usize,
    entries: Vec<KeyMaterialEntry>,
}

impl KeyMaterial {
    /// Validates a keyset config and decodes it into usable key material
    ///
    /// Fails fast with a configuration error on: empty keysets, duplicate
    /// entry ids, a primary id that is missing or disabled, undecodable key
    /// bytes, raw key lengths outside [`ALLOWED_RAW_KEY_SIZES`], and unknown
    /// format versions.
    pub fn from_config(config: &KeysetConfig) -> Result<Self> {
        if config.version != KEYSET_FORMAT_VERSION {
            return Err(Error::Configuration(format!(
                "unsupported keyset format version {} (expected {})",
                config.version, KEYSET_FORMAT_VERSION
            )));
        }

        if config.key.is_empty() {
            return Err(Error::Configuration(
                "keyset contains no key entries".into(),
            ));
        }

        let mut entries = Vec::with_capacity(config.key.len());
        for entry in &config.key {
            if entries
                .iter()
                .any(|e: &KeyMaterialEntry| e.key_id == entry.key_id)
            {
                return Err(Error::Configuration(format!(
                    "duplicate key id {} in keyset",
                    entry.key_id
                )));
            }

            let key_bytes = BASE64.decode(&entry.key_data.value).map_err(|e| {
                Error::Configuration(format!(
                    "key id {} carries invalid base64 key data: {}",
                    entry.key_id, e
                ))
            })?;

            if !ALLOWED_RAW_KEY_SIZES.contains(&key_bytes.len()) {
                return Err(Error::Configuration(format!(
                    "key id {} has raw key length {} (allowed: {:?})",
                    entry.key_id,
                    key_bytes.len(),
                    ALLOWED_RAW_KEY_SIZES
                )));
            }

            entries.push(KeyMaterialEntry {
                key_id: entry.key_id,
                status: entry.status,
                output_format: entry.key_data.output_format,
                type_tag: entry.key_data.type_tag.clone(),
                key_bytes,
            });
        }

        let primary_index = entries
            .iter()
            .position(|e| e.key_id == config.primary_key_id)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "primary key id {} does not match any keyset entry",
                    config.primary_key_id
                ))
            })?;

        if entries[primary_index].status != KeyStatus::Enabled {
            return Err(Error::Configuration(format!(
                "primary key id {} is disabled",
                config.primary_key_id
            )));
        }

        Ok(Self {
            primary_key_id: config.primary_key_id,
            primary_index,
            entries,
        })
    }

    /// Parses and validates key material from raw keyset-config JSON
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        Self::from_config(&KeysetConfig::from_json(raw)?)
    }

    /// Returns the primary entry's key id
    pub fn primary_key_id(&self) -> u32 {
        self.primary_key_id
    }

    /// Returns the primary entry
    pub fn primary(&self) -> &KeyMaterialEntry {
        &self.entries[self.primary_index]
    }

    /// Returns the entry with the given key id, if present
    pub fn entry(&self, key_id: u32) -> Option<&KeyMaterialEntry> {
        self.entries.iter().find(|e| e.key_id == key_id)
    }

    /// Returns all entries, disabled ones included
    pub fn entries(&self) -> &[KeyMaterialEntry] {
        &self.entries
    }

    /// Iterates over entries usable for cipher operations
    pub fn enabled_entries(&self) -> impl Iterator<Item = &KeyMaterialEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == KeyStatus::Enabled)
    }

    /// Compares two resolutions of the same identifier for equivalence
    ///
    /// Key bytes are compared in constant time. Used to verify that an
    /// idempotent re-resolution did not silently diverge.
    pub(crate) fn equivalent(&self, other: &KeyMaterial) -> bool {
        if self.primary_key_id != other.primary_key_id
            || self.entries.len() != other.entries.len()
        {
            return false;
        }

        self.entries.iter().zip(other.entries.iter()).all(|(a, b)| {
            a.key_id == b.key_id
                && a.status == b.status
                && a.output_format == b.output_format
                && bool::from(a.key_bytes.ct_eq(&b.key_bytes))
        })
    }
}
