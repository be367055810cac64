//! Cipher families and keyset-aware dispatch
//!
//! Three algorithm families cover the field encryption modes: probabilistic
//! AEAD for general payloads, deterministic AEAD for matchable values, and
//! format-preserving encryption for values whose shape must survive. Each
//! family has a capability trait, concrete single-key ciphers, and a
//! keyset-level implementation that routes between key versions via the
//! ciphertext output prefix.

mod aesgcm;
mod aessiv;

pub use aesgcm::{AesGcmCipher, GCM_NONCE_SIZE, GCM_TAG_SIZE};
pub use aessiv::{AesSivCipher, SIV_IV_SIZE};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::fpe::{Alphabet, Ff3Cipher, Tweak};
use crate::keyset::{KeyMaterial, KeyMaterialEntry, KeyStatus, OutputFormat};

/// Bytes of `0x01 || key-id` ahead of prefixed ciphertexts
pub const OUTPUT_PREFIX_SIZE: usize = 5;

const OUTPUT_PREFIX_BYTE: u8 = 0x01;

/// A supported cipher, identified on the wire by a stable tag
///
/// Tags are part of every encrypted payload and never change meaning;
/// deciphering an unknown tag fails closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherSpec {
    /// AES-GCM, fresh nonce per call
    #[serde(rename = "AEAD/AES_GCM")]
    AesGcm,
    /// AES-SIV, stable output for stable input
    #[serde(rename = "DAEAD/AES_SIV")]
    AesSiv,
    /// FF3-1 format-preserving encryption
    #[serde(rename = "FPE/FF3_1")]
    Ff3,
}

impl CipherSpec {
    /// The wire tag written into encrypted payloads
    pub fn tag(&self) -> &'static str {
        match self {
            CipherSpec::AesGcm => "AEAD/AES_GCM",
            CipherSpec::AesSiv => "DAEAD/AES_SIV",
            CipherSpec::Ff3 => "FPE/FF3_1",
        }
    }

    /// Resolves a wire tag, failing closed on anything unknown
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "AEAD/AES_GCM" => Ok(CipherSpec::AesGcm),
            "DAEAD/AES_SIV" => Ok(CipherSpec::AesSiv),
            "FPE/FF3_1" => Ok(CipherSpec::Ff3),
            other => Err(Error::UnsupportedOperation(format!(
                "unknown cipher tag '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CipherSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Probabilistic authenticated encryption
pub trait AeadCipher {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>>;
}

/// Deterministic authenticated encryption
pub trait DeterministicAeadCipher {
    fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>>;
    fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>>;
}

/// Length- and alphabet-preserving encryption over strings
pub trait FormatPreservingCipher {
    fn encrypt_text(&self, plaintext: &str, tweak: &Tweak) -> Result<String>;
    fn decrypt_text(&self, ciphertext: &str, tweak: &Tweak) -> Result<String>;
}

fn frame_with_prefix(entry: &KeyMaterialEntry, body: Vec<u8>) -> Vec<u8> {
    match entry.output_prefix() {
        Some(prefix) => {
            let mut out = Vec::with_capacity(OUTPUT_PREFIX_SIZE + body.len());
            out.extend_from_slice(&prefix);
            out.extend_from_slice(&body);
            out
        }
        None => body,
    }
}

fn split_output_prefix(ciphertext: &[u8]) -> Option<(u32, &[u8])> {
    if ciphertext.len() <= OUTPUT_PREFIX_SIZE || ciphertext[0] != OUTPUT_PREFIX_BYTE {
        return None;
    }
    let id_bytes: [u8; 4] = ciphertext[1..OUTPUT_PREFIX_SIZE].try_into().ok()?;
    Some((
        u32::from_be_bytes(id_bytes),
        &ciphertext[OUTPUT_PREFIX_SIZE..],
    ))
}

fn prefixed_candidate(material: &KeyMaterial, key_id: u32) -> Option<&KeyMaterialEntry> {
    material.entry(key_id).filter(|e| {
        e.status() == KeyStatus::Enabled && e.output_format() == OutputFormat::Prefixed
    })
}

/// AEAD over a whole keyset
///
/// Encrypts with the primary entry; decrypts by routing on the output prefix
/// first and falling back to raw entries, so payloads written before a
/// rotation keep deciphering.
pub struct KeysetAead<'a> {
    material: &'a KeyMaterial,
}

impl<'a> KeysetAead<'a> {
    pub fn new(material: &'a KeyMaterial) -> Self {
        Self { material }
    }
}

impl AeadCipher for KeysetAead<'_> {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        let primary = self.material.primary();
        let cipher = AesGcmCipher::new(primary.key_bytes())?;
        let body = cipher.encrypt(plaintext, associated_data)?;
        Ok(frame_with_prefix(primary, body))
    }

    fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        if let Some((key_id, body)) = split_output_prefix(ciphertext) {
            if let Some(entry) = prefixed_candidate(self.material, key_id) {
                if let Ok(cipher) = AesGcmCipher::new(entry.key_bytes()) {
                    if let Ok(plaintext) = cipher.decrypt(body, associated_data) {
                        return Ok(plaintext);
                    }
                }
            }
        }
        for entry in self.material.enabled_entries() {
            if entry.output_format() != OutputFormat::Raw {
                continue;
            }
            if let Ok(cipher) = AesGcmCipher::new(entry.key_bytes()) {
                if let Ok(plaintext) = cipher.decrypt(ciphertext, associated_data) {
                    return Ok(plaintext);
                }
            }
        }
        Err(Error::AuthenticationFailure(
            "no keyset entry authenticates the ciphertext".into(),
        ))
    }
}

/// Deterministic AEAD over a whole keyset
pub struct KeysetDeterministicAead<'a> {
    material: &'a KeyMaterial,
}

impl<'a> KeysetDeterministicAead<'a> {
    pub fn new(material: &'a KeyMaterial) -> Self {
        Self { material }
    }
}

impl DeterministicAeadCipher for KeysetDeterministicAead<'_> {
    fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let primary = self.material.primary();
        let cipher = AesSivCipher::new(primary.key_bytes())?;
        let body = cipher.encrypt_deterministically(plaintext, associated_data)?;
        Ok(frame_with_prefix(primary, body))
    }

    fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        if let Some((key_id, body)) = split_output_prefix(ciphertext) {
            if let Some(entry) = prefixed_candidate(self.material, key_id) {
                if let Ok(cipher) = AesSivCipher::new(entry.key_bytes()) {
                    if let Ok(plaintext) = cipher.decrypt_deterministically(body, associated_data)
                    {
                        return Ok(plaintext);
                    }
                }
            }
        }
        for entry in self.material.enabled_entries() {
            if entry.output_format() != OutputFormat::Raw {
                continue;
            }
            if let Ok(cipher) = AesSivCipher::new(entry.key_bytes()) {
                if let Ok(plaintext) =
                    cipher.decrypt_deterministically(ciphertext, associated_data)
                {
                    return Ok(plaintext);
                }
            }
        }
        Err(Error::AuthenticationFailure(
            "no keyset entry authenticates the ciphertext".into(),
        ))
    }
}

/// Format-preserving encryption over a whole keyset
///
/// FPE output carries no room for a key-id prefix, so both directions use
/// the primary entry. Rotating an FPE keyset means re-enciphering the values
/// written under the old primary.
pub struct KeysetFpe<'a> {
    material: &'a KeyMaterial,
    alphabet: &'a Alphabet,
}

impl<'a> KeysetFpe<'a> {
    pub fn new(material: &'a KeyMaterial, alphabet: &'a Alphabet) -> Self {
        Self { material, alphabet }
    }
}

impl FormatPreservingCipher for KeysetFpe<'_> {
    fn encrypt_text(&self, plaintext: &str, tweak: &Tweak) -> Result<String> {
        let cipher = Ff3Cipher::new(self.material.primary().key_bytes(), self.alphabet.radix())?;
        let numerals = self.alphabet.to_numerals(plaintext)?;
        let sealed = cipher.encrypt(&numerals, tweak)?;
        Ok(self.alphabet.to_text(&sealed))
    }

    fn decrypt_text(&self, ciphertext: &str, tweak: &Tweak) -> Result<String> {
        let cipher = Ff3Cipher::new(self.material.primary().key_bytes(), self.alphabet.radix())?;
        let numerals = self.alphabet.to_numerals(ciphertext)?;
        let opened = cipher.decrypt(&numerals, tweak)?;
        Ok(self.alphabet.to_text(&opened))
    }
}
