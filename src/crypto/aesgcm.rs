//! AES-GCM probabilistic AEAD

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::AeadCipher;
use crate::error::{Error, Result};

/// Bytes of nonce prepended to every ciphertext
pub const GCM_NONCE_SIZE: usize = 12;

/// Bytes of authentication tag appended by GCM
pub const GCM_TAG_SIZE: usize = 16;

const GCM_BLOCK_SIZE: usize = 16;

// Maximum message size GCM can authenticate under one nonce
const GCM_MAX_DATA_SIZE: usize = ((1 << 32) - 2) * GCM_BLOCK_SIZE;

enum GcmKey {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

/// AES-GCM under one raw key
///
/// Each encryption draws a fresh random nonce and emits
/// `nonce || ciphertext || tag`, so equal plaintexts never produce equal
/// ciphertexts.
pub struct AesGcmCipher {
    key: GcmKey,
}

impl AesGcmCipher {
    /// Creates the cipher; the raw key selects AES-128 or AES-256
    pub fn new(key: &[u8]) -> Result<Self> {
        let key = match key.len() {
            16 => GcmKey::Aes128(Aes128Gcm::new_from_slice(key).map_err(|e| {
                Error::Crypto(format!("AES-128-GCM key rejected: {}", e))
            })?),
            32 => GcmKey::Aes256(Aes256Gcm::new_from_slice(key).map_err(|e| {
                Error::Crypto(format!("AES-256-GCM key rejected: {}", e))
            })?),
            n => {
                return Err(Error::Crypto(format!(
                    "AES-GCM requires a 16 or 32 byte key, got {}",
                    n
                )))
            }
        };
        Ok(Self { key })
    }
}

impl AeadCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        if plaintext.len() > GCM_MAX_DATA_SIZE {
            return Err(Error::Crypto("data too large for GCM".into()));
        }

        let mut nonce_bytes = [0u8; GCM_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let payload = Payload {
            msg: plaintext,
            aad: associated_data,
        };
        let sealed = match &self.key {
            GcmKey::Aes128(cipher) => cipher.encrypt(nonce, payload),
            GcmKey::Aes256(cipher) => cipher.encrypt(nonce, payload),
        }
        .map_err(|_| Error::Crypto("AES-GCM encryption failed".into()))?;

        let mut out = Vec::with_capacity(GCM_NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
            return Err(Error::AuthenticationFailure(
                "ciphertext shorter than nonce and tag".into(),
            ));
        }
        let (nonce_bytes, sealed) = ciphertext.split_at(GCM_NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let payload = Payload {
            msg: sealed,
            aad: associated_data,
        };
        match &self.key {
            GcmKey::Aes128(cipher) => cipher.decrypt(nonce, payload),
            GcmKey::Aes256(cipher) => cipher.decrypt(nonce, payload),
        }
        .map_err(|_| Error::AuthenticationFailure("AES-GCM tag verification failed".into()))
    }
}
