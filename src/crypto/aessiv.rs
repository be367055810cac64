//! AES-SIV deterministic AEAD

use aes::cipher::generic_array::GenericArray;
use aes::cipher::KeyInit;
use aes_siv::siv::{Aes128Siv, Aes256Siv};
use zeroize::Zeroize;

use crate::crypto::DeterministicAeadCipher;
use crate::error::{Error, Result};

/// Bytes of synthetic IV prepended by SIV mode
pub const SIV_IV_SIZE: usize = 16;

enum SivKeySize {
    Aes128,
    Aes256,
}

/// AES-SIV under one raw key
///
/// Equal plaintext, associated data and key always produce equal ciphertext,
/// which makes the output usable as a lookup token. The synthetic IV doubles
/// as the authentication tag.
///
/// The underlying mode mutates internal state during a call, so the raw key
/// is held here and the cipher is rebuilt per operation.
pub struct AesSivCipher {
    key: Vec<u8>,
    size: SivKeySize,
}

impl AesSivCipher {
    /// Creates the cipher; SIV keys are double-width, 32 or 64 bytes
    pub fn new(key: &[u8]) -> Result<Self> {
        let size = match key.len() {
            32 => SivKeySize::Aes128,
            64 => SivKeySize::Aes256,
            n => {
                return Err(Error::Crypto(format!(
                    "AES-SIV requires a 32 or 64 byte key, got {}",
                    n
                )))
            }
        };
        Ok(Self {
            key: key.to_vec(),
            size,
        })
    }
}

impl Drop for AesSivCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl DeterministicAeadCipher for AesSivCipher {
    fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let headers = [associated_data];
        match self.size {
            SivKeySize::Aes128 => {
                let mut cipher = Aes128Siv::new(GenericArray::from_slice(&self.key));
                cipher.encrypt(headers, plaintext)
            }
            SivKeySize::Aes256 => {
                let mut cipher = Aes256Siv::new(GenericArray::from_slice(&self.key));
                cipher.encrypt(headers, plaintext)
            }
        }
        .map_err(|_| Error::Crypto("AES-SIV encryption failed".into()))
    }

    fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        if ciphertext.len() < SIV_IV_SIZE {
            return Err(Error::AuthenticationFailure(
                "ciphertext shorter than the synthetic IV".into(),
            ));
        }
        let headers = [associated_data];
        match self.size {
            SivKeySize::Aes128 => {
                let mut cipher = Aes128Siv::new(GenericArray::from_slice(&self.key));
                cipher.decrypt(headers, ciphertext)
            }
            SivKeySize::Aes256 => {
                let mut cipher = Aes256Siv::new(GenericArray::from_slice(&self.key));
                cipher.decrypt(headers, ciphertext)
            }
        }
        .map_err(|_| Error::AuthenticationFailure("AES-SIV verification failed".into()))
    }
}
