//! FF3-1 Feistel cipher over numeral strings
//!
//! Implements the NIST SP 800-38G rev. 1 construction: an 8-round Feistel
//! network whose round function is one AES block encryption under the
//! byte-reversed key. Inputs and outputs are numeral slices in a given radix;
//! alphabet mapping happens above this layer.
//!
//! All modular arithmetic stays in `u128`: the enforced maximum length keeps
//! every half-string value below 2^96.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::fpe::Tweak;

const ROUNDS: u8 = 8;

/// Smallest permitted domain size, per the FF3-1 security requirement
const MIN_DOMAIN: u128 = 1_000_000;

/// Half-string values must stay below 2^96 so the 12-byte round input and
/// the u128 arithmetic never truncate
const HALF_BITS: u32 = 96;

enum Ff3Key {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl Ff3Key {
    /// Builds the block cipher from the byte-reversed key, as FF3-1 requires
    fn new(key: &[u8]) -> Result<Self> {
        let mut reversed = key.to_vec();
        reversed.reverse();
        let cipher = match reversed.len() {
            16 => Self::Aes128(Aes128::new(GenericArray::from_slice(&reversed))),
            24 => Self::Aes192(Aes192::new(GenericArray::from_slice(&reversed))),
            32 => Self::Aes256(Aes256::new(GenericArray::from_slice(&reversed))),
            n => {
                reversed.zeroize();
                return Err(Error::Crypto(format!(
                    "FF3-1 requires an AES key of 16, 24 or 32 bytes, got {}",
                    n
                )));
            }
        };
        reversed.zeroize();
        Ok(cipher)
    }

    fn encrypt_block(&self, block: &mut [u8; 16]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }
}

/// FF3-1 for one key and radix
///
/// Stateless after construction; encrypt and decrypt take the numeral string
/// and tweak per call.
pub struct Ff3Cipher {
    key: Ff3Key,
    radix: u32,
    min_len: usize,
    max_len: usize,
}

impl Ff3Cipher {
    /// Creates a cipher for the given raw AES key and radix
    pub fn new(key: &[u8], radix: u32) -> Result<Self> {
        if !(2..=65536).contains(&radix) {
            return Err(Error::Crypto(format!(
                "FF3-1 radix must be in 2..=65536, got {}",
                radix
            )));
        }
        let (min_len, max_len) = length_bounds(radix);
        Ok(Self {
            key: Ff3Key::new(key)?,
            radix,
            min_len,
            max_len,
        })
    }

    /// Shortest numeral string this cipher accepts
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Longest numeral string this cipher accepts
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Encrypts a numeral string, preserving its length
    pub fn encrypt(&self, numerals: &[u32], tweak: &Tweak) -> Result<Vec<u32>> {
        self.check_input(numerals)?;

        let n = numerals.len();
        let u = n - n / 2;
        let v = n - u;
        let mut a = numerals[..u].to_vec();
        let mut b = numerals[u..].to_vec();

        let (tl, tr) = tweak.halves();
        let radix = u128::from(self.radix);
        let pow_u = radix.pow(u as u32);
        let pow_v = radix.pow(v as u32);

        for i in 0..ROUNDS {
            let (modulus, m, w) = if i % 2 == 0 {
                (pow_u, u, &tr)
            } else {
                (pow_v, v, &tl)
            };
            let y = self.round_value(w, i, &b, radix);
            let c = (num_radix_rev(&a, radix) + y % modulus) % modulus;
            a = b;
            b = str_radix_rev(c, radix, m);
        }

        a.extend_from_slice(&b);
        Ok(a)
    }

    /// Decrypts a numeral string produced by [`Ff3Cipher::encrypt`]
    pub fn decrypt(&self, numerals: &[u32], tweak: &Tweak) -> Result<Vec<u32>> {
        self.check_input(numerals)?;

        let n = numerals.len();
        let u = n - n / 2;
        let v = n - u;
        let mut a = numerals[..u].to_vec();
        let mut b = numerals[u..].to_vec();

        let (tl, tr) = tweak.halves();
        let radix = u128::from(self.radix);
        let pow_u = radix.pow(u as u32);
        let pow_v = radix.pow(v as u32);

        for i in (0..ROUNDS).rev() {
            let (modulus, m, w) = if i % 2 == 0 {
                (pow_u, u, &tr)
            } else {
                (pow_v, v, &tl)
            };
            let y = self.round_value(w, i, &a, radix);
            let c = (num_radix_rev(&b, radix) + modulus - y % modulus) % modulus;
            b = a;
            a = str_radix_rev(c, radix, m);
        }

        a.extend_from_slice(&b);
        Ok(a)
    }

    /// One Feistel round: assembles the 16-byte block from the tweak half,
    /// the round number and the opposite half-string, runs AES in the
    /// byte-reversed orientation, and returns the block as an integer.
    fn round_value(&self, w: &[u8; 4], round: u8, half: &[u32], radix: u128) -> u128 {
        let mut block = [0u8; 16];
        block[..4].copy_from_slice(w);
        block[3] ^= round;
        let num = num_radix_rev(half, radix);
        block[4..].copy_from_slice(&num.to_be_bytes()[4..]);

        block.reverse();
        self.key.encrypt_block(&mut block);
        block.reverse();

        u128::from_be_bytes(block)
    }

    fn check_input(&self, numerals: &[u32]) -> Result<()> {
        let n = numerals.len();
        if n < self.min_len || n > self.max_len {
            return Err(Error::DomainValidation(format!(
                "input length {} is outside {}..={} for radix {}",
                n, self.min_len, self.max_len, self.radix
            )));
        }
        if let Some(bad) = numerals.iter().find(|&&d| d >= self.radix) {
            return Err(Error::DomainValidation(format!(
                "numeral {} is outside radix {}",
                bad, self.radix
            )));
        }
        Ok(())
    }
}

/// Interprets a half-string in reversed order as a base-radix integer
fn num_radix_rev(numerals: &[u32], radix: u128) -> u128 {
    numerals
        .iter()
        .rev()
        .fold(0u128, |acc, &d| acc * radix + u128::from(d))
}

/// Expands an integer into `m` numerals, least significant first
fn str_radix_rev(mut value: u128, radix: u128, m: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(m);
    for _ in 0..m {
        out.push((value % radix) as u32);
        value /= radix;
    }
    out
}

/// Length bounds for a radix: the shortest string whose domain reaches the
/// FF3-1 floor, and twice the longest half-string that stays below 2^96
fn length_bounds(radix: u32) -> (usize, usize) {
    let radix = u128::from(radix);

    let mut max_half = 0usize;
    let mut acc: u128 = 1;
    let limit = (1u128 << HALF_BITS) / radix;
    while acc <= limit {
        acc *= radix;
        max_half += 1;
    }

    let mut min_len = 1usize;
    let mut acc: u128 = radix;
    while acc < MIN_DOMAIN {
        acc *= radix;
        min_len += 1;
    }

    (min_len.max(2), 2 * max_half)
}
