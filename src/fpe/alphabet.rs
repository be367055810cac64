//! Plaintext alphabets for format-preserving encryption

use crate::error::{Error, Result};
use std::collections::HashMap;

/// An ordered set of distinct symbols defining an FPE numeral system
///
/// The position of a symbol is its numeral value; the alphabet length is the
/// radix. Construction rejects duplicate symbols and degenerate sizes.
#[derive(Debug, Clone)]
pub struct Alphabet {
    symbols: Vec<char>,
    lookup: HashMap<char, u32>,
}

impl Alphabet {
    /// Builds an alphabet from the given symbols, in order
    pub fn new(symbols: &str) -> Result<Self> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.len() < 2 {
            return Err(Error::AlphabetMismatch(format!(
                "alphabet needs at least 2 symbols, got {}",
                symbols.len()
            )));
        }
        if symbols.len() > 65536 {
            return Err(Error::AlphabetMismatch(format!(
                "alphabet exceeds the maximum radix of 65536 ({} symbols)",
                symbols.len()
            )));
        }

        let mut lookup = HashMap::with_capacity(symbols.len());
        for (index, &symbol) in symbols.iter().enumerate() {
            if lookup.insert(symbol, index as u32).is_some() {
                return Err(Error::AlphabetMismatch(format!(
                    "duplicate symbol '{}' in alphabet",
                    symbol
                )));
            }
        }

        Ok(Self { symbols, lookup })
    }

    /// The decimal digits `0-9`
    pub fn digits() -> Self {
        Self::new("0123456789").unwrap_or_else(|_| unreachable!())
    }

    /// Digits followed by lowercase and uppercase ASCII letters (radix 62)
    pub fn alphanumeric() -> Self {
        Self::new("0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ")
            .unwrap_or_else(|_| unreachable!())
    }

    /// Number of symbols in the alphabet
    pub fn radix(&self) -> u32 {
        self.symbols.len() as u32
    }

    /// Maps a plaintext string to numeral values
    ///
    /// Every symbol must be a member of the alphabet.
    pub fn to_numerals(&self, text: &str) -> Result<Vec<u32>> {
        text.chars()
            .map(|c| {
                self.lookup.get(&c).copied().ok_or_else(|| {
                    Error::AlphabetMismatch(format!("symbol '{}' is not in the alphabet", c))
                })
            })
            .collect()
    }

    /// Maps numeral values back to their symbols
    pub fn to_text(&self, numerals: &[u32]) -> String {
        numerals
            .iter()
            .map(|&n| self.symbols[n as usize])
            .collect()
    }
}
