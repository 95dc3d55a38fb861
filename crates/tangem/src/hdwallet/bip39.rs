//! BIP39 mnemonics over the English wordlist.

use std::collections::BTreeSet;
use std::fmt;

use coins_bip39::{English, Wordlist};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use unicode_normalization::UnicodeNormalization;

use crate::error::MnemonicError;

const SEED_SALT_PREFIX: &str = "mnemonic";
const SEED_ITERATIONS: u32 = 2048;
const BITS_PER_WORD: usize = 11;

/// Entropy sizes a mnemonic can encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EntropyLength {
    Bits128 = 128,
    Bits160 = 160,
    Bits192 = 192,
    Bits224 = 224,
    Bits256 = 256,
}

impl EntropyLength {
    pub const ALL: [Self; 5] = [Self::Bits128, Self::Bits160, Self::Bits192, Self::Bits224, Self::Bits256];

    pub const fn bits(self) -> usize {
        self as usize
    }

    pub const fn bytes(self) -> usize {
        self.bits() / 8
    }

    pub const fn checksum_bits(self) -> usize {
        self.bits() / 32
    }

    pub const fn word_count(self) -> usize {
        (self.bits() + self.checksum_bits()) / BITS_PER_WORD
    }

    pub fn from_word_count(count: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|length| length.word_count() == count)
    }

    pub fn from_bytes(count: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|length| length.bytes() == count)
    }
}

fn bit(data: &[u8], index: usize) -> bool {
    data[index / 8] & (0x80 >> (index % 8)) != 0
}

/// A validated mnemonic phrase
#[derive(Clone, PartialEq, Eq)]
pub struct Mnemonic {
    words: Vec<String>,
}

impl Mnemonic {
    /// Parse and validate a phrase. Anything that is not a letter separates words.
    pub fn new(phrase: &str) -> Result<Self, MnemonicError> {
        let words: Vec<String> = phrase
            .split(|c: char| !c.is_alphabetic())
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .collect();
        validate(&words)?;
        Ok(Self { words })
    }

    /// Mnemonic for fresh random entropy
    pub fn generate(length: EntropyLength) -> Result<Self, MnemonicError> {
        let mut entropy = vec![0u8; length.bytes()];
        rand::rng().fill_bytes(&mut entropy);
        Self::from_entropy(&entropy)
    }

    pub fn from_entropy(entropy: &[u8]) -> Result<Self, MnemonicError> {
        let length = EntropyLength::from_bytes(entropy.len()).ok_or(MnemonicError::InvalidEntropyLength)?;
        let hash = Sha256::digest(entropy);

        let total_bits = length.bits() + length.checksum_bits();
        let words = (0..total_bits / BITS_PER_WORD)
            .map(|word| {
                let index = (0..BITS_PER_WORD).fold(0usize, |acc, offset| {
                    let position = word * BITS_PER_WORD + offset;
                    let set = if position < length.bits() {
                        bit(entropy, position)
                    } else {
                        bit(&hash, position - length.bits())
                    };
                    (acc << 1) | usize::from(set)
                });
                English::get(index)
                    .map(str::to_owned)
                    .map_err(|_| MnemonicError::MnemonicCreationFailed)
            })
            .collect::<Result<Vec<String>, _>>()?;

        if words.len() != length.word_count() {
            return Err(MnemonicError::MnemonicCreationFailed);
        }
        Ok(Self { words })
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn phrase(&self) -> String {
        self.words.join(" ")
    }

    /// PBKDF2-HMAC-SHA512 seed over the NFKD forms of phrase and passphrase
    pub fn to_seed(&self, passphrase: &str) -> [u8; 64] {
        let password: String = self.phrase().nfkd().collect();
        let salt: String = format!("{SEED_SALT_PREFIX}{passphrase}").nfkd().collect();
        let mut seed = [0u8; 64];
        pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), SEED_ITERATIONS, &mut seed);
        seed
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mnemonic")
            .field("words", &self.words.len())
            .finish_non_exhaustive()
    }
}

fn validate(words: &[String]) -> Result<(), MnemonicError> {
    let length = EntropyLength::from_word_count(words.len()).ok_or(MnemonicError::InvalidWordCount)?;

    let mut indices = Vec::with_capacity(words.len());
    let mut invalid = BTreeSet::new();
    for word in words {
        match English::get_index(word) {
            Ok(index) => indices.push(index),
            Err(_) => {
                invalid.insert(word.clone());
            }
        }
    }
    if indices.is_empty() {
        return Err(MnemonicError::UnsupportedLanguage);
    }
    if !invalid.is_empty() {
        return Err(MnemonicError::InvalidWords(invalid));
    }

    let total_bits = indices.len() * BITS_PER_WORD;
    let mut data = vec![0u8; total_bits.div_ceil(8)];
    for (position, index) in indices.iter().enumerate() {
        for offset in 0..BITS_PER_WORD {
            if index & (1 << (BITS_PER_WORD - 1 - offset)) != 0 {
                let bit_index = position * BITS_PER_WORD + offset;
                data[bit_index / 8] |= 0x80 >> (bit_index % 8);
            }
        }
    }

    let entropy = &data[..length.bytes()];
    let hash = Sha256::digest(entropy);
    let matches = (0..length.checksum_bits()).all(|i| bit(&data, length.bits() + i) == bit(&hash, i));
    if !matches {
        return Err(MnemonicError::InvalidChecksum);
    }
    Ok(())
}
