//! Hierarchical deterministic wallet helpers: derivation paths, BIP32 and BIP39.

pub mod bip32;
pub mod bip39;
mod path;

pub use bip32::{ExtendedPrivateKey, ExtendedPublicKey, NetworkType, make_master_key};
pub use bip39::{EntropyLength, Mnemonic};
pub use path::{DerivationNode, DerivationPath, HARDENED_OFFSET};
