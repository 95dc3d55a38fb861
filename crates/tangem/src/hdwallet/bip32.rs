//! BIP32 master keys, public child derivation and extended key serialization.
//!
//! Master keys follow SLIP-0010 for every curve a card supports. Child
//! derivation is public only and limited to secp256k1, which is all a host
//! needs next to a card that keeps its private keys.

use std::fmt;

use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use super::{DerivationNode, DerivationPath, HARDENED_OFFSET};
use crate::card::EllipticCurve;
use crate::error::HdWalletError;

type HmacSha512 = Hmac<Sha512>;

/// Bytes of a serialized extended key before the checksum
const EXTENDED_KEY_LENGTH: usize = 78;

/// Attempts at finding a valid master key before giving up
const MAX_MASTER_KEY_ATTEMPTS: usize = 1000;

/// Network an extended key is serialized for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkType {
    #[default]
    Mainnet,
    Testnet,
}

impl NetworkType {
    const fn public_prefix(self) -> u32 {
        match self {
            Self::Mainnet => 0x0488_B21E,
            Self::Testnet => 0x0435_87CF,
        }
    }

    const fn private_prefix(self) -> u32 {
        match self {
            Self::Mainnet => 0x0488_ADE4,
            Self::Testnet => 0x0435_8394,
        }
    }
}

const fn hmac_key(curve: EllipticCurve) -> &'static [u8] {
    match curve {
        EllipticCurve::Secp256k1 => b"Bitcoin seed",
        EllipticCurve::Secp256r1 => b"Nist256p1 seed",
        EllipticCurve::Ed25519 => b"ed25519 seed",
    }
}

fn hmac_sha512(key: &[u8], data: &[&[u8]]) -> Result<[u8; 64], HdWalletError> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|_| HdWalletError::DerivationFailed)?;
    for chunk in data {
        mac.update(chunk);
    }
    Ok(mac.finalize().into_bytes().into())
}

fn split(i: &[u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&i[..32]);
    right.copy_from_slice(&i[32..]);
    (left, right)
}

fn is_private_key_valid(key: &[u8; 32], curve: EllipticCurve) -> bool {
    match curve {
        EllipticCurve::Secp256k1 => k256::SecretKey::from_slice(key).is_ok(),
        EllipticCurve::Secp256r1 => p256::SecretKey::from_slice(key).is_ok(),
        EllipticCurve::Ed25519 => true,
    }
}

/// First four bytes of HASH160 of a compressed public key
pub fn key_fingerprint(public_key: &[u8]) -> [u8; 4] {
    let hash = Ripemd160::digest(Sha256::digest(public_key));
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Derive the master key of `seed` on `curve`.
///
/// A left half that is not a valid scalar for the curve restarts the
/// derivation with the whole HMAC output as the new seed.
pub fn make_master_key(seed: &[u8], curve: EllipticCurve) -> Result<ExtendedPrivateKey, HdWalletError> {
    if !(16..=64).contains(&seed.len()) {
        return Err(HdWalletError::InvalidSeed);
    }

    let mut data = seed.to_vec();
    for _ in 0..MAX_MASTER_KEY_ATTEMPTS {
        let i = hmac_sha512(hmac_key(curve), &[&data])?;
        let (private_key, chain_code) = split(&i);
        if is_private_key_valid(&private_key, curve) {
            return Ok(ExtendedPrivateKey::new(private_key, chain_code));
        }
        data = i.to_vec();
    }
    Err(HdWalletError::InvalidMasterKey)
}

fn check_root(depth: u8, parent_fingerprint: [u8; 4], child_number: u32) -> Result<(), HdWalletError> {
    if depth == 0 && (parent_fingerprint != [0; 4] || child_number != 0) {
        return Err(HdWalletError::WrongKey);
    }
    Ok(())
}

fn encode_extended(
    version: u32,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: &[u8; 32],
    key: &[u8],
) -> Result<String, HdWalletError> {
    let mut data = Vec::with_capacity(EXTENDED_KEY_LENGTH);
    data.extend_from_slice(&version.to_be_bytes());
    data.push(depth);
    data.extend_from_slice(&parent_fingerprint);
    data.extend_from_slice(&child_number.to_be_bytes());
    data.extend_from_slice(chain_code);
    data.extend_from_slice(key);
    if data.len() != EXTENDED_KEY_LENGTH {
        return Err(HdWalletError::WrongLength);
    }
    Ok(bs58::encode(data).with_check().into_string())
}

/// Header fields of a decoded extended key
struct RawExtendedKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: [u8; 32],
    key: [u8; 33],
}

fn decode_extended(encoded: &str, version: u32) -> Result<RawExtendedKey, HdWalletError> {
    let data = bs58::decode(encoded)
        .with_check(None)
        .into_vec()
        .map_err(|_| HdWalletError::DecodingFailed)?;
    if data.len() != EXTENDED_KEY_LENGTH {
        return Err(HdWalletError::WrongLength);
    }
    if data[..4] != version.to_be_bytes() {
        return Err(HdWalletError::WrongVersion);
    }

    let mut raw = RawExtendedKey {
        depth: data[4],
        parent_fingerprint: [0; 4],
        child_number: u32::from_be_bytes([data[9], data[10], data[11], data[12]]),
        chain_code: [0; 32],
        key: [0; 33],
    };
    raw.parent_fingerprint.copy_from_slice(&data[5..9]);
    raw.chain_code.copy_from_slice(&data[13..45]);
    raw.key.copy_from_slice(&data[45..]);
    check_root(raw.depth, raw.parent_fingerprint, raw.child_number)?;
    Ok(raw)
}

/// Extended private key as produced by [`make_master_key`]
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "zeroize", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub struct ExtendedPrivateKey {
    private_key: [u8; 32],
    chain_code: [u8; 32],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
}

impl ExtendedPrivateKey {
    pub const fn new(private_key: [u8; 32], chain_code: [u8; 32]) -> Self {
        Self {
            private_key,
            chain_code,
            depth: 0,
            parent_fingerprint: [0; 4],
            child_number: 0,
        }
    }

    pub const fn private_key(&self) -> &[u8; 32] {
        &self.private_key
    }

    pub const fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub const fn depth(&self) -> u8 {
        self.depth
    }

    /// Extended public key on `curve`. Ed25519 keys are 32 bytes, others compressed SEC1.
    pub fn public_key(&self, curve: EllipticCurve) -> Result<ExtendedPublicKey, HdWalletError> {
        let public_key = match curve {
            EllipticCurve::Secp256k1 => k256::SecretKey::from_slice(&self.private_key)
                .map_err(|_| HdWalletError::WrongKey)?
                .public_key()
                .to_encoded_point(true)
                .as_bytes()
                .to_vec(),
            EllipticCurve::Secp256r1 => p256::SecretKey::from_slice(&self.private_key)
                .map_err(|_| HdWalletError::WrongKey)?
                .public_key()
                .to_encoded_point(true)
                .as_bytes()
                .to_vec(),
            EllipticCurve::Ed25519 => ed25519_dalek::SigningKey::from_bytes(&self.private_key)
                .verifying_key()
                .to_bytes()
                .to_vec(),
        };
        Ok(ExtendedPublicKey {
            public_key,
            chain_code: self.chain_code,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
        })
    }

    pub fn serialize(&self, network: NetworkType) -> Result<String, HdWalletError> {
        let mut key = [0u8; 33];
        key[1..].copy_from_slice(&self.private_key);
        encode_extended(
            network.private_prefix(),
            self.depth,
            self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
            &key,
        )
    }

    /// Parse an `xprv`/`tprv` string. Only secp256k1 keys are accepted.
    pub fn from_extended_key(encoded: &str, network: NetworkType) -> Result<Self, HdWalletError> {
        let raw = decode_extended(encoded, network.private_prefix())?;
        if raw.key[0] != 0 {
            return Err(HdWalletError::DecodingFailed);
        }
        let mut private_key = [0u8; 32];
        private_key.copy_from_slice(&raw.key[1..]);
        if !is_private_key_valid(&private_key, EllipticCurve::Secp256k1) {
            return Err(HdWalletError::WrongKey);
        }
        Ok(Self {
            private_key,
            chain_code: raw.chain_code,
            depth: raw.depth,
            parent_fingerprint: raw.parent_fingerprint,
            child_number: raw.child_number,
        })
    }
}

impl fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPrivateKey")
            .field("private_key", &"******")
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .finish_non_exhaustive()
    }
}

/// Extended public key; child derivation works on secp256k1 keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ExtendedPublicKeyFields")]
pub struct ExtendedPublicKey {
    #[serde(with = "crate::hex_serde")]
    public_key: Vec<u8>,
    #[serde(with = "chain_code_hex")]
    chain_code: [u8; 32],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
}

/// Wire form of [`ExtendedPublicKey`], checked on the way in
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtendedPublicKeyFields {
    #[serde(with = "crate::hex_serde")]
    public_key: Vec<u8>,
    #[serde(with = "chain_code_hex")]
    chain_code: [u8; 32],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
}

impl TryFrom<ExtendedPublicKeyFields> for ExtendedPublicKey {
    type Error = HdWalletError;

    fn try_from(fields: ExtendedPublicKeyFields) -> Result<Self, Self::Error> {
        Self::with_parent(
            fields.public_key,
            fields.chain_code,
            fields.depth,
            fields.parent_fingerprint,
            fields.child_number,
        )
    }
}

impl ExtendedPublicKey {
    /// Root key, as read from a card wallet
    pub fn new(public_key: Vec<u8>, chain_code: [u8; 32]) -> Self {
        Self {
            public_key,
            chain_code,
            depth: 0,
            parent_fingerprint: [0; 4],
            child_number: 0,
        }
    }

    pub fn with_parent(
        public_key: Vec<u8>,
        chain_code: [u8; 32],
        depth: u8,
        parent_fingerprint: [u8; 4],
        child_number: u32,
    ) -> Result<Self, HdWalletError> {
        check_root(depth, parent_fingerprint, child_number)?;
        Ok(Self {
            public_key,
            chain_code,
            depth,
            parent_fingerprint,
            child_number,
        })
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub const fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub const fn depth(&self) -> u8 {
        self.depth
    }

    pub const fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    pub const fn child_number(&self) -> u32 {
        self.child_number
    }

    fn secp256k1_key(&self) -> Result<k256::PublicKey, HdWalletError> {
        k256::PublicKey::from_sec1_bytes(&self.public_key).map_err(|_| HdWalletError::UnsupportedCurve)
    }

    /// CKDpub for a single non-hardened node
    pub fn derive_child(&self, node: DerivationNode) -> Result<Self, HdWalletError> {
        let parent = self.secp256k1_key()?;
        let index = node.index();
        if index >= HARDENED_OFFSET {
            return Err(HdWalletError::HardenedNotSupported);
        }

        let compressed = parent.to_encoded_point(true);
        let i = hmac_sha512(&self.chain_code, &[compressed.as_bytes(), &index.to_be_bytes()])?;
        let (il, chain_code) = split(&i);
        let tweak = k256::SecretKey::from_slice(&il).map_err(|_| HdWalletError::DerivationFailed)?;

        let point = k256::ProjectivePoint::GENERATOR * *tweak.to_nonzero_scalar() + parent.to_projective();
        let child = k256::PublicKey::from_affine(point.into()).map_err(|_| HdWalletError::DerivationFailed)?;

        Ok(Self {
            public_key: child.to_encoded_point(true).as_bytes().to_vec(),
            chain_code,
            depth: self.depth.checked_add(1).ok_or(HdWalletError::DerivationFailed)?,
            parent_fingerprint: key_fingerprint(compressed.as_bytes()),
            child_number: index,
        })
    }

    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, HdWalletError> {
        path.nodes()
            .iter()
            .try_fold(self.clone(), |key, node| key.derive_child(*node))
    }

    pub fn serialize(&self, network: NetworkType) -> Result<String, HdWalletError> {
        let compressed = self.secp256k1_key()?.to_encoded_point(true);
        encode_extended(
            network.public_prefix(),
            self.depth,
            self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
            compressed.as_bytes(),
        )
    }

    /// Parse an `xpub`/`tpub` string holding a secp256k1 key
    pub fn from_extended_key(encoded: &str, network: NetworkType) -> Result<Self, HdWalletError> {
        let raw = decode_extended(encoded, network.public_prefix())?;
        let key = Self {
            public_key: raw.key.to_vec(),
            chain_code: raw.chain_code,
            depth: raw.depth,
            parent_fingerprint: raw.parent_fingerprint,
            child_number: raw.child_number,
        };
        key.secp256k1_key()?;
        Ok(key)
    }
}

mod chain_code_hex {
    use serde::{Deserializer, Serializer, de};

    pub(super) fn serialize<S: Serializer>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        crate::hex_serde::serialize(value, serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let bytes = crate::hex_serde::deserialize(deserializer)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom("chain code must be 32 bytes"))
    }
}
