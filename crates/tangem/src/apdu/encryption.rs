//! Payload encryption for card sessions.
//!
//! Payloads are framed as `len(2, BE) | crc16(2) | data` and encrypted with
//! AES-256-CBC under a zero IV. The session key comes from an OpenSession key
//! agreement, either the fast scheme (key halves concatenated) or the strong
//! scheme (secp256k1 ECDH).

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use crc::{CRC_16_ISO_IEC_14443_3_A, Crc};
use k256::{PublicKey, SecretKey, elliptic_curve::sec1::ToEncodedPoint};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, TangemSdkError};

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ISO_IEC_14443_3_A);
const ZERO_IV: [u8; 16] = [0u8; 16];

/// Smallest encrypted response body, one AES block. Status words are not counted.
const MIN_ENCRYPTED_RESPONSE_LEN: usize = 16;

/// Payload protection negotiated for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EncryptionMode {
    #[default]
    None,
    Fast,
    Strong,
}

impl EncryptionMode {
    /// Value carried in P1 of an encrypted frame
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Fast => 0x01,
            Self::Strong => 0x02,
        }
    }

    /// Next stronger mode to try when the card asks for encryption
    pub const fn escalate(self) -> Option<Self> {
        match self {
            Self::None => Some(Self::Fast),
            Self::Fast => Some(Self::Strong),
            Self::Strong => None,
        }
    }
}

/// CRC-16/ISO-IEC-14443-3-A, low byte first
pub fn crc16(data: &[u8]) -> [u8; 2] {
    CRC16.checksum(data).to_le_bytes()
}

/// Frame and encrypt a command payload
pub fn encrypt_payload(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut plain = Vec::with_capacity(data.len() + 4);
    plain.extend_from_slice(&(data.len() as u16).to_be_bytes());
    plain.extend_from_slice(&crc16(data));
    plain.extend_from_slice(data);

    let encryptor = Encryptor::new_from_slices(key, &ZERO_IV)
        .map_err(|e| TangemSdkError::CryptoUtilsError(e.to_string()))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(&plain))
}

/// Decrypt and verify a response payload.
///
/// Payloads shorter than an encrypted frame can be are returned as they are.
pub fn decrypt_payload(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if data.len() < MIN_ENCRYPTED_RESPONSE_LEN {
        return Ok(data.to_vec());
    }

    let decryptor = Decryptor::new_from_slices(key, &ZERO_IV)
        .map_err(|e| TangemSdkError::CryptoUtilsError(e.to_string()))?;
    let plain = decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|_| TangemSdkError::InvalidResponse)?;

    if plain.len() < 4 {
        return Err(TangemSdkError::InvalidResponse);
    }
    let len = u16::from_be_bytes([plain[0], plain[1]]) as usize;
    let crc = [plain[2], plain[3]];
    let body = plain
        .get(4..4 + len)
        .ok_or(TangemSdkError::InvalidResponse)?;
    if crc16(body) != crc {
        return Err(TangemSdkError::InvalidResponse);
    }
    Ok(body.to_vec())
}

/// Key derived from the access code and the card's session uid
pub fn protocol_key(access_code: &[u8], uid: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(access_code, uid, 50, &mut key);
    key
}

/// Final session key from the agreed secret and the protocol key
pub fn session_key(secret: &[u8], protocol_key: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(protocol_key);
    hasher.finalize().into()
}

/// One side of the OpenSession key agreement
pub enum KeyAgreement {
    Fast { key_a: [u8; 16] },
    Strong { secret: SecretKey, key_a: Vec<u8> },
}

impl KeyAgreement {
    /// `None` for unencrypted sessions
    pub fn new(mode: EncryptionMode) -> Option<Self> {
        match mode {
            EncryptionMode::None => None,
            EncryptionMode::Fast => {
                let mut key_a = [0u8; 16];
                rand::rng().fill_bytes(&mut key_a);
                Some(Self::Fast { key_a })
            }
            EncryptionMode::Strong => {
                let secret = SecretKey::random(&mut rand_v8::thread_rng());
                let key_a = secret
                    .public_key()
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec();
                Some(Self::Strong { secret, key_a })
            }
        }
    }

    /// Our half, sent as SessionKeyA
    pub fn key_a(&self) -> &[u8] {
        match self {
            Self::Fast { key_a } => key_a,
            Self::Strong { key_a, .. } => key_a,
        }
    }

    /// Combine with the card's SessionKeyB
    pub fn shared_secret(&self, key_b: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Fast { key_a } => Ok([key_a.as_slice(), key_b].concat()),
            Self::Strong { secret, .. } => {
                let public = PublicKey::from_sec1_bytes(key_b)
                    .map_err(|e| TangemSdkError::CryptoUtilsError(e.to_string()))?;
                let shared = k256::elliptic_curve::ecdh::diffie_hellman(
                    secret.to_nonzero_scalar(),
                    public.as_affine(),
                );
                Ok(shared.raw_secret_bytes().to_vec())
            }
        }
    }
}
