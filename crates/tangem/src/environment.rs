//! Mutable state of one card session.

use std::fmt;

use k256::ecdsa::{Signature, SigningKey, signature::Signer};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::apdu::EncryptionMode;
use crate::card::Card;
use crate::config::Config;

/// Which of the two user secrets a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserCodeType {
    /// PIN1, needed to talk to the card at all
    AccessCode,
    /// PIN2, needed for signing and wallet management
    Passcode,
}

impl UserCodeType {
    pub const fn default_value(self) -> &'static str {
        match self {
            Self::AccessCode => "000000",
            Self::Passcode => "000",
        }
    }
}

impl fmt::Display for UserCodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessCode => f.write_str("access code"),
            Self::Passcode => f.write_str("passcode"),
        }
    }
}

/// SHA-256 of a user code, as sent to the card
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "zeroize", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub struct UserCode {
    #[cfg_attr(feature = "zeroize", zeroize(skip))]
    code_type: UserCodeType,
    value: Option<Vec<u8>>,
}

impl UserCode {
    /// The factory default code of `code_type`
    pub fn new(code_type: UserCodeType) -> Self {
        Self::from_code(code_type, code_type.default_value())
    }

    pub fn from_code(code_type: UserCodeType, code: &str) -> Self {
        Self::from_hash(code_type, Sha256::digest(code.as_bytes()).to_vec())
    }

    pub const fn from_hash(code_type: UserCodeType, hash: Vec<u8>) -> Self {
        Self {
            code_type,
            value: Some(hash),
        }
    }

    /// A code that is not known at all, as opposed to the default one
    pub const fn unknown(code_type: UserCodeType) -> Self {
        Self {
            code_type,
            value: None,
        }
    }

    pub const fn code_type(&self) -> UserCodeType {
        self.code_type
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.value.as_deref()
            == Some(Sha256::digest(self.code_type.default_value().as_bytes()).as_slice())
    }
}

impl fmt::Debug for UserCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCode")
            .field("code_type", &self.code_type)
            .field("is_set", &self.value.is_some())
            .field("is_default", &self.is_default())
            .finish()
    }
}

/// Key pair used by the linked terminal feature
#[derive(Clone)]
pub struct TerminalKeys {
    secret: SecretKey,
    public_key: Vec<u8>,
}

impl TerminalKeys {
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::random(&mut rand_v8::thread_rng()))
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public_key = secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        Self { secret, public_key }
    }

    /// Uncompressed SEC1 public key
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// 64-byte `r || s` signature over SHA-256 of `data`
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let signature: Signature = SigningKey::from(&self.secret).sign(data);
        signature.to_bytes().to_vec()
    }
}

impl fmt::Debug for TerminalKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalKeys")
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Everything commands read and write while a session is open
#[derive(Debug, Clone)]
pub struct SessionEnvironment {
    pub config: Config,
    /// Set by the first successful read
    pub card: Option<Card>,
    pub encryption_mode: EncryptionMode,
    pub encryption_key: Option<Vec<u8>>,
    pub cvc: Option<Vec<u8>>,
    pub access_code: UserCode,
    pub passcode: UserCode,
    pub terminal_keys: Option<TerminalKeys>,
}

impl Default for SessionEnvironment {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl SessionEnvironment {
    pub fn new(config: Config) -> Self {
        let terminal_keys = config.linked_terminal.then(TerminalKeys::generate);
        Self {
            encryption_mode: config.default_encryption_mode,
            config,
            card: None,
            encryption_key: None,
            cvc: None,
            access_code: UserCode::new(UserCodeType::AccessCode),
            passcode: UserCode::new(UserCodeType::Passcode),
            terminal_keys,
        }
    }

    pub const fn user_code(&self, code_type: UserCodeType) -> &UserCode {
        match code_type {
            UserCodeType::AccessCode => &self.access_code,
            UserCodeType::Passcode => &self.passcode,
        }
    }

    pub fn set_user_code(&mut self, code_type: UserCodeType, code: &str) {
        self.set_user_code_hash(code_type, Sha256::digest(code.as_bytes()).to_vec());
    }

    pub fn set_user_code_hash(&mut self, code_type: UserCodeType, hash: Vec<u8>) {
        let code = UserCode::from_hash(code_type, hash);
        match code_type {
            UserCodeType::AccessCode => self.access_code = code,
            UserCodeType::Passcode => self.passcode = code,
        }
    }

    /// The environment holds a code other than the factory default
    pub fn is_user_code_set(&self, code_type: UserCodeType) -> bool {
        let code = self.user_code(code_type);
        code.value().is_some() && !code.is_default()
    }

    pub fn access_code_value(&self) -> Option<&[u8]> {
        self.access_code.value()
    }

    pub fn passcode_value(&self) -> Option<&[u8]> {
        self.passcode.value()
    }

    pub fn terminal_public_key(&self) -> Option<&[u8]> {
        self.terminal_keys.as_ref().map(TerminalKeys::public_key)
    }
}
