//! Session configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::apdu::EncryptionMode;
use crate::card::FirmwareType;
use crate::error::{Result, TangemSdkError};

/// Options shared by every session started with them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Run command prechecks and translate card errors into domain errors
    pub handle_errors: bool,
    /// Send a terminal public key so the card can skip the security delay next time
    pub linked_terminal: bool,
    /// Encryption requested up front; the card may still escalate it
    pub default_encryption_mode: EncryptionMode,
    /// Firmware flavours accepted by the preflight read
    pub allowed_card_types: Vec<FirmwareType>,
    /// Only this card is accepted when set
    pub card_id: Option<String>,
    /// Remember non-default access codes per card
    pub save_access_codes: bool,
    /// Return secp256k1 signatures in low-S form
    pub canonize_secp256k1_signatures: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            handle_errors: true,
            linked_terminal: false,
            default_encryption_mode: EncryptionMode::None,
            allowed_card_types: vec![FirmwareType::Sdk, FirmwareType::Release, FirmwareType::Special],
            card_id: None,
            save_access_codes: false,
            canonize_secp256k1_signatures: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TangemSdkError::DecodingFailed(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TangemSdkError::Underlying(e.to_string()))?;
        Self::from_json(&json)
    }

    pub const fn with_handle_errors(mut self, handle_errors: bool) -> Self {
        self.handle_errors = handle_errors;
        self
    }

    pub const fn with_linked_terminal(mut self, linked_terminal: bool) -> Self {
        self.linked_terminal = linked_terminal;
        self
    }

    pub const fn with_encryption_mode(mut self, mode: EncryptionMode) -> Self {
        self.default_encryption_mode = mode;
        self
    }

    pub fn with_card_id(mut self, card_id: impl Into<String>) -> Self {
        self.card_id = Some(card_id.into());
        self
    }

    pub fn with_allowed_card_types(mut self, types: Vec<FirmwareType>) -> Self {
        self.allowed_card_types = types;
        self
    }

    pub const fn with_save_access_codes(mut self, save: bool) -> Self {
        self.save_access_codes = save;
        self
    }

    pub const fn with_canonize_secp256k1_signatures(mut self, canonize: bool) -> Self {
        self.canonize_secp256k1_signatures = canonize;
        self
    }
}
