//! Card snapshot as reported by the `Read` command.

mod curve;
mod deserializer;
mod firmware;
mod masks;
mod wallet;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use curve::EllipticCurve;
pub use deserializer::{CardDeserializer, WalletDeserializer};
pub use firmware::{FirmwareType, FirmwareVersion};
pub use masks::{ProductMask, SettingsMask, SigningMethod, SigningMethodCode, WalletSettingsMask};
pub use wallet::{CardWallet, WalletSettings, WalletStatus};

use crate::apdu::EncryptionMode;
use crate::tlv::{TlvDecode, TlvEncode, TlvValueType, read_uint};

/// Detailed card information.
///
/// Wallet updates return a new snapshot instead of mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub card_id: String,
    pub batch_id: String,
    #[serde(with = "crate::hex_serde")]
    pub card_public_key: Vec<u8>,
    pub firmware_version: FirmwareVersion,
    pub manufacturer: Manufacturer,
    pub issuer: Issuer,
    pub settings: CardSettings,
    pub linked_terminal_status: LinkedTerminalStatus,
    pub is_access_code_set: bool,
    /// Known on COS 4.1 and later
    pub is_passcode_set: Option<bool>,
    pub supported_curves: Vec<EllipticCurve>,
    pub wallets: Vec<CardWallet>,
    /// Any non-zero value means the chip reports a hardware problem
    #[serde(skip)]
    pub health: Option<u16>,
    /// Legacy single-wallet counter
    #[serde(skip)]
    pub remaining_signatures: Option<u32>,
}

impl Card {
    pub fn wallet(&self, public_key: &[u8]) -> Option<&CardWallet> {
        self.wallets.iter().find(|w| w.public_key == public_key)
    }

    pub fn wallet_by_index(&self, index: u8) -> Option<&CardWallet> {
        self.wallets.iter().find(|w| w.index == index)
    }

    /// Replace every wallet, ordered by slot index
    #[must_use]
    pub fn set_wallets(&self, mut wallets: Vec<CardWallet>) -> Self {
        wallets.sort_by_key(|w| w.index);
        Self {
            wallets,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn add_wallet(&self, wallet: CardWallet) -> Self {
        let mut wallets = self.wallets.clone();
        wallets.push(wallet);
        self.set_wallets(wallets)
    }

    #[must_use]
    pub fn remove_wallet(&self, public_key: &[u8]) -> Self {
        let wallets = self
            .wallets
            .iter()
            .filter(|w| w.public_key != public_key)
            .cloned()
            .collect();
        self.set_wallets(wallets)
    }

    /// Replace the wallet in the same slot; unknown slots leave the card untouched
    #[must_use]
    pub fn update_wallet(&self, wallet: CardWallet) -> Self {
        let wallets = self
            .wallets
            .iter()
            .map(|w| if w.index == wallet.index { wallet.clone() } else { w.clone() })
            .collect();
        self.set_wallets(wallets)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Card {}:", self.card_id)?;
        writeln!(f, "  Firmware: {}", self.firmware_version)?;
        writeln!(f, "  Batch: {}", self.batch_id)?;
        writeln!(f, "  Manufacturer: {}", self.manufacturer.name)?;
        writeln!(f, "  Issuer: {}", self.issuer.name)?;
        writeln!(f, "  Access code set: {}", self.is_access_code_set)?;
        if let Some(is_set) = self.is_passcode_set {
            writeln!(f, "  Passcode set: {is_set}")?;
        }
        writeln!(
            f,
            "  Wallets: {}/{}",
            self.wallets.len(),
            self.settings.max_wallets_count
        )?;
        for wallet in &self.wallets {
            writeln!(
                f,
                "    #{} {} {}",
                wallet.index,
                wallet.curve,
                hex::encode(&wallet.public_key)
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manufacturer {
    pub name: String,
    pub manufacture_date: ManufactureDate,
    /// Signature of the card id with the manufacturer key. COS 1.21+
    #[serde(with = "crate::hex_serde::option", default)]
    pub signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuer {
    pub name: String,
    #[serde(with = "crate::hex_serde")]
    pub public_key: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkedTerminalStatus {
    Current,
    Other,
    None,
}

/// Settings fixed at personalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSettings {
    /// Delay in milliseconds before commands touching sensitive data
    pub security_delay: u32,
    pub max_wallets_count: u8,
    pub is_setting_access_code_allowed: bool,
    pub is_setting_passcode_allowed: bool,
    pub is_removing_access_code_allowed: bool,
    pub is_linked_terminal_enabled: bool,
    pub supported_encryption_modes: Vec<EncryptionMode>,
    pub is_permanent_wallet: bool,
    pub is_files_allowed: bool,
    pub is_hd_wallet_allowed: bool,
    pub default_signing_methods: Option<SigningMethod>,
    pub default_curve: Option<EllipticCurve>,
    pub mask: SettingsMask,
}

impl CardSettings {
    pub fn new(
        security_delay: u32,
        max_wallets_count: u8,
        mask: SettingsMask,
        default_signing_methods: Option<SigningMethod>,
        default_curve: Option<EllipticCurve>,
    ) -> Self {
        let mut supported_encryption_modes = vec![EncryptionMode::Strong];
        if mask.contains(SettingsMask::ALLOW_FAST_ENCRYPTION) {
            supported_encryption_modes.push(EncryptionMode::Fast);
        }
        if mask.contains(SettingsMask::ALLOW_UNENCRYPTED) {
            supported_encryption_modes.push(EncryptionMode::None);
        }

        Self {
            security_delay,
            max_wallets_count,
            is_setting_access_code_allowed: mask.contains(SettingsMask::ALLOW_SET_PIN1),
            is_setting_passcode_allowed: mask.contains(SettingsMask::ALLOW_SET_PIN2),
            is_removing_access_code_allowed: !mask.contains(SettingsMask::PROHIBIT_DEFAULT_PIN1),
            is_linked_terminal_enabled: mask
                .contains(SettingsMask::SKIP_SECURITY_DELAY_IF_VALIDATED_BY_LINKED_TERMINAL),
            supported_encryption_modes,
            is_permanent_wallet: mask.contains(SettingsMask::PERMANENT_WALLET),
            is_files_allowed: !mask.contains(SettingsMask::DISABLE_FILES),
            is_hd_wallet_allowed: mask.contains(SettingsMask::ALLOW_HD_WALLETS),
            default_signing_methods,
            default_curve,
            mask,
        }
    }

    pub const fn is_select_blockchain_allowed(&self) -> bool {
        self.mask.contains(SettingsMask::ALLOW_SELECT_BLOCKCHAIN)
    }

    pub const fn is_issuer_data_protected_against_replay(&self) -> bool {
        self.mask
            .contains(SettingsMask::PROTECT_ISSUER_DATA_AGAINST_REPLAY)
    }
}

/// Card lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardStatus {
    NotPersonalized,
    Empty,
    Loaded,
    Purged,
}

impl CardStatus {
    pub const fn code(self) -> u8 {
        match self {
            Self::NotPersonalized => 0,
            Self::Empty => 1,
            Self::Loaded => 2,
            Self::Purged => 3,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NotPersonalized),
            1 => Some(Self::Empty),
            2 => Some(Self::Loaded),
            3 => Some(Self::Purged),
            _ => None,
        }
    }
}

impl TlvEncode for CardStatus {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::CardStatus
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(vec![self.code()])
    }
}

impl TlvDecode for CardStatus {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::CardStatus
    }

    fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
        read_uint(data, 1)
            .and_then(|v| u8::try_from(v).ok())
            .and_then(Self::from_code)
    }
}

/// Calendar date written as `year(2) month(1) day(1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManufactureDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl ManufactureDate {
    pub fn new(year: u16, month: u8, day: u8) -> Option<Self> {
        ((1..=12).contains(&month) && (1..=31).contains(&day)).then_some(Self { year, month, day })
    }
}

impl fmt::Display for ManufactureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl TlvEncode for ManufactureDate {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::DateTime
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        let [hi, lo] = self.year.to_be_bytes();
        Some(vec![hi, lo, self.month, self.day])
    }
}

impl TlvDecode for ManufactureDate {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::DateTime
    }

    fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
        match data {
            [hi, lo, month, day] => Self::new(u16::from_be_bytes([*hi, *lo]), *month, *day),
            _ => None,
        }
    }
}
