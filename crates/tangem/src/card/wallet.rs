use serde::{Deserialize, Serialize};

use super::EllipticCurve;
use crate::tlv::{TlvDecode, TlvEncode, TlvValueType, read_uint};

/// A key pair living on the card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardWallet {
    #[serde(with = "crate::hex_serde")]
    pub public_key: Vec<u8>,
    /// Present when the wallet supports BIP32 derivation
    #[serde(with = "crate::hex_serde::option", default)]
    pub chain_code: Option<Vec<u8>>,
    pub curve: EllipticCurve,
    pub settings: WalletSettings,
    pub total_signed_hashes: Option<u32>,
    /// Only reported by cards before COS 4
    pub remaining_signatures: Option<u32>,
    pub index: u8,
    pub is_imported: bool,
    pub has_backup: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSettings {
    /// Purging the wallet is prohibited
    pub is_permanent: bool,
}

/// Wallet slot state reported in the `Status` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletStatus {
    Empty,
    Loaded,
    Purged,
    BackedUp,
    BackedUpAndPurged,
    Imported,
    BackedUpImported,
}

impl WalletStatus {
    pub const fn code(self) -> u8 {
        match self {
            Self::Empty => 0x01,
            Self::Loaded => 0x02,
            Self::Purged => 0x03,
            Self::BackedUp => 0x82,
            Self::BackedUpAndPurged => 0x83,
            Self::Imported => 0x42,
            Self::BackedUpImported => 0xC2,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => Self::Empty,
            0x02 => Self::Loaded,
            0x03 => Self::Purged,
            0x82 => Self::BackedUp,
            0x83 => Self::BackedUpAndPurged,
            0x42 => Self::Imported,
            0xC2 => Self::BackedUpImported,
            _ => return None,
        })
    }

    /// Holds a usable key
    pub const fn is_available(self) -> bool {
        !matches!(self, Self::Empty | Self::Purged | Self::BackedUpAndPurged)
    }

    pub const fn is_backed_up(self) -> bool {
        matches!(
            self,
            Self::BackedUp | Self::BackedUpAndPurged | Self::BackedUpImported
        )
    }

    pub const fn is_imported(self) -> bool {
        matches!(self, Self::Imported | Self::BackedUpImported)
    }
}

impl TlvEncode for WalletStatus {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::CardStatus
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(vec![self.code()])
    }
}

impl TlvDecode for WalletStatus {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::CardStatus
    }

    fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
        read_uint(data, 1)
            .and_then(|v| u8::try_from(v).ok())
            .and_then(Self::from_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_status_flags() {
        assert!(WalletStatus::Loaded.is_available());
        assert!(WalletStatus::BackedUpImported.is_available());
        assert!(!WalletStatus::BackedUpAndPurged.is_available());
        assert!(WalletStatus::BackedUpAndPurged.is_backed_up());
        assert_eq!(
            WalletStatus::decode(TlvValueType::CardStatus, &[0xC2]),
            Some(WalletStatus::BackedUpImported)
        );
        assert_eq!(WalletStatus::decode(TlvValueType::CardStatus, &[0x07]), None);
    }
}
