//! TLV tag catalogue.
//!
//! The codes are fixed by the card firmware. A tag's [`TlvValueType`] decides how
//! its value bytes are interpreted by the encoder and the decoder.

use derive_more::Display;

/// How the bytes of a TLV value are to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TlvValueType {
    HexString,
    Utf8String,
    Uint8,
    Uint16,
    Uint32,
    Bool,
    ByteArray,
    EllipticCurve,
    DateTime,
    ProductMask,
    SettingsMask,
    CardStatus,
    SigningMethod,
    InteractionMode,
    DerivationPath,
    FileSettings,
}

macro_rules! tlv_tags {
    ($($(#[$meta:meta])* $name:ident = $code:literal => $ty:ident),+ $(,)?) => {
        /// Tag of a TLV record
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TlvTag {
            $($(#[$meta])* $name,)+
            /// A code this SDK does not know; kept so that nothing is lost on decode
            Unknown(u8),
        }

        impl TlvTag {
            /// Wire code of the tag
            pub const fn code(self) -> u8 {
                match self {
                    $(Self::$name => $code,)+
                    Self::Unknown(code) => code,
                }
            }

            /// Map a wire code back to a tag
            pub const fn from_code(code: u8) -> Self {
                match code {
                    $($code => Self::$name,)+
                    other => Self::Unknown(other),
                }
            }

            /// Expected value type of the tag
            pub const fn value_type(self) -> TlvValueType {
                match self {
                    $(Self::$name => TlvValueType::$ty,)+
                    Self::Unknown(_) => TlvValueType::ByteArray,
                }
            }
        }
    };
}

tlv_tags! {
    CardId = 0x01 => HexString,
    Status = 0x02 => CardStatus,
    CardPublicKey = 0x03 => ByteArray,
    CardSignature = 0x04 => ByteArray,
    CurveId = 0x05 => EllipticCurve,
    HashAlgId = 0x06 => ByteArray,
    SigningMethod = 0x07 => SigningMethod,
    MaxSignatures = 0x08 => Uint32,
    PauseBeforePin2 = 0x09 => Uint16,
    SettingsMask = 0x0A => SettingsMask,
    Uid = 0x0B => ByteArray,
    /// Nested TLV block with manufacturing data
    CardData = 0x0C => ByteArray,
    NdefData = 0x0D => ByteArray,
    CreateWalletAtPersonalize = 0x0E => Bool,
    Health = 0x0F => Uint16,
    Pin = 0x10 => ByteArray,
    Pin2 = 0x11 => ByteArray,
    NewPin = 0x12 => ByteArray,
    NewPin2 = 0x13 => ByteArray,
    PublicKeyChallenge = 0x14 => ByteArray,
    PublicKeySalt = 0x15 => ByteArray,
    Challenge = 0x16 => ByteArray,
    Salt = 0x17 => ByteArray,
    ValidationCounter = 0x18 => ByteArray,
    Cvc = 0x19 => ByteArray,
    SessionKeyA = 0x1A => ByteArray,
    SessionKeyB = 0x1B => ByteArray,
    /// Remaining security delay, in tens of milliseconds
    Pause = 0x1C => Uint16,
    NewPin3 = 0x1E => ByteArray,
    CrExKey = 0x1F => ByteArray,
    ManufacturerName = 0x20 => Utf8String,
    InteractionMode = 0x23 => InteractionMode,
    Offset = 0x24 => Uint16,
    Size = 0x25 => Uint16,
    FileIndex = 0x26 => Uint8,
    FileSettings = 0x27 => FileSettings,
    UserData = 0x2A => ByteArray,
    UserProtectedData = 0x2B => ByteArray,
    UserCounter = 0x2C => Uint32,
    UserProtectedCounter = 0x2D => Uint32,
    UserSettingsMask = 0x2F => ByteArray,
    IssuerPublicKey = 0x30 => ByteArray,
    IssuerTransactionPublicKey = 0x31 => ByteArray,
    IssuerData = 0x32 => ByteArray,
    IssuerDataSignature = 0x33 => ByteArray,
    IssuerTransactionSignature = 0x34 => ByteArray,
    IssuerDataCounter = 0x35 => Uint32,
    ResetPin = 0x36 => ByteArray,
    AcquirerPublicKey = 0x37 => ByteArray,
    IsActivated = 0x3A => Bool,
    ActivationSeed = 0x3B => ByteArray,
    CodeHash = 0x42 => ByteArray,
    TransactionOutHash = 0x50 => ByteArray,
    TransactionOutHashSize = 0x51 => ByteArray,
    TransactionOutRaw = 0x52 => ByteArray,
    PaymentFlowVersion = 0x54 => ByteArray,
    Certificate = 0x55 => ByteArray,
    TerminalTransactionSignature = 0x57 => ByteArray,
    TerminalIsLinked = 0x58 => Bool,
    Pin2IsDefault = 0x59 => Bool,
    PinIsDefault = 0x5A => Bool,
    TerminalPublicKey = 0x5C => ByteArray,
    WalletPublicKey = 0x60 => ByteArray,
    WalletSignature = 0x61 => ByteArray,
    WalletRemainingSignatures = 0x62 => Uint16,
    WalletSignedHashes = 0x63 => Uint16,
    CheckWalletCounter = 0x64 => Uint8,
    WalletIndex = 0x65 => Uint8,
    WalletsCount = 0x66 => Uint8,
    WalletData = 0x67 => ByteArray,
    /// Nested TLV block describing one wallet
    CardWallet = 0x68 => ByteArray,
    WalletHdPath = 0x6A => DerivationPath,
    WalletHdChain = 0x6B => ByteArray,
    WalletPrivateKey = 0x6F => ByteArray,
    FileTypeName = 0x70 => Utf8String,
    FileData = 0x71 => ByteArray,
    FileSignature = 0x73 => ByteArray,
    FileCounter = 0x74 => Uint8,
    FileOwnerIndex = 0x75 => Uint8,
    Firmware = 0x80 => Utf8String,
    BatchId = 0x81 => HexString,
    ManufactureDateTime = 0x82 => DateTime,
    IssuerName = 0x83 => Utf8String,
    BlockchainName = 0x84 => Utf8String,
    ManufacturerPublicKey = 0x85 => ByteArray,
    CardIdManufacturerSignature = 0x86 => ByteArray,
    ProductMask = 0x8A => ProductMask,
    TokenSymbol = 0xA0 => Utf8String,
    TokenContractAddress = 0xA1 => Utf8String,
    TokenDecimal = 0xA2 => Uint16,
    TokenName = 0xA3 => Utf8String,
    BackupStatus = 0xD0 => ByteArray,
    BackupCount = 0xD1 => Uint8,
}

impl TlvTag {
    /// Values of these tags never reach the logs in clear
    pub const fn is_sensitive(self) -> bool {
        matches!(
            self,
            Self::CardId
                | Self::Pin
                | Self::Pin2
                | Self::NewPin
                | Self::NewPin2
                | Self::NewPin3
                | Self::Cvc
                | Self::CrExKey
                | Self::SessionKeyA
                | Self::SessionKeyB
                | Self::CardPublicKey
                | Self::CardSignature
                | Self::WalletPublicKey
                | Self::WalletSignature
                | Self::WalletPrivateKey
                | Self::WalletHdChain
                | Self::TransactionOutHash
                | Self::TerminalPublicKey
                | Self::TerminalTransactionSignature
                | Self::IssuerDataSignature
                | Self::CardIdManufacturerSignature
                | Self::CodeHash
                | Self::FileData
                | Self::IssuerData
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in 0u8..=0xFF {
            assert_eq!(TlvTag::from_code(code).code(), code);
        }
        assert_eq!(TlvTag::from_code(0x01), TlvTag::CardId);
        assert_eq!(TlvTag::from_code(0x8A), TlvTag::ProductMask);
        assert_eq!(TlvTag::from_code(0xEE), TlvTag::Unknown(0xEE));
    }

    #[test]
    fn test_value_types() {
        assert_eq!(TlvTag::CardId.value_type(), TlvValueType::HexString);
        assert_eq!(TlvTag::IsActivated.value_type(), TlvValueType::Bool);
        assert_eq!(TlvTag::WalletHdPath.value_type(), TlvValueType::DerivationPath);
        assert_eq!(TlvTag::Unknown(0xEE).value_type(), TlvValueType::ByteArray);
    }
}
