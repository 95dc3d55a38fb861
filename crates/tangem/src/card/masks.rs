//! Bit masks carried by card and wallet TLVs.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::tlv::{TlvDecode, TlvEncode, TlvValueType, read_uint};

macro_rules! bit_mask {
    (
        $(#[$meta:meta])*
        $name:ident: $value_type:ident, $width:literal {
            $($flag:ident = $bit:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            $(pub const $flag: Self = Self($bit);)+

            const NAMES: &'static [(&'static str, u32)] = &[$((stringify!($flag), $bit)),+];

            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }

            pub const fn contains(self, flag: Self) -> bool {
                self.0 & flag.0 == flag.0 && flag.0 != 0
            }

            #[must_use]
            pub const fn with(self, flag: Self) -> Self {
                Self(self.0 | flag.0)
            }

            #[must_use]
            pub const fn with_if(self, flag: Self, condition: bool) -> Self {
                if condition { self.with(flag) } else { self }
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.with(rhs)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let names: Vec<_> = Self::NAMES
                    .iter()
                    .filter(|(_, bit)| self.0 & bit != 0)
                    .map(|(name, _)| *name)
                    .collect();
                write!(f, "{}({:#X})[{}]", stringify!($name), self.0, names.join(", "))
            }
        }

        impl TlvDecode for $name {
            fn accepts(value_type: TlvValueType) -> bool {
                value_type == TlvValueType::$value_type
            }

            fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
                read_uint(data, $width).map(Self)
            }
        }
    };
}

bit_mask! {
    /// Card-wide settings fixed at personalization
    SettingsMask: SettingsMask, 4 {
        IS_REUSABLE = 0x0001,
        USE_ACTIVATION = 0x0002,
        PERMANENT_WALLET = 0x0004,
        USE_BLOCK = 0x0008,
        ALLOW_SET_PIN1 = 0x0010,
        ALLOW_SET_PIN2 = 0x0020,
        USE_CVC = 0x0040,
        PROHIBIT_DEFAULT_PIN1 = 0x0080,
        USE_ONE_COMMAND_AT_TIME = 0x0100,
        USE_NDEF = 0x0200,
        USE_DYNAMIC_NDEF = 0x0400,
        SMART_SECURITY_DELAY = 0x0800,
        ALLOW_UNENCRYPTED = 0x1000,
        ALLOW_FAST_ENCRYPTION = 0x2000,
        PROTECT_ISSUER_DATA_AGAINST_REPLAY = 0x4000,
        ALLOW_SELECT_BLOCKCHAIN = 0x8000,
        DISABLE_PRECOMPUTED_NDEF = 0x0001_0000,
        SKIP_SECURITY_DELAY_IF_VALIDATED_BY_ISSUER = 0x0002_0000,
        SKIP_CHECK_PIN2_CVC_IF_VALIDATED_BY_ISSUER = 0x0004_0000,
        SKIP_SECURITY_DELAY_IF_VALIDATED_BY_LINKED_TERMINAL = 0x0008_0000,
        RESTRICT_OVERWRITE_ISSUER_EXTRA_DATA = 0x0010_0000,
        ALLOW_HD_WALLETS = 0x0020_0000,
        DISABLE_ISSUER_DATA = 0x0100_0000,
        DISABLE_USER_DATA = 0x0200_0000,
        DISABLE_FILES = 0x0400_0000,
    }
}

bit_mask! {
    /// Per-wallet settings, sent with CreateWallet on multi-wallet cards
    WalletSettingsMask: SettingsMask, 4 {
        IS_REUSABLE = 0x0001,
        IS_PERMANENT = 0x0004,
    }
}

bit_mask! {
    /// Kind of product the card was issued as
    ProductMask: ProductMask, 1 {
        NOTE = 0x01,
        TAG = 0x02,
        ID_CARD = 0x04,
        ID_ISSUER = 0x08,
        AUTHENTICATION = 0x10,
        TWIN_CARD = 0x20,
    }
}

impl SettingsMask {
    pub const fn to_wallet_settings(self) -> WalletSettingsMask {
        WalletSettingsMask::from_raw(self.0 & (WalletSettingsMask::IS_REUSABLE.0 | WalletSettingsMask::IS_PERMANENT.0))
    }
}

/// Settings masks use two bytes unless a flag lives in the upper half
impl TlvEncode for SettingsMask {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::SettingsMask
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(encode_settings(self.0))
    }
}

impl TlvEncode for WalletSettingsMask {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::SettingsMask
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(encode_settings(self.0))
    }
}

fn encode_settings(raw: u32) -> Vec<u8> {
    match u16::try_from(raw) {
        Ok(short) => short.to_be_bytes().to_vec(),
        Err(_) => raw.to_be_bytes().to_vec(),
    }
}

impl TlvEncode for ProductMask {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::ProductMask
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        u8::try_from(self.0).ok().map(|b| vec![b])
    }
}

/// One way a card may accept data for signing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SigningMethodCode {
    SignHash = 0,
    SignRaw = 1,
    SignHashSignedByIssuer = 2,
    SignRawSignedByIssuer = 3,
    SignHashSignedByIssuerAndUpdateIssuerData = 4,
    SignRawSignedByIssuerAndUpdateIssuerData = 5,
    SignPos = 6,
}

impl SigningMethodCode {
    const ALL: [Self; 7] = [
        Self::SignHash,
        Self::SignRaw,
        Self::SignHashSignedByIssuer,
        Self::SignRawSignedByIssuer,
        Self::SignHashSignedByIssuerAndUpdateIssuerData,
        Self::SignRawSignedByIssuerAndUpdateIssuerData,
        Self::SignPos,
    ];
}

/// Set of signing methods.
///
/// A single method is sent as its own code. Several methods are sent as a bit
/// set with the high bit raised.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SigningMethod(u8);

impl SigningMethod {
    const MULTIPLE: u8 = 0x80;

    pub const SIGN_HASH: Self = Self(SigningMethodCode::SignHash as u8);

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub fn build(methods: &[SigningMethodCode]) -> Self {
        match methods {
            [] => Self(0),
            [single] => Self(*single as u8),
            many => Self(
                many.iter()
                    .fold(Self::MULTIPLE, |acc, method| acc | (1 << *method as u8)),
            ),
        }
    }

    pub const fn contains(self, method: SigningMethodCode) -> bool {
        if self.0 & Self::MULTIPLE == 0 {
            self.0 == method as u8
        } else {
            self.0 & (1 << method as u8) != 0
        }
    }

    pub fn methods(self) -> Vec<SigningMethodCode> {
        SigningMethodCode::ALL
            .into_iter()
            .filter(|m| self.contains(*m))
            .collect()
    }
}

impl fmt::Debug for SigningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningMethod({:#04X}){:?}", self.0, self.methods())
    }
}

impl TlvEncode for SigningMethod {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::SigningMethod
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(vec![self.0])
    }
}

impl TlvDecode for SigningMethod {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::SigningMethod
    }

    fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
        read_uint(data, 1).and_then(|v| u8::try_from(v).ok()).map(Self)
    }
}
