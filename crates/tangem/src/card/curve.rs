use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TangemSdkError;
use crate::tlv::{TlvDecode, TlvEncode, TlvValueType};

/// Elliptic curves a card wallet can be created on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EllipticCurve {
    #[serde(rename = "secp256k1")]
    Secp256k1,
    #[serde(rename = "ed25519")]
    Ed25519,
    #[serde(rename = "secp256r1")]
    Secp256r1,
}

impl EllipticCurve {
    pub const ALL: [Self; 3] = [Self::Secp256k1, Self::Ed25519, Self::Secp256r1];

    /// Name as it appears on the wire
    pub const fn name(self) -> &'static str {
        match self {
            Self::Secp256k1 => "secp256k1",
            Self::Ed25519 => "ed25519",
            Self::Secp256r1 => "secp256r1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|curve| curve.name() == name)
    }
}

impl fmt::Display for EllipticCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EllipticCurve {
    type Err = TangemSdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(&s.to_ascii_lowercase()).ok_or(TangemSdkError::UnsupportedCurve)
    }
}

impl TlvEncode for EllipticCurve {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::EllipticCurve
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(self.name().as_bytes().to_vec())
    }
}

impl TlvDecode for EllipticCurve {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::EllipticCurve
    }

    fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
        let end = data.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
        std::str::from_utf8(&data[..end]).ok().and_then(Self::from_name)
    }
}
