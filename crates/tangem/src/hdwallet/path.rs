use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::HdWalletError;
use crate::tlv::{TlvDecode, TlvEncode, TlvValueType};

/// First index of the hardened range
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

const MASTER_SYMBOL: &str = "m";
const SEPARATOR: char = '/';

/// One step of a BIP32 path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivationNode {
    Hardened(u32),
    NonHardened(u32),
}

impl DerivationNode {
    /// Node for a raw child number, hardened from [`HARDENED_OFFSET`] up
    pub const fn from_index(index: u32) -> Self {
        if index >= HARDENED_OFFSET {
            Self::Hardened(index - HARDENED_OFFSET)
        } else {
            Self::NonHardened(index)
        }
    }

    /// Child number including the hardened offset
    pub const fn index(self) -> u32 {
        match self {
            Self::Hardened(index) => index | HARDENED_OFFSET,
            Self::NonHardened(index) => index,
        }
    }

    pub const fn is_hardened(self) -> bool {
        matches!(self, Self::Hardened(_))
    }

    pub const fn to_non_hardened(self) -> Self {
        match self {
            Self::Hardened(index) | Self::NonHardened(index) => Self::NonHardened(index),
        }
    }
}

impl fmt::Display for DerivationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardened(index) => write!(f, "{index}'"),
            Self::NonHardened(index) => write!(f, "{index}"),
        }
    }
}

impl FromStr for DerivationNode {
    type Err = HdWalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let item = s.trim();
        let (digits, hardened) = match item.strip_suffix(['\'', 'h', 'H']) {
            Some(digits) => (digits.trim_end(), true),
            None => (item, false),
        };
        let index: u32 = digits.parse().map_err(|_| HdWalletError::WrongPath)?;
        if index >= HARDENED_OFFSET {
            return Err(HdWalletError::WrongPath);
        }
        Ok(if hardened {
            Self::Hardened(index)
        } else {
            Self::NonHardened(index)
        })
    }
}

/// A BIP32 derivation path such as `m/44'/0'/0'/1/0`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    nodes: Vec<DerivationNode>,
}

impl DerivationPath {
    pub const fn new(nodes: Vec<DerivationNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[DerivationNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A copy of the path with `node` appended
    #[must_use]
    pub fn extend(&self, node: DerivationNode) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.push(node);
        Self { nodes }
    }

    /// The same indices without the hardened flag
    #[must_use]
    pub fn to_non_hardened(&self) -> Self {
        Self::new(self.nodes.iter().map(|node| node.to_non_hardened()).collect())
    }

    /// Card form: 4-byte big-endian child numbers back to back
    pub fn to_bytes(&self) -> Vec<u8> {
        self.nodes
            .iter()
            .flat_map(|node| node.index().to_be_bytes())
            .collect()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, HdWalletError> {
        if data.len() % 4 != 0 {
            return Err(HdWalletError::WrongPath);
        }
        let nodes = data
            .chunks_exact(4)
            .map(|chunk| DerivationNode::from_index(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
            .collect();
        Ok(Self { nodes })
    }
}

impl FromStr for DerivationPath {
    type Err = HdWalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut items = s.split(SEPARATOR);
        let master = items.next().map(str::trim).unwrap_or_default();
        if !master.eq_ignore_ascii_case(MASTER_SYMBOL) {
            return Err(HdWalletError::WrongPath);
        }
        let nodes = items.map(str::parse).collect::<Result<Vec<_>, _>>()?;
        if nodes.is_empty() {
            return Err(HdWalletError::WrongPath);
        }
        Ok(Self { nodes })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASTER_SYMBOL)?;
        for node in &self.nodes {
            write!(f, "{SEPARATOR}{node}")?;
        }
        Ok(())
    }
}

impl From<Vec<DerivationNode>> for DerivationPath {
    fn from(nodes: Vec<DerivationNode>) -> Self {
        Self::new(nodes)
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl TlvEncode for DerivationPath {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::DerivationPath
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(self.to_bytes())
    }
}

impl TlvDecode for DerivationPath {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::DerivationPath
    }

    fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
        Self::from_bytes(data).ok()
    }
}
