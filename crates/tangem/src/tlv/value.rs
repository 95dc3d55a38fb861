use bytes::Bytes;

use super::TlvValueType;

/// A Rust value that can be written into a TLV record.
///
/// `accepts` gates which tag value types the type may be written under, so a
/// mismatched pairing is reported instead of producing garbage on the wire.
pub trait TlvEncode {
    fn accepts(value_type: TlvValueType) -> bool;

    /// Encode for a tag of `value_type`; `None` when the value cannot be represented
    fn encode(&self, value_type: TlvValueType) -> Option<Vec<u8>>;
}

/// A Rust value that can be read from a TLV record
pub trait TlvDecode: Sized {
    fn accepts(value_type: TlvValueType) -> bool;

    /// Decode the value bytes of a tag of `value_type`; `None` on malformed bytes
    fn decode(value_type: TlvValueType, data: &[u8]) -> Option<Self>;

    /// Value used when the tag is missing altogether
    fn absent() -> Option<Self> {
        None
    }
}

/// Read a big-endian unsigned integer of 1, 2 or 4 bytes, no wider than `max_width`
pub(crate) fn read_uint(data: &[u8], max_width: usize) -> Option<u32> {
    if !matches!(data.len(), 1 | 2 | 4) || data.len() > max_width {
        return None;
    }
    Some(data.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

impl TlvEncode for [u8] {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::ByteArray
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(self.to_vec())
    }
}

impl TlvEncode for Vec<u8> {
    fn accepts(value_type: TlvValueType) -> bool {
        <[u8]>::accepts(value_type)
    }

    fn encode(&self, value_type: TlvValueType) -> Option<Vec<u8>> {
        self.as_slice().encode(value_type)
    }
}

impl TlvEncode for Bytes {
    fn accepts(value_type: TlvValueType) -> bool {
        <[u8]>::accepts(value_type)
    }

    fn encode(&self, value_type: TlvValueType) -> Option<Vec<u8>> {
        self.as_ref().encode(value_type)
    }
}

impl<const N: usize> TlvEncode for [u8; N] {
    fn accepts(value_type: TlvValueType) -> bool {
        <[u8]>::accepts(value_type)
    }

    fn encode(&self, value_type: TlvValueType) -> Option<Vec<u8>> {
        self.as_slice().encode(value_type)
    }
}

impl TlvDecode for Vec<u8> {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::ByteArray
    }

    fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
        Some(data.to_vec())
    }
}

impl TlvDecode for Bytes {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::ByteArray
    }

    fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
        Some(Self::copy_from_slice(data))
    }
}

impl TlvEncode for str {
    fn accepts(value_type: TlvValueType) -> bool {
        matches!(
            value_type,
            TlvValueType::HexString | TlvValueType::Utf8String
        )
    }

    fn encode(&self, value_type: TlvValueType) -> Option<Vec<u8>> {
        match value_type {
            TlvValueType::HexString => hex::decode(self).ok(),
            _ => Some(self.as_bytes().to_vec()),
        }
    }
}

impl TlvEncode for String {
    fn accepts(value_type: TlvValueType) -> bool {
        str::accepts(value_type)
    }

    fn encode(&self, value_type: TlvValueType) -> Option<Vec<u8>> {
        self.as_str().encode(value_type)
    }
}

impl TlvDecode for String {
    fn accepts(value_type: TlvValueType) -> bool {
        str::accepts(value_type)
    }

    fn decode(value_type: TlvValueType, data: &[u8]) -> Option<Self> {
        match value_type {
            TlvValueType::HexString => Some(hex::encode_upper(data)),
            _ => {
                let end = data.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
                std::str::from_utf8(&data[..end]).ok().map(str::to_owned)
            }
        }
    }
}

macro_rules! impl_uint {
    ($ty:ty, $value_type:ident, $width:literal) => {
        impl TlvEncode for $ty {
            fn accepts(value_type: TlvValueType) -> bool {
                value_type == TlvValueType::$value_type
            }

            fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
                Some(self.to_be_bytes().to_vec())
            }
        }

        impl TlvDecode for $ty {
            fn accepts(value_type: TlvValueType) -> bool {
                value_type == TlvValueType::$value_type
            }

            fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
                read_uint(data, $width).and_then(|v| <$ty>::try_from(v).ok())
            }
        }
    };
}

impl_uint!(u8, Uint8, 1);
impl_uint!(u16, Uint16, 2);
impl_uint!(u32, Uint32, 4);

impl TlvEncode for bool {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::Bool
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(vec![u8::from(*self)])
    }
}

impl TlvDecode for bool {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::Bool
    }

    /// Presence of the tag is what counts, whatever the bytes say
    fn decode(_: TlvValueType, _: &[u8]) -> Option<Self> {
        Some(true)
    }

    fn absent() -> Option<Self> {
        Some(false)
    }
}
