//! Tag-length-value records as spoken by Tangem cards.
//!
//! A record is `tag(1) | length(1 or 3) | value`. Lengths up to 0xFE use one
//! byte; longer values use `0xFF` followed by a big-endian `u16`.

mod builder;
mod decoder;
mod tag;
mod value;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

pub use builder::TlvBuilder;
pub use decoder::TlvDecoder;
pub use tag::{TlvTag, TlvValueType};
pub use value::{TlvDecode, TlvEncode};
pub(crate) use value::read_uint;

/// A single TLV record
#[derive(Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tag: TlvTag,
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: TlvTag, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Append this record to `buf`
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag.code());
        let len = self.value.len();
        if len > 0xFE {
            buf.put_u8(0xFF);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(len as u8);
        }
        buf.extend_from_slice(&self.value);
    }

    /// Serialize a list of records back to back
    pub fn serialize(tlvs: &[Self]) -> Bytes {
        let mut buf = BytesMut::new();
        for tlv in tlvs {
            tlv.write_to(&mut buf);
        }
        buf.freeze()
    }

    /// Parse every record in `data`.
    ///
    /// A truncated stream yields `None` rather than a partial list.
    pub fn deserialize(data: &[u8]) -> Option<Vec<Self>> {
        let mut tlvs = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let tag = TlvTag::from_code(data[pos]);
            pos += 1;

            let mut len = *data.get(pos)? as usize;
            pos += 1;
            if len == 0xFF {
                let hi = *data.get(pos)? as usize;
                let lo = *data.get(pos + 1)? as usize;
                len = (hi << 8) | lo;
                pos += 2;
            }

            let value = data.get(pos..pos + len)?;
            pos += len;
            tlvs.push(Self::new(tag, Bytes::copy_from_slice(value)));
        }

        Some(tlvs)
    }
}

impl fmt::Debug for Tlv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Tlv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} [0x{:02X}:{}]: ",
            self.tag,
            self.tag.code(),
            self.value.len()
        )?;
        if self.tag.is_sensitive() {
            write!(f, "******")
        } else {
            write!(f, "{}", hex::encode_upper(&self.value))
        }
    }
}
