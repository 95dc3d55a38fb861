use tracing::trace;

use super::{Tlv, TlvDecode, TlvTag};
use crate::error::{Result, TangemSdkError};

/// Typed access to a parsed list of TLV records
#[derive(Debug, Clone)]
pub struct TlvDecoder {
    tlvs: Vec<Tlv>,
}

impl TlvDecoder {
    pub const fn new(tlvs: Vec<Tlv>) -> Self {
        Self { tlvs }
    }

    /// Parse a nested TLV block
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Tlv::deserialize(data)
            .map(Self::new)
            .ok_or(TangemSdkError::DeserializeApduFailed)
    }

    pub fn tlvs(&self) -> &[Tlv] {
        &self.tlvs
    }

    /// First record with `tag`
    pub fn find(&self, tag: TlvTag) -> Option<&Tlv> {
        self.tlvs.iter().find(|tlv| tlv.tag == tag)
    }

    /// Every record with `tag`, in stream order
    pub fn find_all(&self, tag: TlvTag) -> impl Iterator<Item = &Tlv> + '_ {
        self.tlvs.iter().filter(move |tlv| tlv.tag == tag)
    }

    /// Decode a required value
    pub fn decode<T: TlvDecode>(&self, tag: TlvTag) -> Result<T> {
        match self.decode_optional(tag)? {
            Some(value) => Ok(value),
            None => T::absent().ok_or_else(|| {
                TangemSdkError::DecodingFailedMissingTag(format!("{tag:?}"))
            }),
        }
    }

    /// Decode a value that may be missing
    pub fn decode_optional<T: TlvDecode>(&self, tag: TlvTag) -> Result<Option<T>> {
        let value_type = tag.value_type();
        if !T::accepts(value_type) {
            return Err(TangemSdkError::DecodingFailedTypeMismatch(format!(
                "{tag:?} is {value_type}"
            )));
        }

        let Some(tlv) = self.find(tag) else {
            return Ok(T::absent());
        };

        trace!("{}", tlv);
        T::decode(value_type, &tlv.value).map(Some).ok_or_else(|| {
            TangemSdkError::DecodingFailedTypeMismatch(format!(
                "{tag:?} cannot be read as {value_type} from {} bytes",
                tlv.value.len()
            ))
        })
    }
}
