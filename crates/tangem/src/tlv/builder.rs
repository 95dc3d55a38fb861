use bytes::Bytes;
use tracing::trace;

use super::{Tlv, TlvEncode, TlvTag};
use crate::error::{Result, TangemSdkError};

/// Accumulates TLV records for a command payload
#[derive(Debug, Default, Clone)]
pub struct TlvBuilder {
    tlvs: Vec<Tlv>,
}

impl TlvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `value` under `tag`.
    ///
    /// Fails with `EncodingFailedTypeMismatch` when the Rust type does not fit
    /// the tag's value type, and `EncodingFailed` when the value is not representable.
    pub fn append<T: TlvEncode + ?Sized>(&mut self, tag: TlvTag, value: &T) -> Result<&mut Self> {
        let value_type = tag.value_type();
        if !T::accepts(value_type) {
            return Err(TangemSdkError::EncodingFailedTypeMismatch(format!(
                "{tag:?} expects {value_type}"
            )));
        }
        let bytes = value
            .encode(value_type)
            .ok_or_else(|| TangemSdkError::EncodingFailed(format!("{tag:?}")))?;
        self.tlvs.push(Tlv::new(tag, bytes));
        Ok(self)
    }

    /// Encode `value` if present; absent optional fields are omitted, not zero-filled
    pub fn append_optional<T: TlvEncode + ?Sized>(
        &mut self,
        tag: TlvTag,
        value: Option<&T>,
    ) -> Result<&mut Self> {
        match value {
            Some(value) => self.append(tag, value),
            None => Ok(self),
        }
    }

    /// Append raw bytes without a type check, for nested blocks and packed fields
    pub fn append_raw(&mut self, tag: TlvTag, value: impl Into<Bytes>) -> &mut Self {
        self.tlvs.push(Tlv::new(tag, value));
        self
    }

    pub fn tlvs(&self) -> &[Tlv] {
        &self.tlvs
    }

    pub fn serialize(&self) -> Bytes {
        for tlv in &self.tlvs {
            trace!("{}", tlv);
        }
        Tlv::serialize(&self.tlvs)
    }
}
