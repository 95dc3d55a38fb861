use std::fmt;

use bytes::Bytes;

use super::encryption;
use crate::error::{Result, TangemSdkError};
use crate::tlv::Tlv;

/// Status word of a card response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusWord {
    ProcessCompleted,
    Pin1Changed,
    Pin2Changed,
    Pins12Changed,
    Pin3Changed,
    Pins13Changed,
    Pins23Changed,
    Pins123Changed,
    InvalidParams,
    ErrorProcessingCommand,
    InvalidState,
    InsNotSupported,
    NeedEncryption,
    NeedPause,
    FileNotFound,
    WalletNotFound,
    InvalidAccessCode,
    InvalidPasscode,
    Unknown(u16),
}

impl StatusWord {
    pub const fn from_code(code: u16) -> Self {
        match code {
            0x9000 => Self::ProcessCompleted,
            0x9001 => Self::Pin1Changed,
            0x9002 => Self::Pin2Changed,
            0x9003 => Self::Pins12Changed,
            0x9004 => Self::Pin3Changed,
            0x9005 => Self::Pins13Changed,
            0x9006 => Self::Pins23Changed,
            0x9007 => Self::Pins123Changed,
            0x6A86 => Self::InvalidParams,
            0x6286 => Self::ErrorProcessingCommand,
            0x6985 => Self::InvalidState,
            0x6D00 => Self::InsNotSupported,
            0x6982 => Self::NeedEncryption,
            0x9789 => Self::NeedPause,
            0x6A82 => Self::FileNotFound,
            0x6A88 => Self::WalletNotFound,
            0x6AF1 => Self::InvalidAccessCode,
            0x6AF2 => Self::InvalidPasscode,
            other => Self::Unknown(other),
        }
    }

    pub const fn code(self) -> u16 {
        match self {
            Self::ProcessCompleted => 0x9000,
            Self::Pin1Changed => 0x9001,
            Self::Pin2Changed => 0x9002,
            Self::Pins12Changed => 0x9003,
            Self::Pin3Changed => 0x9004,
            Self::Pins13Changed => 0x9005,
            Self::Pins23Changed => 0x9006,
            Self::Pins123Changed => 0x9007,
            Self::InvalidParams => 0x6A86,
            Self::ErrorProcessingCommand => 0x6286,
            Self::InvalidState => 0x6985,
            Self::InsNotSupported => 0x6D00,
            Self::NeedEncryption => 0x6982,
            Self::NeedPause => 0x9789,
            Self::FileNotFound => 0x6A82,
            Self::WalletNotFound => 0x6A88,
            Self::InvalidAccessCode => 0x6AF1,
            Self::InvalidPasscode => 0x6AF2,
            Self::Unknown(code) => code,
        }
    }

    /// Completed, including every pins-changed variant
    pub const fn is_success(self) -> bool {
        matches!(
            self,
            Self::ProcessCompleted
                | Self::Pin1Changed
                | Self::Pin2Changed
                | Self::Pins12Changed
                | Self::Pin3Changed
                | Self::Pins13Changed
                | Self::Pins23Changed
                | Self::Pins123Changed
        )
    }

    /// Error for a non-success status word; `None` for success and NeedPause
    pub fn to_error(self) -> Option<TangemSdkError> {
        match self {
            Self::InvalidParams => Some(TangemSdkError::InvalidParams),
            Self::ErrorProcessingCommand => Some(TangemSdkError::ErrorProcessingCommand),
            Self::InvalidState => Some(TangemSdkError::InvalidState),
            Self::InsNotSupported => Some(TangemSdkError::InsNotSupported),
            Self::NeedEncryption => Some(TangemSdkError::NeedEncryption),
            Self::FileNotFound => Some(TangemSdkError::FileNotFound),
            Self::WalletNotFound => Some(TangemSdkError::WalletNotFound),
            Self::InvalidAccessCode => Some(TangemSdkError::AccessCodeRequired),
            Self::InvalidPasscode => Some(TangemSdkError::PasscodeRequired),
            Self::Unknown(code) => Some(TangemSdkError::UnknownStatus(code)),
            _ => None,
        }
    }
}

/// A response frame: payload followed by a big-endian status word
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    data: Bytes,
    sw: u16,
}

impl ResponseApdu {
    /// Split raw bytes into payload and status word
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 {
            return Err(TangemSdkError::DeserializeApduFailed);
        }
        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: Bytes::copy_from_slice(data),
            sw: u16::from_be_bytes([sw[0], sw[1]]),
        })
    }

    pub fn new(data: impl Into<Bytes>, sw: u16) -> Self {
        Self {
            data: data.into(),
            sw,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub const fn sw(&self) -> u16 {
        self.sw
    }

    pub const fn status_word(&self) -> StatusWord {
        StatusWord::from_code(self.sw)
    }

    /// Parsed TLV payload; `None` when the payload is malformed
    pub fn tlv_data(&self) -> Option<Vec<Tlv>> {
        Tlv::deserialize(&self.data)
    }

    /// Decrypt the payload with the session key, if there is one
    pub fn decrypt(self, key: Option<&[u8]>) -> Result<Self> {
        match key {
            Some(key) => Ok(Self {
                data: encryption::decrypt_payload(&self.data, key)?.into(),
                sw: self.sw,
            }),
            None => Ok(self),
        }
    }
}

impl fmt::Debug for ResponseApdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            ">>>> [{} bytes]: {:04X} ({:?})",
            self.data.len() + 2,
            self.sw,
            self.status_word()
        )
    }
}
