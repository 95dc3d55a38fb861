use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use super::encryption::{self, EncryptionMode};
use super::Instruction;
use crate::error::Result;

/// Class byte of every Tangem command
pub const CLA: u8 = 0x00;

/// A command frame ready to be sent to the card
#[derive(Clone, PartialEq, Eq)]
pub struct CommandApdu {
    pub cla: u8,
    pub ins: Instruction,
    pub p1: u8,
    pub p2: u8,
    pub data: Bytes,
}

impl CommandApdu {
    pub fn new(ins: Instruction, data: impl Into<Bytes>) -> Self {
        Self {
            cla: CLA,
            ins,
            p1: 0,
            p2: 0,
            data: data.into(),
        }
    }

    pub const fn with_p1(mut self, p1: u8) -> Self {
        self.p1 = p1;
        self
    }

    /// `CLA INS P1 P2 [00 Lc_hi Lc_lo data]`, extended length form
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(7 + self.data.len());
        buf.put_u8(self.cla);
        buf.put_u8(self.ins.code());
        buf.put_u8(self.p1);
        buf.put_u8(self.p2);
        if !self.data.is_empty() {
            buf.put_u8(0x00);
            buf.put_u16(self.data.len() as u16);
            buf.extend_from_slice(&self.data);
        }
        buf.freeze()
    }

    /// Encrypt the payload for the session.
    ///
    /// Frames that already carry a mode in P1, or sessions without a key, pass
    /// through untouched.
    pub fn encrypt(&self, mode: EncryptionMode, key: Option<&[u8]>) -> Result<Self> {
        let Some(key) = key else {
            return Ok(self.clone());
        };
        if self.p1 != EncryptionMode::None.code() {
            return Ok(self.clone());
        }

        let encrypted = encryption::encrypt_payload(&self.data, key)?;
        Ok(Self {
            p1: mode.code(),
            data: encrypted.into(),
            ..self.clone()
        })
    }
}

impl fmt::Debug for CommandApdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<<<< [{} bytes]: {:02X} {} {:02X} {:02X}",
            self.data.len() + 4,
            self.cla,
            self.ins,
            self.p1,
            self.p2
        )
    }
}
