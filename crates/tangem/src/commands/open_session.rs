use bytes::Bytes;

use super::{Command, PreflightReadMode, response_decoder};
use crate::apdu::{CommandApdu, EncryptionMode, Instruction, ResponseApdu};
use crate::environment::SessionEnvironment;
use crate::error::Result;
use crate::tlv::{TlvBuilder, TlvTag};

/// Card half of the session key agreement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSessionResponse {
    pub session_key_b: Bytes,
    pub uid: Bytes,
}

/// Starts an encrypted session.
///
/// The frame is always sent in clear with the requested mode in P1.
#[derive(Debug, Clone)]
pub struct OpenSessionCommand {
    mode: EncryptionMode,
    session_key_a: Vec<u8>,
}

impl OpenSessionCommand {
    pub const fn new(mode: EncryptionMode, session_key_a: Vec<u8>) -> Self {
        Self {
            mode,
            session_key_a,
        }
    }
}

impl Command for OpenSessionCommand {
    type Response = OpenSessionResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::None
    }

    fn serialize(&self, _environment: &SessionEnvironment) -> Result<CommandApdu> {
        let mut builder = TlvBuilder::new();
        builder.append(TlvTag::SessionKeyA, &self.session_key_a)?;
        Ok(CommandApdu::new(Instruction::OpenSession, builder.serialize()).with_p1(self.mode.code()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = response_decoder(&apdu)?;
        Ok(OpenSessionResponse {
            session_key_b: decoder.decode(TlvTag::SessionKeyB)?,
            uid: decoder.decode(TlvTag::Uid)?,
        })
    }
}
