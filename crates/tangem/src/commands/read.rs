use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CardSessionRunnable, Command, PreflightReadMode, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::{Card, CardDeserializer, FirmwareVersion};
use crate::environment::{SessionEnvironment, UserCodeType};
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvEncode, TlvTag, TlvValueType};

/// What a `Read` request asks the card for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadMode {
    Card = 0x01,
    Wallet = 0x02,
    WalletsList = 0x03,
}

impl TlvEncode for ReadMode {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::InteractionMode
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(vec![*self as u8])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResponse {
    pub card: Card,
}

/// Reads the card data, and the single wallet of pre-4.0 firmware
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadCommand;

impl ReadCommand {
    pub const fn new() -> Self {
        Self
    }
}

impl Command for ReadCommand {
    type Response = ReadResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::None
    }

    /// A read refused for bad parameters means the access code was wrong
    fn map_error(&self, _card: Option<&Card>, error: TangemSdkError) -> TangemSdkError {
        match error {
            TangemSdkError::InvalidParams => TangemSdkError::AccessCodeRequired,
            other => other,
        }
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let mut builder = TlvBuilder::new();
        builder
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append(TlvTag::InteractionMode, &ReadMode::Card)?
            .append_optional(TlvTag::TerminalPublicKey, environment.terminal_public_key())?;
        Ok(CommandApdu::new(Instruction::Read, builder.serialize()))
    }

    fn deserialize(&self, environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = CardDeserializer::decoder(&apdu)?;
        let card_data = CardDeserializer::card_data_decoder(&decoder);
        let is_access_code_set_legacy = environment.is_user_code_set(UserCodeType::AccessCode);
        let card = CardDeserializer::deserialize(is_access_code_set_legacy, &decoder, card_data.as_ref())?;
        Ok(ReadResponse { card })
    }
}

impl CardSessionRunnable for ReadCommand {
    type Response = ReadResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::None
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let mut response = transceive(self, session)?;

        // Multi-wallet cards report wallets separately; keep the ones already read
        if response.card.firmware_version >= FirmwareVersion::MULTI_WALLET_AVAILABLE {
            if let Some(known) = &session.environment.card {
                if known.card_id == response.card.card_id {
                    response.card = response.card.set_wallets(known.wallets.clone());
                }
            }
        }
        debug!(card_id = %response.card.card_id, firmware = %response.card.firmware_version, "Card read");
        session.environment.card = Some(response.card.clone());
        Ok(response)
    }
}
