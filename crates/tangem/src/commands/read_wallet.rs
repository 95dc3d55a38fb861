use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CardSessionRunnable, Command, PreflightReadMode, ReadMode, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::{CardWallet, WalletDeserializer};
use crate::environment::SessionEnvironment;
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadWalletResponse {
    pub card_id: String,
    pub wallet: CardWallet,
}

/// Reads one wallet by its public key
#[derive(Debug, Clone)]
pub struct ReadWalletCommand {
    wallet_public_key: Vec<u8>,
}

impl ReadWalletCommand {
    pub const fn new(wallet_public_key: Vec<u8>) -> Self {
        Self { wallet_public_key }
    }
}

impl Command for ReadWalletCommand {
    type Response = ReadWalletResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::ReadCardOnly
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;
        let mut builder = TlvBuilder::new();
        builder
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append(TlvTag::CardId, &card.card_id)?
            .append(TlvTag::InteractionMode, &ReadMode::Wallet)?
            .append(TlvTag::WalletPublicKey, &self.wallet_public_key)?;
        Ok(CommandApdu::new(Instruction::Read, builder.serialize()))
    }

    fn deserialize(&self, environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let card = known_card(environment)?;
        let decoder = response_decoder(&apdu)?;
        let wallet = WalletDeserializer::new(card.settings.is_permanent_wallet)
            .deserialize_wallet(&decoder)
            .ok()
            .flatten()
            .ok_or(TangemSdkError::WalletNotFound)?;
        Ok(ReadWalletResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
            wallet,
        })
    }
}

impl CardSessionRunnable for ReadWalletCommand {
    type Response = ReadWalletResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::ReadCardOnly
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let response = transceive(self, session)?;
        debug!(index = response.wallet.index, "Wallet read");
        let card = known_card(&session.environment)?.set_wallets(vec![response.wallet.clone()]);
        session.environment.card = Some(card);
        Ok(response)
    }
}
