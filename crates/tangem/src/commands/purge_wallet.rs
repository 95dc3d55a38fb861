use tracing::debug;

use super::{CardSessionRunnable, Command, SuccessResponse, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::Card;
use crate::environment::SessionEnvironment;
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

/// Deletes a wallet. The slot can be reused unless the card forbids it.
#[derive(Debug, Clone)]
pub struct PurgeWalletCommand {
    wallet_public_key: Vec<u8>,
}

impl PurgeWalletCommand {
    pub const fn new(wallet_public_key: Vec<u8>) -> Self {
        Self { wallet_public_key }
    }
}

impl Command for PurgeWalletCommand {
    type Response = SuccessResponse;

    fn requires_passcode(&self) -> bool {
        true
    }

    fn perform_pre_check(&self, card: &Card) -> Result<()> {
        let wallet = card
            .wallet(&self.wallet_public_key)
            .ok_or(TangemSdkError::WalletNotFound)?;
        if wallet.settings.is_permanent {
            return Err(TangemSdkError::PurgeWalletProhibited);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;
        let index = card
            .wallet(&self.wallet_public_key)
            .map(|wallet| wallet.index)
            .ok_or(TangemSdkError::WalletNotFound)?;

        let mut builder = TlvBuilder::new();
        builder
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append_optional(TlvTag::Pin2, environment.passcode_value())?
            .append(TlvTag::CardId, &card.card_id)?
            .append(TlvTag::WalletIndex, &index)?;
        Ok(CommandApdu::new(Instruction::PurgeWallet, builder.serialize()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = response_decoder(&apdu)?;
        Ok(SuccessResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
        })
    }
}

impl CardSessionRunnable for PurgeWalletCommand {
    type Response = SuccessResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let response = transceive(self, session)?;
        debug!("Wallet purged");
        let card = known_card(&session.environment)?.remove_wallet(&self.wallet_public_key);
        session.environment.card = Some(card);
        Ok(response)
    }
}
