use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CardSessionRunnable, Command, PreflightReadMode, ReadMode, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::{Card, CardWallet, FirmwareVersion, WalletDeserializer};
use crate::environment::SessionEnvironment;
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadWalletsListResponse {
    pub card_id: String,
    pub wallets: Vec<CardWallet>,
}

/// One page of the wallet list and the number of slots it covered
#[derive(Debug, Clone)]
pub struct WalletsPage {
    pub card_id: String,
    pub wallets: Vec<CardWallet>,
    pub slots: usize,
}

/// Reads every wallet of a multi-wallet card, page by page
#[derive(Debug, Clone, Default)]
pub struct ReadWalletsListCommand {
    received_slots: usize,
}

impl ReadWalletsListCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command for ReadWalletsListCommand {
    type Response = WalletsPage;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::ReadCardOnly
    }

    fn perform_pre_check(&self, card: &Card) -> Result<()> {
        if card.firmware_version < FirmwareVersion::MULTI_WALLET_AVAILABLE {
            return Err(TangemSdkError::NotSupportedFirmwareVersion);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;
        let mut builder = TlvBuilder::new();
        builder
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append(TlvTag::CardId, &card.card_id)?
            .append(TlvTag::InteractionMode, &ReadMode::WalletsList)?
            .append_optional(TlvTag::TerminalPublicKey, environment.terminal_public_key())?;
        if self.received_slots > 0 {
            let index = u8::try_from(self.received_slots)
                .map_err(|_| TangemSdkError::EncodingFailed(format!("{:?}", TlvTag::WalletIndex)))?;
            builder.append(TlvTag::WalletIndex, &index)?;
        }
        Ok(CommandApdu::new(Instruction::Read, builder.serialize()))
    }

    fn deserialize(&self, environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let card = known_card(environment)?;
        let decoder = response_decoder(&apdu)?;
        let (wallets, slots) =
            WalletDeserializer::new(card.settings.is_permanent_wallet).deserialize_wallets(&decoder)?;
        Ok(WalletsPage {
            card_id: decoder.decode(TlvTag::CardId)?,
            wallets,
            slots,
        })
    }
}

impl CardSessionRunnable for ReadWalletsListCommand {
    type Response = ReadWalletsListResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::ReadCardOnly
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        self.received_slots = 0;
        let mut loaded = Vec::new();
        let max_wallets = usize::from(known_card(&session.environment)?.settings.max_wallets_count);

        let card_id = loop {
            let page = transceive(self, session)?;
            if self.received_slots == 0 && page.slots == 0 {
                return Err(TangemSdkError::CardWithMaxZeroWallets);
            }
            self.received_slots += page.slots;
            loaded.extend(page.wallets);
            debug!(received = self.received_slots, max_wallets, "Wallets page read");

            if page.slots == 0 || self.received_slots >= max_wallets {
                break page.card_id;
            }
        };

        loaded.sort_by_key(|w| w.index);
        let card = known_card(&session.environment)?.set_wallets(loaded.clone());
        session.environment.card = Some(card);
        Ok(ReadWalletsListResponse {
            card_id,
            wallets: loaded,
        })
    }
}
