use tracing::debug;

use super::{
    CardSessionRunnable, PreflightReadMode, ReadCommand, ReadWalletCommand, ReadWalletsListCommand,
};
use crate::card::{Card, FirmwareVersion};
use crate::environment::UserCodeType;
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;

/// Reads the card at session start and checks it is the one expected
#[derive(Debug, Clone)]
pub struct PreflightReadTask {
    mode: PreflightReadMode,
    card_id: Option<String>,
}

impl PreflightReadTask {
    pub const fn new(mode: PreflightReadMode, card_id: Option<String>) -> Self {
        Self { mode, card_id }
    }

    fn verify(&self, card: &Card, session: &CardSession) -> Result<()> {
        let config = &session.environment.config;
        if !config.handle_errors {
            return Ok(());
        }
        if let Some(expected) = &self.card_id {
            if !expected.eq_ignore_ascii_case(&card.card_id) {
                return Err(TangemSdkError::WrongCardNumber(expected.clone()));
            }
        }
        if !config
            .allowed_card_types
            .contains(&card.firmware_version.firmware_type)
        {
            return Err(TangemSdkError::WrongCardType);
        }
        Ok(())
    }
}

impl CardSessionRunnable for PreflightReadTask {
    type Response = Card;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::None
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        debug!(mode = ?self.mode, "Preflight read");
        let card = ReadCommand::new().run(session)?.card;
        self.verify(&card, session)?;

        if !session.environment.is_user_code_set(UserCodeType::AccessCode) {
            session.apply_saved_access_code(&card.card_id);
        }

        if card.firmware_version < FirmwareVersion::MULTI_WALLET_AVAILABLE {
            return Ok(card);
        }
        match &self.mode {
            PreflightReadMode::FullCardRead => {
                ReadWalletsListCommand::new().run(session)?;
            }
            PreflightReadMode::ReadWallet(public_key) => {
                ReadWalletCommand::new(public_key.clone()).run(session)?;
            }
            PreflightReadMode::ReadCardOnly | PreflightReadMode::None => {}
        }
        session
            .environment
            .card
            .clone()
            .ok_or(TangemSdkError::CardError)
    }
}
