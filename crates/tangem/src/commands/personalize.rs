use tracing::debug;

use super::{CardSessionRunnable, Command, PreflightReadMode, PreflightReadTask, transceive};
use crate::apdu::{CommandApdu, EncryptionMode, Instruction, ResponseApdu};
use crate::card::{Card, CardDeserializer};
use crate::environment::{SessionEnvironment, UserCodeType};
use crate::error::{Result, TangemSdkError};
use crate::personalization::{
    Acquirer, CardConfig, Issuer, Manufacturer, development_key, serialize_personalization,
};
use crate::session::CardSession;

/// Run `f` with the development key in place of the session key
pub(super) fn with_development_key<T>(
    session: &mut CardSession,
    f: impl FnOnce(&mut CardSession) -> Result<T>,
) -> Result<T> {
    let mode = session.environment.encryption_mode;
    let key = session.environment.encryption_key.take();
    session.environment.encryption_mode = EncryptionMode::None;
    session.environment.encryption_key = Some(development_key().to_vec());

    let result = f(session);

    session.environment.encryption_mode = mode;
    session.environment.encryption_key = key;
    result
}

/// Writes the initial settings and keys to a blank SDK card.
///
/// Only cards that are not personalized accept it, so the command does its
/// own read and fails with [`TangemSdkError::AlreadyPersonalized`] otherwise.
#[derive(Debug, Clone)]
pub struct PersonalizeCommand {
    config: CardConfig,
    issuer: Issuer,
    manufacturer: Manufacturer,
    acquirer: Option<Acquirer>,
}

impl PersonalizeCommand {
    pub const fn new(config: CardConfig, issuer: Issuer, manufacturer: Manufacturer) -> Self {
        Self {
            config,
            issuer,
            manufacturer,
            acquirer: None,
        }
    }

    #[must_use]
    pub fn with_acquirer(mut self, acquirer: Acquirer) -> Self {
        self.acquirer = Some(acquirer);
        self
    }
}

impl Command for PersonalizeCommand {
    type Response = Card;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::None
    }

    fn serialize(&self, _environment: &SessionEnvironment) -> Result<CommandApdu> {
        let data = serialize_personalization(
            &self.config,
            &self.issuer,
            &self.manufacturer,
            self.acquirer.as_ref(),
        )?;
        Ok(CommandApdu::new(Instruction::Personalize, data))
    }

    fn deserialize(&self, environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = CardDeserializer::decoder(&apdu)?;
        let card_data = CardDeserializer::card_data_decoder(&decoder);
        CardDeserializer::deserialize(
            environment.is_user_code_set(UserCodeType::AccessCode),
            &decoder,
            card_data.as_ref(),
        )
    }
}

impl CardSessionRunnable for PersonalizeCommand {
    type Response = Card;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::None
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        match PreflightReadTask::new(PreflightReadMode::ReadCardOnly, None).run(session) {
            Ok(_) => return Err(TangemSdkError::AlreadyPersonalized),
            Err(TangemSdkError::NotPersonalized) => {}
            Err(error) => return Err(error),
        }

        debug!("Personalizing card");
        let card = with_development_key(session, |session| transceive(&*self, session))?;
        session.environment.card = Some(card.clone());
        Ok(card)
    }
}
