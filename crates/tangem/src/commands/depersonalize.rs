use serde::{Deserialize, Serialize};
use tracing::debug;

use super::personalize::with_development_key;
use super::{CardSessionRunnable, Command, PreflightReadMode, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::environment::SessionEnvironment;
use crate::error::Result;
use crate::session::CardSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepersonalizeResponse {
    pub success: bool,
}

/// Returns an SDK card to the blank state. Every wallet and setting is lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepersonalizeCommand;

impl DepersonalizeCommand {
    pub const fn new() -> Self {
        Self
    }
}

impl Command for DepersonalizeCommand {
    type Response = DepersonalizeResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::None
    }

    fn serialize(&self, _environment: &SessionEnvironment) -> Result<CommandApdu> {
        Ok(CommandApdu::new(Instruction::Depersonalize, Vec::new()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, _apdu: ResponseApdu) -> Result<Self::Response> {
        Ok(DepersonalizeResponse { success: true })
    }
}

impl CardSessionRunnable for DepersonalizeCommand {
    type Response = DepersonalizeResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::None
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        debug!("Depersonalizing card");
        let response = with_development_key(session, |session| transceive(&*self, session))?;
        session.environment.card = None;
        Ok(response)
    }
}
