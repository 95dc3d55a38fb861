use tracing::debug;

use super::write_file::FileDataMode;
use super::{CardSessionRunnable, Command, SuccessResponse, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::{Card, FirmwareVersion};
use crate::environment::SessionEnvironment;
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

/// Files on firmware that has them and a card that allows them
pub(crate) fn check_files_allowed(card: &Card) -> Result<()> {
    if card.firmware_version < FirmwareVersion::FILES_AVAILABLE {
        return Err(TangemSdkError::NotSupportedFirmwareVersion);
    }
    if !card.settings.is_files_allowed {
        return Err(TangemSdkError::FilesDisabled);
    }
    Ok(())
}

/// Deletes one file. Files after it shift down by one index.
#[derive(Debug, Clone)]
pub struct DeleteFileCommand {
    file_index: u8,
}

impl DeleteFileCommand {
    pub const fn new(file_index: u8) -> Self {
        Self { file_index }
    }
}

impl Command for DeleteFileCommand {
    type Response = SuccessResponse;

    fn requires_passcode(&self) -> bool {
        true
    }

    fn perform_pre_check(&self, card: &Card) -> Result<()> {
        check_files_allowed(card)
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;
        let mut builder = TlvBuilder::new();
        builder
            .append(TlvTag::CardId, &card.card_id)?
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append_optional(TlvTag::Pin2, environment.passcode_value())?
            .append(TlvTag::InteractionMode, &FileDataMode::DeleteFile)?
            .append(TlvTag::FileIndex, &self.file_index)?;
        Ok(CommandApdu::new(Instruction::WriteFileData, builder.serialize()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = response_decoder(&apdu)?;
        Ok(SuccessResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
        })
    }
}

impl CardSessionRunnable for DeleteFileCommand {
    type Response = SuccessResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let response = transceive(self, session)?;
        debug!(index = self.file_index, "File deleted");
        Ok(response)
    }
}

/// Deletes the listed files, or every file when no index is given
#[derive(Debug, Clone, Default)]
pub struct DeleteFilesTask {
    indices: Option<Vec<u8>>,
}

impl DeleteFilesTask {
    pub const fn new(indices: Option<Vec<u8>>) -> Self {
        Self { indices }
    }

    /// The card answers `ErrorProcessingCommand` once index 0 is empty
    fn delete_all(session: &mut CardSession) -> Result<SuccessResponse> {
        let mut deleted = 0usize;
        loop {
            match DeleteFileCommand::new(0).run(session) {
                Ok(_) => deleted += 1,
                Err(TangemSdkError::ErrorProcessingCommand) => break,
                Err(error) => return Err(error),
            }
        }
        debug!(deleted, "All files deleted");
        Ok(SuccessResponse {
            card_id: known_card(&session.environment)?.card_id.clone(),
        })
    }
}

impl CardSessionRunnable for DeleteFilesTask {
    type Response = SuccessResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let Some(indices) = &self.indices else {
            return Self::delete_all(session);
        };

        // Highest first so the remaining indices stay valid
        let mut indices = indices.clone();
        indices.sort_unstable();
        indices.dedup();
        for &index in indices.iter().rev() {
            DeleteFileCommand::new(index).run(session)?;
        }
        Ok(SuccessResponse {
            card_id: known_card(&session.environment)?.card_id.clone(),
        })
    }
}
