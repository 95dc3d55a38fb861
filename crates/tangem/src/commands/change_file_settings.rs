use std::collections::BTreeMap;

use tracing::debug;

use super::delete_files::check_files_allowed;
use super::write_file::{FileDataMode, FileVisibility};
use super::{CardSessionRunnable, Command, SuccessResponse, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::Card;
use crate::environment::SessionEnvironment;
use crate::error::Result;
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

/// Makes one file public or private
#[derive(Debug, Clone)]
pub struct ChangeFileSettingsCommand {
    file_index: u8,
    visibility: FileVisibility,
}

impl ChangeFileSettingsCommand {
    pub const fn new(file_index: u8, visibility: FileVisibility) -> Self {
        Self { file_index, visibility }
    }
}

impl Command for ChangeFileSettingsCommand {
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
            .append(TlvTag::InteractionMode, &FileDataMode::ChangeFileSettings)?
            .append(TlvTag::FileIndex, &self.file_index)?
            .append_raw(
                TlvTag::FileSettings,
                self.visibility.serialize_value(&card.firmware_version),
            );
        Ok(CommandApdu::new(Instruction::WriteFileData, builder.serialize()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = response_decoder(&apdu)?;
        Ok(SuccessResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
        })
    }
}

impl CardSessionRunnable for ChangeFileSettingsCommand {
    type Response = SuccessResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let response = transceive(self, session)?;
        debug!(index = self.file_index, visibility = ?self.visibility, "File settings changed");
        Ok(response)
    }
}

/// Applies a visibility per file index, lowest index first
#[derive(Debug, Clone, Default)]
pub struct ChangeFileSettingsTask {
    changes: BTreeMap<u8, FileVisibility>,
}

impl ChangeFileSettingsTask {
    pub const fn new(changes: BTreeMap<u8, FileVisibility>) -> Self {
        Self { changes }
    }
}

impl CardSessionRunnable for ChangeFileSettingsTask {
    type Response = SuccessResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        for (&index, &visibility) in &self.changes {
            ChangeFileSettingsCommand::new(index, visibility).run(session)?;
        }
        Ok(SuccessResponse {
            card_id: known_card(&session.environment)?.card_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::fixtures::card;
    use crate::card::{FirmwareType, FirmwareVersion};
    use crate::tlv::Tlv;

    fn settings_value(env: &SessionEnvironment, visibility: FileVisibility) -> Vec<u8> {
        let apdu = ChangeFileSettingsCommand::new(1, visibility).serialize(env).unwrap();
        assert_eq!(apdu.ins, Instruction::WriteFileData);
        let tlvs = Tlv::deserialize(&apdu.data).unwrap();
        assert_eq!(tlvs[3].tag, TlvTag::InteractionMode);
        assert_eq!(&tlvs[3].value[..], &[0x06]);
        let last = tlvs.last().unwrap();
        assert_eq!(last.tag, TlvTag::FileSettings);
        last.value.to_vec()
    }

    #[test]
    fn test_settings_follow_firmware() {
        let mut env = SessionEnvironment::default();
        env.card = Some(card(vec![]));
        assert_eq!(settings_value(&env, FileVisibility::Public), vec![0x01]);
        assert_eq!(settings_value(&env, FileVisibility::Private), vec![0x00]);

        let mut legacy = card(vec![]);
        legacy.firmware_version = FirmwareVersion::new(3, 34, 0, FirmwareType::Release);
        env.card = Some(legacy);
        assert_eq!(settings_value(&env, FileVisibility::Public), vec![0x00, 0x01]);
    }
}
