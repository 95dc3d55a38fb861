use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{CardSessionRunnable, Command, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::{Card, FirmwareVersion};
use crate::environment::SessionEnvironment;
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvDecode, TlvEncode, TlvTag, TlvValueType};

/// Bytes sent per `WriteFile` round
pub const SINGLE_WRITE_SIZE: usize = 900;
/// Largest file a card accepts
pub const MAX_FILE_SIZE: usize = 48 * 1024;

const FILE_IS_PUBLIC: u8 = 0x01;
const FILE_IS_PERMANENT: u8 = 0x10;

/// Interaction mode of a `WriteFileData` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileDataMode {
    InitiateWritingFile = 0x01,
    WriteFile = 0x02,
    ConfirmWritingFile = 0x03,
    DeleteFile = 0x05,
    ChangeFileSettings = 0x06,
}

impl TlvEncode for FileDataMode {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::InteractionMode
    }

    fn encode(&self, _: TlvValueType) -> Option<Vec<u8>> {
        Some(vec![*self as u8])
    }
}

/// Who may read a file. Private files need the security delay or a user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileVisibility {
    Public,
    #[default]
    Private,
}

impl FileVisibility {
    const fn permissions(self) -> u8 {
        match self {
            Self::Public => FILE_IS_PUBLIC,
            Self::Private => 0x00,
        }
    }

    /// Settings bytes for a file written on `firmware`; COS 3 expects two bytes
    pub fn serialize_value(self, firmware: &FirmwareVersion) -> Vec<u8> {
        if *firmware < FirmwareVersion::MULTI_WALLET_AVAILABLE {
            vec![0x00, self.permissions()]
        } else {
            vec![self.permissions()]
        }
    }
}

/// Settings of a stored file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSettings {
    pub is_permanent: bool,
    pub visibility: FileVisibility,
}

impl TlvDecode for FileSettings {
    fn accepts(value_type: TlvValueType) -> bool {
        value_type == TlvValueType::FileSettings
    }

    fn decode(_: TlvValueType, data: &[u8]) -> Option<Self> {
        let significant = *data.last()?;
        let visibility = if significant & FILE_IS_PUBLIC != 0 {
            FileVisibility::Public
        } else {
            FileVisibility::Private
        };
        // Two-byte settings come from COS 3, which has no permanent files
        let is_permanent = data.len() != 2 && significant & FILE_IS_PERMANENT != 0;
        Some(Self {
            is_permanent,
            visibility,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileResponse {
    pub card_id: String,
    pub file_index: Option<u8>,
}

/// Writes a user file protected by the passcode.
///
/// The file goes over in three steps: an initiating round announcing the
/// size, one round per 900-byte part and a confirming round carrying the
/// SHA-256 of the whole file.
#[derive(Debug, Clone)]
pub struct WriteFileCommand {
    data: Vec<u8>,
    visibility: Option<FileVisibility>,
    wallet_public_key: Option<Vec<u8>>,
    wallet_index: Option<u8>,
    mode: FileDataMode,
    offset: usize,
    file_index: u8,
}

impl WriteFileCommand {
    pub const fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            visibility: None,
            wallet_public_key: None,
            wallet_index: None,
            mode: FileDataMode::InitiateWritingFile,
            offset: 0,
            file_index: 0,
        }
    }

    #[must_use]
    pub const fn with_visibility(mut self, visibility: FileVisibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Link the file to a wallet
    #[must_use]
    pub fn with_wallet(mut self, wallet_public_key: Vec<u8>) -> Self {
        self.wallet_public_key = Some(wallet_public_key);
        self
    }

    pub const fn mode(&self) -> FileDataMode {
        self.mode
    }

    fn current_part(&self) -> &[u8] {
        let start = self.offset.min(self.data.len());
        let end = (self.offset + SINGLE_WRITE_SIZE).min(self.data.len());
        &self.data[start..end]
    }

    /// Move to the next step after a successful round
    fn advance(&mut self, response: &WriteFileResponse) {
        match self.mode {
            FileDataMode::InitiateWritingFile => {
                self.file_index = response.file_index.unwrap_or(0);
                self.mode = FileDataMode::WriteFile;
            }
            FileDataMode::WriteFile => {
                self.offset += SINGLE_WRITE_SIZE;
                if self.offset >= self.data.len() {
                    self.mode = FileDataMode::ConfirmWritingFile;
                }
            }
            _ => {}
        }
    }
}

impl Command for WriteFileCommand {
    type Response = WriteFileResponse;

    fn requires_passcode(&self) -> bool {
        true
    }

    fn perform_pre_check(&self, card: &Card) -> Result<()> {
        let firmware = &card.firmware_version;
        if *firmware < FirmwareVersion::FILES_AVAILABLE {
            return Err(TangemSdkError::NotSupportedFirmwareVersion);
        }
        if !card.settings.is_files_allowed {
            return Err(TangemSdkError::FilesDisabled);
        }
        if *firmware < FirmwareVersion::FILES_BY_USER_CODES_AVAILABLE {
            return Err(TangemSdkError::NotSupportedFirmwareVersion);
        }
        let has_settings = self.visibility.is_some() || self.wallet_public_key.is_some();
        if has_settings && *firmware < FirmwareVersion::MULTI_WALLET_AVAILABLE {
            return Err(TangemSdkError::FileSettingsUnsupported);
        }
        if self.data.len() > MAX_FILE_SIZE {
            return Err(TangemSdkError::DataSizeTooLarge);
        }
        Ok(())
    }

    fn map_error(&self, card: Option<&Card>, error: TangemSdkError) -> TangemSdkError {
        match (card, error) {
            (Some(card), TangemSdkError::InvalidState) if card.settings.is_issuer_data_protected_against_replay() => {
                TangemSdkError::OverwritingDataIsProhibited
            }
            (_, error) => error,
        }
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;

        let mut builder = TlvBuilder::new();
        builder
            .append(TlvTag::CardId, &card.card_id)?
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append(TlvTag::InteractionMode, &self.mode)?;

        match self.mode {
            FileDataMode::InitiateWritingFile => {
                let size = u16::try_from(self.data.len()).map_err(|_| TangemSdkError::DataSizeTooLarge)?;
                builder
                    .append(TlvTag::Size, &size)?
                    .append_optional(TlvTag::Pin2, environment.passcode_value())?
                    .append_optional(TlvTag::WalletIndex, self.wallet_index.as_ref())?;
                if let Some(visibility) = self.visibility {
                    builder.append_raw(
                        TlvTag::FileSettings,
                        visibility.serialize_value(&card.firmware_version),
                    );
                }
            }
            FileDataMode::WriteFile => {
                let offset = u16::try_from(self.offset).map_err(|_| TangemSdkError::DataSizeTooLarge)?;
                builder
                    .append(TlvTag::IssuerData, self.current_part())?
                    .append(TlvTag::Offset, &offset)?
                    .append(TlvTag::FileIndex, &self.file_index)?;
            }
            FileDataMode::ConfirmWritingFile => {
                let hash = Sha256::digest(&self.data);
                builder
                    .append(TlvTag::FileIndex, &self.file_index)?
                    .append(TlvTag::CodeHash, hash.as_slice())?
                    .append_optional(TlvTag::Pin2, environment.passcode_value())?;
            }
            FileDataMode::DeleteFile | FileDataMode::ChangeFileSettings => {
                return Err(TangemSdkError::SerializeCommandError);
            }
        }

        Ok(CommandApdu::new(Instruction::WriteFileData, builder.serialize()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = response_decoder(&apdu)?;
        Ok(WriteFileResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
            file_index: decoder.decode_optional(TlvTag::FileIndex)?,
        })
    }
}

impl CardSessionRunnable for WriteFileCommand {
    type Response = WriteFileResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let card = known_card(&session.environment)?;
        self.wallet_index = match &self.wallet_public_key {
            Some(public_key) => Some(
                card.wallet(public_key)
                    .map(|wallet| wallet.index)
                    .ok_or(TangemSdkError::WalletNotFound)?,
            ),
            None => None,
        };
        self.mode = FileDataMode::InitiateWritingFile;
        self.offset = 0;

        loop {
            if self.mode == FileDataMode::WriteFile {
                session
                    .view_delegate()
                    .on_delay(self.data.len(), self.offset, SINGLE_WRITE_SIZE);
            }
            debug!(mode = ?self.mode, offset = self.offset, "Writing file");
            let response = transceive(&*self, session)?;
            if self.mode == FileDataMode::ConfirmWritingFile {
                return Ok(WriteFileResponse {
                    card_id: response.card_id,
                    file_index: Some(self.file_index),
                });
            }
            self.advance(&response);
        }
    }
}

/// A file to write through [`WriteFilesTask`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileToWrite {
    #[serde(with = "crate::hex_serde")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub file_visibility: Option<FileVisibility>,
    #[serde(default, with = "crate::hex_serde::option")]
    pub wallet_public_key: Option<Vec<u8>>,
}

impl From<FileToWrite> for WriteFileCommand {
    fn from(file: FileToWrite) -> Self {
        let mut command = Self::new(file.data);
        command.visibility = file.file_visibility;
        command.wallet_public_key = file.wallet_public_key;
        command
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFilesResponse {
    pub card_id: String,
    pub files_indices: Vec<u8>,
}

/// Writes several files one after another
#[derive(Debug, Clone)]
pub struct WriteFilesTask {
    files: Vec<FileToWrite>,
}

impl WriteFilesTask {
    pub const fn new(files: Vec<FileToWrite>) -> Self {
        Self { files }
    }
}

impl CardSessionRunnable for WriteFilesTask {
    type Response = WriteFilesResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let mut response = WriteFilesResponse {
            card_id: String::new(),
            files_indices: Vec::with_capacity(self.files.len()),
        };
        for file in &self.files {
            let written = WriteFileCommand::from(file.clone()).run(session)?;
            response.card_id = written.card_id;
            response.files_indices.extend(written.file_index);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::FirmwareType;
    use crate::card::fixtures::{card, wallet};
    use crate::card::SettingsMask;
    use crate::tlv::Tlv;

    fn environment() -> SessionEnvironment {
        let mut env = SessionEnvironment::default();
        let mut known = card(vec![wallet(0, 0x00), wallet(2, 0x02)]);
        known.settings.is_files_allowed = true;
        env.card = Some(known);
        env
    }

    fn tags(apdu: &CommandApdu) -> Vec<TlvTag> {
        Tlv::deserialize(&apdu.data)
            .unwrap()
            .into_iter()
            .map(|tlv| tlv.tag)
            .collect()
    }

    #[test]
    fn test_pre_checks() {
        let mut known = card(vec![]);
        known.settings.is_files_allowed = false;
        let command = WriteFileCommand::new(vec![0x01; 10]);
        assert_eq!(command.perform_pre_check(&known), Err(TangemSdkError::FilesDisabled));

        known.settings.is_files_allowed = true;
        assert_eq!(command.perform_pre_check(&known), Ok(()));

        known.firmware_version = FirmwareVersion::new(3, 30, 0, FirmwareType::Release);
        assert_eq!(
            command.perform_pre_check(&known),
            Err(TangemSdkError::NotSupportedFirmwareVersion)
        );

        known.firmware_version = FirmwareVersion::new(3, 34, 0, FirmwareType::Release);
        let public = command.clone().with_visibility(FileVisibility::Public);
        assert_eq!(
            public.perform_pre_check(&known),
            Err(TangemSdkError::FileSettingsUnsupported)
        );

        let too_large = WriteFileCommand::new(vec![0x00; MAX_FILE_SIZE + 1]);
        assert_eq!(too_large.perform_pre_check(&known), Err(TangemSdkError::DataSizeTooLarge));
    }

    #[test]
    fn test_rounds_walk_the_data() {
        let env = environment();
        let data: Vec<u8> = (0..2000).map(|i| i as u8).collect();
        let mut command = WriteFileCommand::new(data.clone()).with_visibility(FileVisibility::Public);
        command.wallet_index = Some(2);

        let init = command.serialize(&env).unwrap();
        assert_eq!(init.ins, Instruction::WriteFileData);
        assert_eq!(
            tags(&init),
            vec![
                TlvTag::CardId,
                TlvTag::Pin,
                TlvTag::InteractionMode,
                TlvTag::Size,
                TlvTag::Pin2,
                TlvTag::WalletIndex,
                TlvTag::FileSettings
            ]
        );
        command.advance(&WriteFileResponse {
            card_id: "AF99001800554008".into(),
            file_index: Some(4),
        });

        let mut parts = Vec::new();
        while command.mode() == FileDataMode::WriteFile {
            let apdu = command.serialize(&env).unwrap();
            assert_eq!(
                tags(&apdu),
                vec![
                    TlvTag::CardId,
                    TlvTag::Pin,
                    TlvTag::InteractionMode,
                    TlvTag::IssuerData,
                    TlvTag::Offset,
                    TlvTag::FileIndex
                ]
            );
            let tlvs = Tlv::deserialize(&apdu.data).unwrap();
            let part = tlvs.iter().find(|tlv| tlv.tag == TlvTag::IssuerData).unwrap();
            let index = tlvs.iter().find(|tlv| tlv.tag == TlvTag::FileIndex).unwrap();
            assert_eq!(&index.value[..], &[4]);
            parts.push(part.value.to_vec());
            command.advance(&WriteFileResponse {
                card_id: "AF99001800554008".into(),
                file_index: None,
            });
        }
        assert_eq!(parts.iter().map(Vec::len).collect::<Vec<_>>(), vec![900, 900, 200]);
        assert_eq!(parts.concat(), data);

        let confirm = command.serialize(&env).unwrap();
        assert_eq!(
            tags(&confirm),
            vec![
                TlvTag::CardId,
                TlvTag::Pin,
                TlvTag::InteractionMode,
                TlvTag::FileIndex,
                TlvTag::CodeHash,
                TlvTag::Pin2
            ]
        );
        let tlvs = Tlv::deserialize(&confirm.data).unwrap();
        let hash = tlvs.iter().find(|tlv| tlv.tag == TlvTag::CodeHash).unwrap();
        assert_eq!(&hash.value[..], Sha256::digest(&data).as_slice());
    }

    #[test]
    fn test_overwrite_error_mapping() {
        let command = WriteFileCommand::new(vec![0x01]);
        let mut known = card(vec![]);
        assert_eq!(
            command.map_error(Some(&known), TangemSdkError::InvalidState),
            TangemSdkError::InvalidState
        );
        known.settings.mask = known.settings.mask | SettingsMask::PROTECT_ISSUER_DATA_AGAINST_REPLAY;
        assert_eq!(
            command.map_error(Some(&known), TangemSdkError::InvalidState),
            TangemSdkError::OverwritingDataIsProhibited
        );
    }

    #[test]
    fn test_file_settings() {
        assert_eq!(
            FileVisibility::Public.serialize_value(&FirmwareVersion::new(3, 34, 0, FirmwareType::Release)),
            vec![0x00, 0x01]
        );
        assert_eq!(
            FileVisibility::Private.serialize_value(&FirmwareVersion::new(4, 52, 0, FirmwareType::Release)),
            vec![0x00]
        );
        assert_eq!(
            FileSettings::decode(TlvValueType::FileSettings, &[0x11]),
            Some(FileSettings {
                is_permanent: true,
                visibility: FileVisibility::Public
            })
        );
        assert_eq!(
            FileSettings::decode(TlvValueType::FileSettings, &[0x00, 0x11]),
            Some(FileSettings {
                is_permanent: false,
                visibility: FileVisibility::Public
            })
        );
    }
}
