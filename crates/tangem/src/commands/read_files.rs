use serde::{Deserialize, Serialize};
use tracing::debug;

use super::write_file::{FileSettings, SINGLE_WRITE_SIZE};
use super::{CardSessionRunnable, Command, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::{Card, FirmwareVersion};
use crate::environment::SessionEnvironment;
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

/// One `ReadFileData` answer, or the whole file once [`ReadFileCommand`] has gathered it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileResponse {
    pub card_id: String,
    /// Full file size; only the first part carries it
    pub size: Option<u16>,
    pub offset: Option<u16>,
    #[serde(with = "crate::hex_serde")]
    pub file_data: Vec<u8>,
    pub file_index: u8,
    pub settings: Option<FileSettings>,
    pub owner_index: Option<u8>,
    #[serde(default, with = "crate::hex_serde::option")]
    pub owner_public_key: Option<Vec<u8>>,
    pub wallet_index: Option<u8>,
}

impl ReadFileResponse {
    fn is_read_complete(&self) -> bool {
        self.size
            .is_none_or(|size| self.file_data.len() >= usize::from(size))
    }

    /// Fold the next part in; fields the part carries win
    fn update(&mut self, part: Self) {
        self.card_id = part.card_id;
        self.file_index = part.file_index;
        self.size = part.size.or(self.size);
        self.offset = part.offset.or(self.offset);
        self.settings = part.settings.or(self.settings);
        self.owner_index = part.owner_index.or(self.owner_index);
        self.owner_public_key = part.owner_public_key.or(self.owner_public_key.take());
        self.wallet_index = part.wallet_index.or(self.wallet_index);
        self.file_data.extend(part.file_data);
    }
}

/// Reads one file, one part per round.
///
/// Private files are only returned with the passcode; without it the card
/// skips them.
#[derive(Debug, Clone)]
pub struct ReadFileCommand {
    file_index: u8,
    file_name: Option<String>,
    wallet_public_key: Option<Vec<u8>>,
    read_private_files: bool,
    wallet_index: Option<u8>,
    aggregated: ReadFileResponse,
}

impl ReadFileCommand {
    pub fn new(file_index: u8) -> Self {
        Self {
            file_index,
            file_name: None,
            wallet_public_key: None,
            read_private_files: false,
            wallet_index: None,
            aggregated: ReadFileResponse::default(),
        }
    }

    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Only files linked to this wallet
    #[must_use]
    pub fn with_wallet(mut self, wallet_public_key: Vec<u8>) -> Self {
        self.wallet_public_key = Some(wallet_public_key);
        self
    }

    #[must_use]
    pub const fn with_private_files(mut self, read_private_files: bool) -> Self {
        self.read_private_files = read_private_files;
        self
    }
}

impl Command for ReadFileCommand {
    type Response = ReadFileResponse;

    fn requires_passcode(&self) -> bool {
        self.read_private_files
    }

    fn perform_pre_check(&self, card: &Card) -> Result<()> {
        if card.firmware_version < FirmwareVersion::FILES_AVAILABLE {
            return Err(TangemSdkError::NotSupportedFirmwareVersion);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;
        let offset =
            u16::try_from(self.aggregated.file_data.len()).map_err(|_| TangemSdkError::DataSizeTooLarge)?;

        let mut builder = TlvBuilder::new();
        builder
            .append(TlvTag::CardId, &card.card_id)?
            .append(TlvTag::FileIndex, &self.file_index)?
            .append_optional(TlvTag::FileTypeName, self.file_name.as_ref())?
            .append_optional(TlvTag::WalletIndex, self.wallet_index.as_ref())?
            .append(TlvTag::Offset, &offset)?;

        if self.read_private_files {
            builder
                .append_optional(TlvTag::Pin, environment.access_code_value())?
                .append_optional(TlvTag::Pin2, environment.passcode_value())?;
        } else if card.firmware_version < FirmwareVersion::MULTI_WALLET_AVAILABLE {
            builder.append_optional(TlvTag::Pin, environment.access_code_value())?;
        }

        Ok(CommandApdu::new(Instruction::ReadFileData, builder.serialize()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = response_decoder(&apdu)?;
        Ok(ReadFileResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
            size: decoder.decode_optional(TlvTag::Size)?,
            offset: decoder.decode_optional(TlvTag::Offset)?,
            file_data: decoder.decode_optional(TlvTag::IssuerData)?.unwrap_or_default(),
            file_index: decoder.decode_optional(TlvTag::FileIndex)?.unwrap_or(0),
            settings: decoder.decode_optional(TlvTag::FileSettings)?,
            owner_index: decoder.decode_optional(TlvTag::FileOwnerIndex)?,
            owner_public_key: decoder.decode_optional(TlvTag::IssuerPublicKey)?,
            wallet_index: decoder.decode_optional(TlvTag::WalletIndex)?,
        })
    }
}

impl CardSessionRunnable for ReadFileCommand {
    type Response = ReadFileResponse;

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
        self.aggregated = ReadFileResponse::default();

        loop {
            if let Some(size) = self.aggregated.size {
                session
                    .view_delegate()
                    .on_delay(usize::from(size), self.aggregated.file_data.len(), SINGLE_WRITE_SIZE);
            }
            let part = transceive(&*self, session)?;
            let received = part.file_data.len();
            self.aggregated.update(part);
            debug!(
                index = self.file_index,
                read = self.aggregated.file_data.len(),
                size = ?self.aggregated.size,
                "File part read"
            );
            if self.aggregated.is_read_complete() {
                break;
            }
            // A card that stops sending data would keep us here forever
            if received == 0 {
                return Err(TangemSdkError::InvalidResponse);
            }
        }

        let mut response = std::mem::take(&mut self.aggregated);
        response.wallet_index = response.wallet_index.or(self.wallet_index);
        Ok(response)
    }
}

/// A file as returned by [`ReadFilesTask`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    #[serde(with = "crate::hex_serde")]
    pub file_data: Vec<u8>,
    pub file_index: u8,
    pub file_settings: Option<FileSettings>,
}

impl From<ReadFileResponse> for File {
    fn from(response: ReadFileResponse) -> Self {
        Self {
            file_data: response.file_data,
            file_index: response.file_index,
            file_settings: response.settings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFilesResponse {
    pub files: Vec<File>,
}

/// Reads the listed files, or every readable file when no index is given.
///
/// Reading every file walks the indices the card reports until it answers
/// `FileNotFound`.
#[derive(Debug, Clone, Default)]
pub struct ReadFilesTask {
    read_private_files: bool,
    indices: Vec<u8>,
}

impl ReadFilesTask {
    pub const fn new(read_private_files: bool) -> Self {
        Self {
            read_private_files,
            indices: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_indices(mut self, indices: Vec<u8>) -> Self {
        self.indices = indices;
        self
    }

    fn read(&self, index: u8, session: &mut CardSession) -> Result<ReadFileResponse> {
        ReadFileCommand::new(index)
            .with_private_files(self.read_private_files)
            .run(session)
    }

    fn read_all(&self, session: &mut CardSession) -> Result<Vec<File>> {
        let mut files = Vec::new();
        let mut index = 0u8;
        loop {
            let response = match self.read(index, session) {
                Ok(response) => response,
                Err(TangemSdkError::FileNotFound) => {
                    debug!(count = files.len(), "No more files");
                    return Ok(files);
                }
                Err(error) => return Err(error),
            };
            let next = response.file_index.checked_add(1);
            if !response.file_data.is_empty() {
                files.push(File::from(response));
            }
            match next {
                Some(next) => index = next,
                None => return Ok(files),
            }
        }
    }
}

impl CardSessionRunnable for ReadFilesTask {
    type Response = ReadFilesResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let files = if self.indices.is_empty() {
            self.read_all(session)?
        } else {
            self.indices
                .iter()
                .map(|&index| self.read(index, session).map(File::from))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(ReadFilesResponse { files })
    }
}
