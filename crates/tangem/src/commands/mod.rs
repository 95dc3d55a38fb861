//! Card commands and the engine that drives them over a [`CardSession`].
//!
//! A command only describes its wire contract through [`Command`]; the shared
//! [`transceive`] helper runs the checks, the user code prompts and the
//! status word handling around it. Multi-round commands call [`transceive`]
//! once per round from their own [`CardSessionRunnable::run`].

pub mod attest_card_key;
pub mod change_file_settings;
pub mod create_wallet;
pub mod delete_files;
pub mod depersonalize;
pub mod open_session;
pub mod personalize;
pub mod preflight_read;
pub mod purge_wallet;
pub mod read;
pub mod read_files;
pub mod read_wallet;
pub mod read_wallets_list;
pub mod set_user_code;
pub mod sign;
pub mod write_file;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::apdu::{CommandApdu, ResponseApdu, StatusWord};
use crate::card::Card;
use crate::environment::{SessionEnvironment, UserCode, UserCodeType};
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvDecoder, TlvTag};

pub use attest_card_key::{AttestCardKeyCommand, AttestCardKeyResponse};
pub use change_file_settings::{ChangeFileSettingsCommand, ChangeFileSettingsTask};
pub use create_wallet::{CreateWalletCommand, CreateWalletResponse, CreateWalletTask};
pub use delete_files::{DeleteFileCommand, DeleteFilesTask};
pub use depersonalize::{DepersonalizeCommand, DepersonalizeResponse};
pub use open_session::{OpenSessionCommand, OpenSessionResponse};
pub use personalize::PersonalizeCommand;
pub use preflight_read::PreflightReadTask;
pub use purge_wallet::PurgeWalletCommand;
pub use read::{ReadCommand, ReadMode, ReadResponse};
pub use read_files::{File, ReadFileCommand, ReadFileResponse, ReadFilesResponse, ReadFilesTask};
pub use read_wallet::{ReadWalletCommand, ReadWalletResponse};
pub use read_wallets_list::{ReadWalletsListCommand, ReadWalletsListResponse};
pub use set_user_code::{SetPinStatus, SetUserCodeCommand, SetUserCodeResponse};
pub use sign::{ChunkedHashesContainer, SignCommand, SignHashCommand, SignHashResponse, SignResponse};
pub use write_file::{
    FileDataMode, FileSettings, FileToWrite, FileVisibility, WriteFileCommand, WriteFileResponse, WriteFilesResponse,
    WriteFilesTask,
};

/// The read a session performs before handing the card to a runnable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreflightReadMode {
    /// Nothing is read; the runnable talks to an unknown card
    None,
    ReadCardOnly,
    /// Card data and every wallet
    FullCardRead,
    /// Card data and the wallet with this public key
    ReadWallet(#[serde(with = "crate::hex_serde")] Vec<u8>),
}

/// Plain success with no payload of interest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub card_id: String,
}

/// Wire contract of a single card command
pub trait Command {
    type Response;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::FullCardRead
    }

    fn requires_passcode(&self) -> bool {
        false
    }

    /// Validation against the known card, before anything is sent
    fn perform_pre_check(&self, _card: &Card) -> Result<()> {
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu>;

    fn deserialize(&self, environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response>;

    /// Re-classify a card error using what is known about the card
    fn map_error(&self, _card: Option<&Card>, error: TangemSdkError) -> TangemSdkError {
        error
    }
}

/// Anything a [`CardSession`] can run: single commands and multi-command tasks
pub trait CardSessionRunnable {
    type Response;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::FullCardRead
    }

    /// Interactive step that runs before any command of the runnable
    fn prepare(&mut self, _session: &mut CardSession) -> Result<()> {
        Ok(())
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response>;
}

/// Serialize, send and deserialize one round of `command`.
///
/// Wrong or missing user codes are requested from the delegate and the same
/// round is retried with the new value.
pub fn transceive<C: Command + ?Sized>(command: &C, session: &mut CardSession) -> Result<C::Response> {
    let handle_errors = session.environment.config.handle_errors;
    if let Some(card) = &session.environment.card {
        if handle_errors {
            command.perform_pre_check(card)?;
        }
    } else if command.preflight_read_mode() != PreflightReadMode::None {
        return Err(TangemSdkError::MissingPreflightRead);
    }

    if command.requires_passcode() && session.environment.passcode_value().is_none() {
        request_code(UserCodeType::Passcode, session)?;
    }

    loop {
        let apdu = command.serialize(&session.environment)?;
        let error = match transceive_apdu(&apdu, session) {
            Ok(response) => return command.deserialize(&session.environment, response),
            Err(error) => error,
        };

        if error == TangemSdkError::ExtendedLengthNotSupported && session.environment.terminal_keys.is_some() {
            debug!("Extended length not supported, retrying without terminal keys");
            session.environment.terminal_keys = None;
            continue;
        }
        if !handle_errors {
            return Err(error);
        }

        match command.map_error(session.environment.card.as_ref(), error) {
            TangemSdkError::AccessCodeRequired => request_code(UserCodeType::AccessCode, session)?,
            error @ (TangemSdkError::InvalidParams | TangemSdkError::PasscodeRequired)
                if command.requires_passcode() =>
            {
                // Cards reporting a default passcode reject the request for other reasons
                let is_passcode_default = session
                    .environment
                    .card
                    .as_ref()
                    .is_some_and(|card| card.is_passcode_set == Some(false));
                if is_passcode_default && !session.environment.is_user_code_set(UserCodeType::Passcode) {
                    return Err(error);
                }
                request_code(UserCodeType::Passcode, session)?;
            }
            error => return Err(error),
        }
    }
}

/// Send one frame, sitting out security delays and escalating encryption on request
pub fn transceive_apdu(apdu: &CommandApdu, session: &mut CardSession) -> Result<ResponseApdu> {
    loop {
        let response = session.send(apdu)?;
        match response.status_word() {
            status if status.is_success() => return Ok(response),
            StatusWord::NeedPause => {
                let remaining = deserialize_security_delay(&response);
                let total = session
                    .environment
                    .card
                    .as_ref()
                    .map_or(0, |card| card.settings.security_delay);
                if let Some(remaining) = remaining {
                    debug!(remaining, total, "Security delay");
                    session.view_delegate().on_security_delay(remaining, total);
                }
            }
            StatusWord::NeedEncryption => {
                let current = session.environment.encryption_mode;
                let next = current.escalate().ok_or(TangemSdkError::NeedEncryption)?;
                warn!(?current, ?next, "Card requires encryption");
                session.environment.encryption_mode = next;
                session.environment.encryption_key = None;
            }
            status => {
                return Err(status
                    .to_error()
                    .unwrap_or(TangemSdkError::UnknownError));
            }
        }
    }
}

/// Remaining security delay in milliseconds
fn deserialize_security_delay(response: &ResponseApdu) -> Option<u32> {
    let decoder = response.tlv_data().map(TlvDecoder::new)?;
    decoder
        .decode_optional::<u16>(TlvTag::Pause)
        .ok()
        .flatten()
        .map(|pause| u32::from(pause) * 10)
}

fn request_code(code_type: UserCodeType, session: &mut CardSession) -> Result<()> {
    warn!("{}", TangemSdkError::from_user_code(code_type, &session.environment));
    let is_first_attempt = !session.environment.is_user_code_set(code_type);
    match code_type {
        UserCodeType::AccessCode => session.environment.access_code = UserCode::unknown(code_type),
        UserCodeType::Passcode => session.environment.passcode = UserCode::unknown(code_type),
    }
    session.request_user_code(code_type, is_first_attempt)
}

/// Decoder over a command response, failing when the payload is not TLV
pub(crate) fn response_decoder(apdu: &ResponseApdu) -> Result<TlvDecoder> {
    apdu.tlv_data()
        .map(TlvDecoder::new)
        .ok_or(TangemSdkError::DeserializeApduFailed)
}

/// Card the current session has read, for commands that cannot work without one
pub(crate) fn known_card(environment: &SessionEnvironment) -> Result<&Card> {
    environment
        .card
        .as_ref()
        .ok_or(TangemSdkError::MissingPreflightRead)
}
