//! A card session: one reader, one view delegate and the environment they share.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::apdu::encryption::{self, KeyAgreement};
use crate::apdu::{CommandApdu, EncryptionMode, ResponseApdu};
use crate::commands::open_session::OpenSessionCommand;
use crate::commands::preflight_read::PreflightReadTask;
use crate::commands::{CardSessionRunnable, Command, PreflightReadMode};
use crate::config::Config;
use crate::delegate::{SessionViewDelegate, WrongValueType};
use crate::environment::{SessionEnvironment, UserCodeType};
use crate::error::{Result, TangemSdkError};
use crate::reader::CardReader;
use crate::storage::{AccessCodeRepository, SecureStorage};

/// Cancels a running session from another thread
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Inactive,
    Active,
}

/// Runs commands against one card.
///
/// Commands are executed strictly one after another; the environment is only
/// ever touched by the command currently running.
pub struct CardSession {
    reader: Box<dyn CardReader>,
    delegate: Box<dyn SessionViewDelegate>,
    pub environment: SessionEnvironment,
    access_codes: Option<AccessCodeRepository>,
    cancellation: CancellationHandle,
    state: SessionState,
}

impl CardSession {
    pub fn new(
        reader: Box<dyn CardReader>,
        delegate: Box<dyn SessionViewDelegate>,
        config: Config,
    ) -> Self {
        Self {
            reader,
            delegate,
            environment: SessionEnvironment::new(config),
            access_codes: None,
            cancellation: CancellationHandle::default(),
            state: SessionState::Inactive,
        }
    }

    /// Remember access codes in `storage` between sessions
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn SecureStorage>) -> Self {
        self.access_codes = Some(AccessCodeRepository::new(storage));
        self
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    pub fn view_delegate(&mut self) -> &mut dyn SessionViewDelegate {
        self.delegate.as_mut()
    }

    /// Open the session, do the preflight read, run `runnable` and close the session
    pub fn start<R: CardSessionRunnable + ?Sized>(&mut self, runnable: &mut R) -> Result<R::Response> {
        if self.state == SessionState::Active {
            return Err(TangemSdkError::Busy);
        }
        self.state = SessionState::Active;
        self.cancellation.reset();
        self.environment.encryption_key = None;
        self.environment.encryption_mode = self.environment.config.default_encryption_mode;

        let result = self.run_active(runnable);

        if result.is_ok() {
            self.save_access_code_if_needed();
        }
        let cancelled = matches!(&result, Err(e) if e.is_user_cancelled());
        self.reader.stop_session(cancelled);
        self.state = SessionState::Inactive;
        match &result {
            Err(error) if error.is_user_cancelled() => info!("User cancelled the session"),
            Err(error) => {
                warn!("Session finished with {error}");
                self.delegate.on_error(error);
            }
            Ok(_) => debug!("Session finished"),
        }
        self.delegate.dismiss();
        result
    }

    fn run_active<R: CardSessionRunnable + ?Sized>(&mut self, runnable: &mut R) -> Result<R::Response> {
        self.reader.start_session()?;
        let card_id = self.environment.config.card_id.clone();
        self.delegate.on_session_started(card_id.as_deref());
        self.delegate.on_tag_connected();

        if let Some(card_id) = &card_id {
            self.apply_saved_access_code(card_id);
        }

        let mode = runnable.preflight_read_mode();
        if mode != PreflightReadMode::None {
            debug!(?mode, "Preflight read");
            let mut preflight = PreflightReadTask::new(mode, card_id);
            if let Err(error) = preflight.run(self) {
                match error {
                    TangemSdkError::WrongCardNumber(_) => self.delegate.on_wrong_card(WrongValueType::CardId),
                    TangemSdkError::WrongCardType => self.delegate.on_wrong_card(WrongValueType::CardType),
                    _ => {}
                }
                return Err(error);
            }
        }

        runnable.prepare(self)?;
        runnable.run(self)
    }

    /// Encrypt, send and decrypt one frame, surviving a lost tag
    pub fn send(&mut self, apdu: &CommandApdu) -> Result<ResponseApdu> {
        loop {
            if self.cancellation.is_cancelled() {
                return Err(TangemSdkError::UserCancelled);
            }
            self.establish_encryption_if_needed()?;

            let key = self.environment.encryption_key.clone();
            let encrypted = apdu.encrypt(self.environment.encryption_mode, key.as_deref())?;
            match self.reader.transceive(&encrypted) {
                Ok(response) => return response.decrypt(key.as_deref()),
                Err(TangemSdkError::TagLost) => {
                    warn!("Tag lost, waiting for the card");
                    self.delegate.on_tag_lost();
                    self.environment.encryption_key = None;
                    self.reader.wait_for_tag()?;
                    self.delegate.on_tag_connected();
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn establish_encryption_if_needed(&mut self) -> Result<()> {
        let mode = self.environment.encryption_mode;
        if mode == EncryptionMode::None || self.environment.encryption_key.is_some() {
            return Ok(());
        }
        debug!(?mode, "Establishing encryption");

        let agreement = KeyAgreement::new(mode).ok_or_else(|| {
            TangemSdkError::CryptoUtilsError("Failed to establish encryption".into())
        })?;
        let command = OpenSessionCommand::new(mode, agreement.key_a().to_vec());
        let apdu = command.serialize(&self.environment)?;
        let response = self.reader.transceive(&apdu)?;
        let status = response.status_word();
        if !status.is_success() {
            return Err(status
                .to_error()
                .unwrap_or(TangemSdkError::UnknownStatus(response.sw())));
        }
        let opened = command.deserialize(&self.environment, response)?;

        let access_code = self.environment.access_code_value().ok_or_else(|| {
            TangemSdkError::CryptoUtilsError("Failed to establish encryption".into())
        })?;
        let protocol_key = encryption::protocol_key(access_code, &opened.uid);
        let secret = agreement.shared_secret(&opened.session_key_b)?;
        self.environment.encryption_key =
            Some(encryption::session_key(&secret, &protocol_key).to_vec());
        debug!("Encryption established");
        Ok(())
    }

    /// Ask the user for a code and store its hash in the environment
    pub fn request_user_code(&mut self, code_type: UserCodeType, is_first_attempt: bool) -> Result<()> {
        let card_id = self
            .environment
            .card
            .as_ref()
            .map(|card| card.card_id.clone())
            .or_else(|| self.environment.config.card_id.clone());
        debug!(%code_type, is_first_attempt, "Requesting user code");

        let code = self
            .delegate
            .request_user_code(code_type, is_first_attempt, false, card_id.as_deref())?;
        self.environment.set_user_code(code_type, &code);
        Ok(())
    }

    /// Use a remembered access code for `card_id`, if there is one
    pub(crate) fn apply_saved_access_code(&mut self, card_id: &str) {
        let Some(saved) = self.access_codes.as_ref().and_then(|repo| repo.get(card_id)) else {
            return;
        };
        debug!(card_id, "Using saved access code");
        self.environment
            .set_user_code_hash(UserCodeType::AccessCode, saved);
    }

    fn save_access_code_if_needed(&self) {
        if !self.environment.config.save_access_codes {
            return;
        }
        let (Some(repo), Some(card)) = (&self.access_codes, &self.environment.card) else {
            return;
        };
        if !self.environment.is_user_code_set(UserCodeType::AccessCode) {
            return;
        }
        if let Some(code) = self.environment.access_code_value() {
            if let Err(error) = repo.save(&card.card_id, code) {
                warn!("Failed to save access code: {error}");
            }
        }
    }
}

impl std::fmt::Debug for CardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardSession")
            .field("reader", &self.reader)
            .field("environment", &self.environment)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
