//! Callbacks the SDK uses to drive the user interface.

use crate::environment::UserCodeType;
use crate::error::{Result, TangemSdkError};

/// What did not match when the wrong card was tapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrongValueType {
    CardId,
    CardType,
}

/// Receives session progress and answers requests for user input.
///
/// Every method has a silent default so front ends implement only what they show.
/// The two `request_*` methods block the session until the user answers; returning
/// [`TangemSdkError::UserCancelled`] aborts it.
pub trait SessionViewDelegate: Send {
    fn on_session_started(&mut self, _card_id: Option<&str>) {}

    fn on_tag_connected(&mut self) {}

    fn on_tag_lost(&mut self) {}

    /// The card is enforcing a security delay; `ms` is what remains of `total_ms`
    fn on_security_delay(&mut self, _ms: u32, _total_ms: u32) {}

    /// Progress of a long multi-round operation
    fn on_delay(&mut self, _total: usize, _current: usize, _step: usize) {}

    fn on_wrong_card(&mut self, _kind: WrongValueType) {}

    fn on_error(&mut self, _error: &TangemSdkError) {}

    fn request_user_code(
        &mut self,
        _code_type: UserCodeType,
        _is_first_attempt: bool,
        _show_forgot_button: bool,
        _card_id: Option<&str>,
    ) -> Result<String> {
        Err(TangemSdkError::UserCancelled)
    }

    /// Ask for a new value of `code_type`
    fn request_user_code_change(
        &mut self,
        _code_type: UserCodeType,
        _card_id: Option<&str>,
    ) -> Result<String> {
        Err(TangemSdkError::UserCancelled)
    }

    fn dismiss(&mut self) {}
}

/// Delegate that shows nothing and never has a code to offer
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentDelegate;

impl SessionViewDelegate for SilentDelegate {}
