use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{CardSessionRunnable, Command, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu, StatusWord};
use crate::card::Card;
use crate::environment::{SessionEnvironment, UserCodeType};
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

/// Which codes the card reports as changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetPinStatus {
    PinsNotChanged,
    Pin1Changed,
    Pin2Changed,
    Pin3Changed,
    Pins12Changed,
    Pins13Changed,
    Pins23Changed,
    Pins123Changed,
}

impl SetPinStatus {
    pub const fn from_status_word(status: StatusWord) -> Option<Self> {
        match status {
            StatusWord::ProcessCompleted => Some(Self::PinsNotChanged),
            StatusWord::Pin1Changed => Some(Self::Pin1Changed),
            StatusWord::Pin2Changed => Some(Self::Pin2Changed),
            StatusWord::Pin3Changed => Some(Self::Pin3Changed),
            StatusWord::Pins12Changed => Some(Self::Pins12Changed),
            StatusWord::Pins13Changed => Some(Self::Pins13Changed),
            StatusWord::Pins23Changed => Some(Self::Pins23Changed),
            StatusWord::Pins123Changed => Some(Self::Pins123Changed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetUserCodeResponse {
    pub card_id: String,
    pub status: SetPinStatus,
}

/// What happens to one code
#[derive(Clone, PartialEq, Eq)]
enum CodeAction {
    /// Keep the current value
    Keep,
    /// Ask the user for the new value
    Request,
    /// Set this hash
    Value(Vec<u8>),
}

impl CodeAction {
    fn from_code(code: Option<&str>) -> Self {
        code.map_or(Self::Request, |code| Self::Value(hash(code)))
    }
}

impl std::fmt::Debug for CodeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keep => f.write_str("Keep"),
            Self::Request => f.write_str("Request"),
            Self::Value(_) => f.write_str("Value(******)"),
        }
    }
}

fn hash(code: &str) -> Vec<u8> {
    Sha256::digest(code.as_bytes()).to_vec()
}

/// Changes the access code, the passcode, or both
#[derive(Debug, Clone)]
pub struct SetUserCodeCommand {
    access_code: CodeAction,
    passcode: CodeAction,
    /// Resets are the only way to go back to factory codes
    restrict_default_codes: bool,
}

impl SetUserCodeCommand {
    /// `None` asks the user for the new code
    pub fn change_access_code(access_code: Option<&str>) -> Self {
        Self {
            access_code: CodeAction::from_code(access_code),
            passcode: CodeAction::Keep,
            restrict_default_codes: true,
        }
    }

    pub fn change_passcode(passcode: Option<&str>) -> Self {
        Self {
            access_code: CodeAction::Keep,
            passcode: CodeAction::from_code(passcode),
            restrict_default_codes: true,
        }
    }

    pub fn change(access_code: Option<&str>, passcode: Option<&str>) -> Self {
        Self {
            access_code: CodeAction::from_code(access_code),
            passcode: CodeAction::from_code(passcode),
            restrict_default_codes: true,
        }
    }

    pub fn reset_access_code() -> Self {
        Self {
            restrict_default_codes: false,
            ..Self::change_access_code(Some(UserCodeType::AccessCode.default_value()))
        }
    }

    pub fn reset_passcode() -> Self {
        Self {
            restrict_default_codes: false,
            ..Self::change_passcode(Some(UserCodeType::Passcode.default_value()))
        }
    }

    pub fn reset_user_codes() -> Self {
        Self {
            restrict_default_codes: false,
            ..Self::change(
                Some(UserCodeType::AccessCode.default_value()),
                Some(UserCodeType::Passcode.default_value()),
            )
        }
    }

    const fn action(&self, code_type: UserCodeType) -> &CodeAction {
        match code_type {
            UserCodeType::AccessCode => &self.access_code,
            UserCodeType::Passcode => &self.passcode,
        }
    }

    fn is_default(&self, code_type: UserCodeType) -> bool {
        matches!(self.action(code_type), CodeAction::Value(value) if *value == hash(code_type.default_value()))
    }

    fn request_if_needed(&mut self, code_type: UserCodeType, session: &mut CardSession) -> Result<()> {
        if *self.action(code_type) != CodeAction::Request {
            return Ok(());
        }
        let card_id = session.environment.card.as_ref().map(|card| card.card_id.clone());
        let code = session
            .view_delegate()
            .request_user_code_change(code_type, card_id.as_deref())?;
        let action = CodeAction::Value(hash(&code));
        match code_type {
            UserCodeType::AccessCode => self.access_code = action,
            UserCodeType::Passcode => self.passcode = action,
        }
        Ok(())
    }

    fn new_value<'a>(&'a self, code_type: UserCodeType, environment: &'a SessionEnvironment) -> Option<&'a [u8]> {
        match self.action(code_type) {
            CodeAction::Value(value) => Some(value),
            _ => environment.user_code(code_type).value(),
        }
    }
}

impl Command for SetUserCodeCommand {
    type Response = SetUserCodeResponse;

    fn requires_passcode(&self) -> bool {
        true
    }

    fn perform_pre_check(&self, card: &Card) -> Result<()> {
        if self.access_code != CodeAction::Keep && !card.settings.is_setting_access_code_allowed {
            return Err(TangemSdkError::AccessCodeCannotBeChanged);
        }
        if self.passcode != CodeAction::Keep && !card.settings.is_setting_passcode_allowed {
            return Err(TangemSdkError::PasscodeCannotBeChanged);
        }
        if self.is_default(UserCodeType::AccessCode) && !card.settings.is_removing_access_code_allowed {
            return Err(TangemSdkError::AccessCodeCannotBeDefault);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;
        let mut builder = TlvBuilder::new();
        builder
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append_optional(TlvTag::Pin2, environment.passcode_value())?
            .append(TlvTag::CardId, &card.card_id)?
            .append_optional(TlvTag::NewPin, self.new_value(UserCodeType::AccessCode, environment))?
            .append_optional(TlvTag::NewPin2, self.new_value(UserCodeType::Passcode, environment))?
            .append_optional(TlvTag::Cvc, environment.cvc.as_ref())?;
        Ok(CommandApdu::new(Instruction::SetPin, builder.serialize()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let status = SetPinStatus::from_status_word(apdu.status_word()).ok_or(TangemSdkError::InvalidResponse)?;
        let decoder = response_decoder(&apdu)?;
        Ok(SetUserCodeResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
            status,
        })
    }
}

impl CardSessionRunnable for SetUserCodeCommand {
    type Response = SetUserCodeResponse;

    fn prepare(&mut self, session: &mut CardSession) -> Result<()> {
        self.request_if_needed(UserCodeType::AccessCode, session)?;
        self.request_if_needed(UserCodeType::Passcode, session)
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        // Chained from another runnable, prepare has not run
        self.prepare(session)?;

        let restricted = self.is_default(UserCodeType::AccessCode) || self.is_default(UserCodeType::Passcode);
        if self.restrict_default_codes && restricted {
            return Err(TangemSdkError::PasscodeCannotBeChanged);
        }

        let response = transceive(self, session)?;
        debug!(status = ?response.status, "User codes set");

        for code_type in [UserCodeType::AccessCode, UserCodeType::Passcode] {
            if let CodeAction::Value(value) = self.action(code_type) {
                session.environment.set_user_code_hash(code_type, value.clone());
            }
        }
        if let Some(card) = session.environment.card.as_mut() {
            if self.access_code != CodeAction::Keep {
                card.is_access_code_set = !self.is_default(UserCodeType::AccessCode);
            }
            if self.passcode != CodeAction::Keep {
                card.is_passcode_set = Some(!self.is_default(UserCodeType::Passcode));
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::fixtures::card;
    use crate::card::{CardSettings, SettingsMask};

    #[test]
    fn test_new_codes_are_hashed() {
        let mut env = SessionEnvironment::default();
        env.card = Some(card(vec![]));
        let command = SetUserCodeCommand::change_access_code(Some("1234"));
        let apdu = command.serialize(&env).unwrap();
        let tlvs = crate::tlv::Tlv::deserialize(&apdu.data).unwrap();

        let new_pin = tlvs.iter().find(|t| t.tag == TlvTag::NewPin).unwrap();
        assert_eq!(
            hex::encode(&new_pin.value),
            "03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4"
        );
        // The passcode is kept: its current value is sent again
        let new_pin2 = tlvs.iter().find(|t| t.tag == TlvTag::NewPin2).unwrap();
        assert_eq!(Some(new_pin2.value.as_ref()), env.passcode_value());
    }

    #[test]
    fn test_reset_is_not_restricted() {
        assert!(!SetUserCodeCommand::reset_user_codes().restrict_default_codes);
        assert!(SetUserCodeCommand::reset_user_codes().is_default(UserCodeType::Passcode));
        assert!(!SetUserCodeCommand::change_passcode(Some("1111")).is_default(UserCodeType::Passcode));
        assert_eq!(SetUserCodeCommand::change(None, None).passcode, CodeAction::Request);
    }

    #[test]
    fn test_pre_checks() {
        let mut known = card(vec![]);
        known.settings = CardSettings::new(0, 1, SettingsMask::ALLOW_SET_PIN1, None, None);
        assert_eq!(
            SetUserCodeCommand::change_passcode(Some("1111")).perform_pre_check(&known),
            Err(TangemSdkError::PasscodeCannotBeChanged)
        );
        assert_eq!(SetUserCodeCommand::change_access_code(Some("1111")).perform_pre_check(&known), Ok(()));

        known.settings = CardSettings::new(
            0,
            1,
            SettingsMask::ALLOW_SET_PIN1 | SettingsMask::PROHIBIT_DEFAULT_PIN1,
            None,
            None,
        );
        assert_eq!(
            SetUserCodeCommand::reset_access_code().perform_pre_check(&known),
            Err(TangemSdkError::AccessCodeCannotBeDefault)
        );
    }

    #[test]
    fn test_pin_status_from_status_word() {
        assert_eq!(
            SetPinStatus::from_status_word(StatusWord::Pins12Changed),
            Some(SetPinStatus::Pins12Changed)
        );
        assert_eq!(SetPinStatus::from_status_word(StatusWord::InvalidState), None);
    }
}
