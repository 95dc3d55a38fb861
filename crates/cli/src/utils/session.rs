use colored::Colorize;
use tangem_sdk::{CardSession, Config, SessionViewDelegate, TangemSdkError, UserCodeType, WrongValueType};
use tracing::info;

use super::{prompt, reader};

/// Shows session progress on the terminal and reads codes from stdin
#[derive(Debug, Default)]
pub struct TerminalDelegate;

impl SessionViewDelegate for TerminalDelegate {
    fn on_session_started(&mut self, card_id: Option<&str>) {
        match card_id {
            Some(card_id) => println!("{} {}", "Insert card".cyan(), card_id),
            None => println!("{}", "Insert a Tangem card into the reader".cyan()),
        }
    }

    fn on_tag_connected(&mut self) {
        info!("Card connected");
    }

    fn on_tag_lost(&mut self) {
        println!("{}", "Card lost, insert it again".yellow());
    }

    fn on_security_delay(&mut self, ms: u32, _total_ms: u32) {
        println!("Security delay: {:.1}s", f64::from(ms) / 1000.0);
    }

    fn on_delay(&mut self, total: usize, current: usize, _step: usize) {
        println!("Progress: {}/{} bytes", current, total);
    }

    fn on_wrong_card(&mut self, kind: WrongValueType) {
        let message = match kind {
            WrongValueType::CardId => "This is not the requested card",
            WrongValueType::CardType => "This card type is not supported",
        };
        println!("{}", message.red());
    }

    fn on_error(&mut self, error: &TangemSdkError) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    fn request_user_code(
        &mut self,
        code_type: UserCodeType,
        is_first_attempt: bool,
        _show_forgot_button: bool,
        _card_id: Option<&str>,
    ) -> tangem_sdk::Result<String> {
        if !is_first_attempt {
            println!("{}", format!("Wrong {}", code_type).yellow());
        }
        prompt(&format!("Enter {}: ", code_type))
    }

    fn request_user_code_change(
        &mut self,
        code_type: UserCodeType,
        _card_id: Option<&str>,
    ) -> tangem_sdk::Result<String> {
        let code = prompt(&format!("New {}: ", code_type))?;
        let confirmation = prompt(&format!("Repeat new {}: ", code_type))?;
        if code != confirmation {
            eprintln!("{}", "Codes do not match".red());
            return Err(TangemSdkError::UserCancelled);
        }
        Ok(code)
    }
}

/// Open a session on the named reader, or on the first one holding a card
pub fn open_session(reader_name: Option<&str>, config: Config) -> Result<CardSession, Box<dyn std::error::Error>> {
    let reader = reader::open_reader(reader_name)?;
    Ok(CardSession::new(Box::new(reader), Box::new(TerminalDelegate), config))
}
