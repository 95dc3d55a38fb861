//! Access code and passcode management

use tangem_sdk::CardSession;
use tangem_sdk::commands::{SetUserCodeCommand, SetUserCodeResponse};

/// Change the access code; without `code` the terminal prompts for it
pub fn set_access_code_command(
    session: &mut CardSession,
    code: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = session.start(&mut SetUserCodeCommand::change_access_code(code))?;
    report("Access code changed", &response);
    Ok(())
}

pub fn set_passcode_command(session: &mut CardSession, code: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let response = session.start(&mut SetUserCodeCommand::change_passcode(code))?;
    report("Passcode changed", &response);
    Ok(())
}

pub fn reset_codes_command(session: &mut CardSession) -> Result<(), Box<dyn std::error::Error>> {
    let response = session.start(&mut SetUserCodeCommand::reset_user_codes())?;
    report("User codes reset", &response);
    Ok(())
}

fn report(message: &str, response: &SetUserCodeResponse) {
    println!("\u{2705} {} on card {} ({:?})", message, response.card_id, response.status);
}
