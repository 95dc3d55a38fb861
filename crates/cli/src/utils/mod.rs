use std::io::{self, Write};

use serde::Serialize;
use tangem_sdk::TangemSdkError;

pub mod reader;
pub mod session;

/// Decode a hex argument, with or without a `0x` prefix
pub fn parse_hex(value: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    hex::decode(value.trim_start_matches("0x")).map_err(|e| format!("Invalid hex '{}': {}", value, e).into())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prompt on stdin. An empty answer cancels.
pub fn prompt(label: &str) -> Result<String, TangemSdkError> {
    print!("{}", label);
    io::stdout()
        .flush()
        .map_err(|e| TangemSdkError::Underlying(e.to_string()))?;

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .map_err(|e| TangemSdkError::Underlying(e.to_string()))?;

    match answer.trim() {
        "" => Err(TangemSdkError::UserCancelled),
        answer => Ok(answer.to_string()),
    }
}
