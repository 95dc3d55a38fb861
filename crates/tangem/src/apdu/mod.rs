//! APDU framing, status words and payload encryption.

mod command;
pub mod encryption;
mod instruction;
mod response;

pub use command::CommandApdu;
pub use encryption::EncryptionMode;
pub use instruction::Instruction;
pub use response::{ResponseApdu, StatusWord};
