use derive_more::Display;

/// Instruction byte of a Tangem command APDU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(u8)]
pub enum Instruction {
    WriteIssuerData = 0xF0,
    Personalize = 0xF1,
    Read = 0xF2,
    AttestCardKey = 0xF3,
    ValidateCard = 0xF4,
    VerifyCode = 0xF5,
    ReadIssuerData = 0xF7,
    CreateWallet = 0xF8,
    CheckWallet = 0xF9,
    SetPin = 0xFA,
    Sign = 0xFB,
    PurgeWallet = 0xFC,
    Activate = 0xFE,
    OpenSession = 0xFF,
    WriteUserData = 0xE0,
    ReadUserData = 0xE1,
    Depersonalize = 0xE3,
    WriteFileData = 0xD0,
    ReadFileData = 0xD1,
}

impl Instruction {
    pub const fn code(self) -> u8 {
        self as u8
    }
}
