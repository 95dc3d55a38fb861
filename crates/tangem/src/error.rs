use std::collections::BTreeSet;

use thiserror::Error;

use crate::environment::{SessionEnvironment, UserCodeType};

/// Result type for Tangem operations
pub type Result<T> = std::result::Result<T, TangemSdkError>;

/// Error type for every failure the SDK can report.
///
/// Each variant carries a stable numeric [`code`](TangemSdkError::code) that
/// integrations rely on. `Display` renders `"<code>: <name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TangemSdkError {
    // Transport
    #[error("10001: TagLost")]
    TagLost,
    #[error("10002: ExtendedLengthNotSupported")]
    ExtendedLengthNotSupported,

    // Serialization
    #[error("20001: SerializeCommandError")]
    SerializeCommandError,
    #[error("20002: DeserializeApduFailed")]
    DeserializeApduFailed,
    #[error("20003: EncodingFailedTypeMismatch {0}")]
    EncodingFailedTypeMismatch(String),
    #[error("20004: EncodingFailed {0}")]
    EncodingFailed(String),
    #[error("20005: DecodingFailedMissingTag {0}")]
    DecodingFailedMissingTag(String),
    #[error("20006: DecodingFailedTypeMismatch {0}")]
    DecodingFailedTypeMismatch(String),
    #[error("20007: DecodingFailed {0}")]
    DecodingFailed(String),
    #[error("20008: InvalidResponse")]
    InvalidResponse,

    // Status words
    #[error("30001: UnknownStatus {0:04X}")]
    UnknownStatus(u16),
    #[error("30002: ErrorProcessingCommand")]
    ErrorProcessingCommand,
    #[error("30003: InvalidState")]
    InvalidState,
    #[error("30004: InsNotSupported")]
    InsNotSupported,
    #[error("30005: InvalidParams")]
    InvalidParams,
    #[error("30006: NeedEncryption")]
    NeedEncryption,
    #[error("30007: FileNotFound")]
    FileNotFound,
    #[error("30008: WalletNotFound")]
    WalletNotFound,

    // Card state and data
    #[error("40001: NotPersonalized")]
    NotPersonalized,
    #[error("40002: NotActivated")]
    NotActivated,
    #[error("40003: WalletIsPurged")]
    WalletIsPurged,
    #[error("40004: PasscodeRequired")]
    PasscodeRequired,
    #[error("40005: VerificationFailed")]
    VerificationFailed,
    #[error("40006: DataSizeTooLarge")]
    DataSizeTooLarge,
    #[error("40007: MissingCounter")]
    MissingCounter,
    #[error("40008: OverwritingDataIsProhibited")]
    OverwritingDataIsProhibited,
    #[error("40009: DataCannotBeWritten")]
    DataCannotBeWritten,
    #[error("40011: CardVerificationFailed")]
    CardVerificationFailed,
    #[error("40012: WrongAccessCode")]
    WrongAccessCode,
    #[error("40013: WrongPasscode")]
    WrongPasscode,
    #[error("40101: AlreadyPersonalized")]
    AlreadyPersonalized,
    #[error("40401: AccessCodeRequired")]
    AccessCodeRequired,
    #[error("40402: NonHardenedDerivationNotSupported")]
    NonHardenedDerivationNotSupported,
    #[error("40403: WalletCannotBeCreated")]
    WalletCannotBeCreated,
    #[error("40404: CardWithMaxZeroWallets")]
    CardWithMaxZeroWallets,
    #[error("40405: WalletAlreadyCreated")]
    WalletAlreadyCreated,
    #[error("40501: AlreadyCreated")]
    AlreadyCreated,
    #[error("40502: UnsupportedCurve")]
    UnsupportedCurve,
    #[error("40503: MaxNumberOfWalletsCreated")]
    MaxNumberOfWalletsCreated,
    #[error("40504: UnsupportedWalletConfig")]
    UnsupportedWalletConfig,
    #[error("40601: PurgeWalletProhibited")]
    PurgeWalletProhibited,
    #[error("40801: AccessCodeCannotBeChanged")]
    AccessCodeCannotBeChanged,
    #[error("40802: PasscodeCannotBeChanged")]
    PasscodeCannotBeChanged,
    #[error("40803: AccessCodeCannotBeDefault")]
    AccessCodeCannotBeDefault,
    #[error("40901: NoRemainingSignatures")]
    NoRemainingSignatures,
    #[error("40902: EmptyHashes")]
    EmptyHashes,
    #[error("40903: HashSizeMustBeEqual")]
    HashSizeMustBeEqual,
    #[error("40904: WalletIsNotCreated")]
    WalletIsNotCreated,
    #[error("40905: SignHashesNotAvailable")]
    SignHashesNotAvailable,
    #[error("42000: FileSettingsUnsupported")]
    FileSettingsUnsupported,
    #[error("42001: FilesIsEmpty")]
    FilesIsEmpty,
    #[error("42002: FilesDisabled")]
    FilesDisabled,
    #[error("42003: HDWalletDisabled")]
    HdWalletDisabled,

    // SDK
    #[error("50000: ExceptionError {0}")]
    ExceptionError(String),
    #[error("50001: UnknownError")]
    UnknownError,
    #[error("50002: UserCancelled")]
    UserCancelled,
    #[error("50003: Busy")]
    Busy,
    #[error("50004: MissingPreflightRead")]
    MissingPreflightRead,
    #[error("50005: WrongCardNumber {0}")]
    WrongCardNumber(String),
    #[error("50006: WrongCardType")]
    WrongCardType,
    #[error("50007: CardError")]
    CardError,
    #[error("50008: NotSupportedFirmwareVersion")]
    NotSupportedFirmwareVersion,
    #[error("50011: CryptoUtilsError {0}")]
    CryptoUtilsError(String),
    #[error("50012: Underlying {0}")]
    Underlying(String),
    #[error("50013: UserForgotTheCode")]
    UserForgotTheCode,
    #[error("50023: MnemonicException {0}")]
    MnemonicException(#[from] MnemonicError),
    #[error("50024: HDWalletError {0}")]
    HdWallet(#[from] HdWalletError),
}

impl TangemSdkError {
    /// Stable numeric code of the error.
    pub const fn code(&self) -> u32 {
        match self {
            Self::TagLost => 10001,
            Self::ExtendedLengthNotSupported => 10002,
            Self::SerializeCommandError => 20001,
            Self::DeserializeApduFailed => 20002,
            Self::EncodingFailedTypeMismatch(_) => 20003,
            Self::EncodingFailed(_) => 20004,
            Self::DecodingFailedMissingTag(_) => 20005,
            Self::DecodingFailedTypeMismatch(_) => 20006,
            Self::DecodingFailed(_) => 20007,
            Self::InvalidResponse => 20008,
            Self::UnknownStatus(_) => 30001,
            Self::ErrorProcessingCommand => 30002,
            Self::InvalidState => 30003,
            Self::InsNotSupported => 30004,
            Self::InvalidParams => 30005,
            Self::NeedEncryption => 30006,
            Self::FileNotFound => 30007,
            Self::WalletNotFound => 30008,
            Self::NotPersonalized => 40001,
            Self::NotActivated => 40002,
            Self::WalletIsPurged => 40003,
            Self::PasscodeRequired => 40004,
            Self::VerificationFailed => 40005,
            Self::DataSizeTooLarge => 40006,
            Self::MissingCounter => 40007,
            Self::OverwritingDataIsProhibited => 40008,
            Self::DataCannotBeWritten => 40009,
            Self::CardVerificationFailed => 40011,
            Self::WrongAccessCode => 40012,
            Self::WrongPasscode => 40013,
            Self::AlreadyPersonalized => 40101,
            Self::AccessCodeRequired => 40401,
            Self::NonHardenedDerivationNotSupported => 40402,
            Self::WalletCannotBeCreated => 40403,
            Self::CardWithMaxZeroWallets => 40404,
            Self::WalletAlreadyCreated => 40405,
            Self::AlreadyCreated => 40501,
            Self::UnsupportedCurve => 40502,
            Self::MaxNumberOfWalletsCreated => 40503,
            Self::UnsupportedWalletConfig => 40504,
            Self::PurgeWalletProhibited => 40601,
            Self::AccessCodeCannotBeChanged => 40801,
            Self::PasscodeCannotBeChanged => 40802,
            Self::AccessCodeCannotBeDefault => 40803,
            Self::NoRemainingSignatures => 40901,
            Self::EmptyHashes => 40902,
            Self::HashSizeMustBeEqual => 40903,
            Self::WalletIsNotCreated => 40904,
            Self::SignHashesNotAvailable => 40905,
            Self::FileSettingsUnsupported => 42000,
            Self::FilesIsEmpty => 42001,
            Self::FilesDisabled => 42002,
            Self::HdWalletDisabled => 42003,
            Self::ExceptionError(_) => 50000,
            Self::UnknownError => 50001,
            Self::UserCancelled => 50002,
            Self::Busy => 50003,
            Self::MissingPreflightRead => 50004,
            Self::WrongCardNumber(_) => 50005,
            Self::WrongCardType => 50006,
            Self::CardError => 50007,
            Self::NotSupportedFirmwareVersion => 50008,
            Self::CryptoUtilsError(_) => 50011,
            Self::Underlying(_) => 50012,
            Self::UserForgotTheCode => 50013,
            Self::MnemonicException(_) => 50023,
            Self::HdWallet(_) => 50024,
        }
    }

    /// Variant name as rendered by `Display`, without the code or details
    pub fn name(&self) -> String {
        let rendered = self.to_string();
        rendered
            .split_once(": ")
            .map_or(rendered.as_str(), |(_, rest)| rest)
            .split(' ')
            .next()
            .unwrap_or_default()
            .to_owned()
    }

    /// Cancellation is reported like any other failure but UIs usually keep it silent.
    pub const fn is_user_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    /// Error to report when a card refused the given user code.
    ///
    /// A code that was already entered is wrong; a code that was never entered is required.
    pub fn from_user_code(code_type: UserCodeType, environment: &SessionEnvironment) -> Self {
        let is_set = environment.is_user_code_set(code_type);
        match (code_type, is_set) {
            (UserCodeType::AccessCode, true) => Self::WrongAccessCode,
            (UserCodeType::AccessCode, false) => Self::AccessCodeRequired,
            (UserCodeType::Passcode, true) => Self::WrongPasscode,
            (UserCodeType::Passcode, false) => Self::PasscodeRequired,
        }
    }
}

/// BIP39 mnemonic failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MnemonicError {
    #[error("Invalid word count")]
    InvalidWordCount,
    #[error("Invalid checksum")]
    InvalidChecksum,
    #[error("Invalid words: {0:?}")]
    InvalidWords(BTreeSet<String>),
    #[error("Unsupported language")]
    UnsupportedLanguage,
    #[error("Invalid entropy length")]
    InvalidEntropyLength,
    #[error("Normalization failed")]
    NormalizationFailed,
    #[error("Mnemonic creation failed")]
    MnemonicCreationFailed,
}

/// BIP32 and derivation path failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HdWalletError {
    #[error("Wrong derivation path")]
    WrongPath,
    #[error("Hardened derivation is not supported for public keys")]
    HardenedNotSupported,
    #[error("Derivation failed")]
    DerivationFailed,
    #[error("Wrong extended key length")]
    WrongLength,
    #[error("Wrong extended key version")]
    WrongVersion,
    #[error("Extended key decoding failed")]
    DecodingFailed,
    #[error("Wrong extended key")]
    WrongKey,
    #[error("Invalid seed length")]
    InvalidSeed,
    #[error("Unable to produce a valid master key")]
    InvalidMasterKey,
    #[error("Unsupported curve")]
    UnsupportedCurve,
}
