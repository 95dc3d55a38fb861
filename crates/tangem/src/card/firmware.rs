use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TangemSdkError;

/// Build flavour encoded in the firmware string suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FirmwareType {
    /// `d SDK`
    Sdk,
    /// `r`, or no suffix at all
    Release,
    Special,
}

impl FirmwareType {
    fn from_suffix(suffix: &str) -> Self {
        match suffix.trim() {
            "" | "r" => Self::Release,
            _ if suffix == "d SDK" => Self::Sdk,
            _ => Self::Special,
        }
    }

    const fn suffix(self) -> &'static str {
        match self {
            Self::Sdk => "d SDK",
            Self::Release => "r",
            Self::Special => "",
        }
    }
}

/// Firmware version as reported by the card, e.g. `4.52r`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareVersion {
    pub string_value: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub firmware_type: FirmwareType,
}

impl FirmwareVersion {
    pub const FILES_AVAILABLE: Self = Self::new_const(3, 29);
    pub const FILES_BY_USER_CODES_AVAILABLE: Self = Self::new_const(3, 34);
    pub const MULTI_WALLET_AVAILABLE: Self = Self::new_const(4, 0);
    pub const IS_PASSCODE_STATUS_AVAILABLE: Self = Self::new_const(4, 1);
    pub const CREATE_WALLET_RESPONSE_AVAILABLE: Self = Self::new_const(4, 25);
    pub const HD_WALLET_AVAILABLE: Self = Self::new_const(4, 28);
    pub const IS_ACCESS_CODE_STATUS_AVAILABLE: Self = Self::new_const(4, 33);
    pub const BACKUP_AVAILABLE: Self = Self::new_const(4, 43);

    const fn new_const(major: u32, minor: u32) -> Self {
        Self {
            string_value: String::new(),
            major,
            minor,
            patch: 0,
            firmware_type: FirmwareType::Sdk,
        }
    }

    pub fn new(major: u32, minor: u32, patch: u32, firmware_type: FirmwareType) -> Self {
        let mut string_value = format!("{major}.{minor}");
        if patch != 0 {
            string_value.push_str(&format!(".{patch}"));
        }
        string_value.push_str(firmware_type.suffix());
        Self {
            string_value,
            major,
            minor,
            patch,
            firmware_type,
        }
    }

    /// `major.minor` as a float, for coarse threshold checks
    pub fn double_value(&self) -> f64 {
        format!("{}.{}", self.major, self.minor)
            .parse()
            .unwrap_or_default()
    }
}

impl FromStr for FirmwareVersion {
    type Err = TangemSdkError;

    fn from_str(version: &str) -> Result<Self, Self::Err> {
        let cleaned = version.trim_end_matches('\0');
        let is_version_char = |c: char| c.is_ascii_digit() || c == '.';
        let suffix = cleaned.trim_matches(is_version_char);
        let numbers = if suffix.is_empty() {
            cleaned.to_owned()
        } else {
            cleaned.replace(suffix, "")
        };

        let parse = |part: Option<&str>| -> Result<u32, TangemSdkError> {
            part.filter(|p| !p.is_empty())
                .map(|p| {
                    p.parse()
                        .map_err(|_| TangemSdkError::DecodingFailed(format!("firmware {version}")))
                })
                .transpose()
                .map(Option::unwrap_or_default)
        };
        let mut parts = numbers.split('.');
        let major = parse(parts.next())?;
        let minor = parse(parts.next())?;
        let patch = parse(parts.next())?;

        Ok(Self {
            string_value: version.to_owned(),
            major,
            minor,
            patch,
            firmware_type: FirmwareType::from_suffix(suffix),
        })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.string_value.is_empty() {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}", self.string_value.trim_end_matches('\0'))
        }
    }
}

impl PartialEq for FirmwareVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FirmwareVersion {}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}
