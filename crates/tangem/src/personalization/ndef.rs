//! NDEF message written at personalization.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TangemSdkError};

const MESSAGE_BEGIN: u8 = 0x80;
const MESSAGE_END: u8 = 0x40;
const SHORT_RECORD_WELL_KNOWN: u8 = 0x11;
const SHORT_RECORD_EXTERNAL: u8 = 0x14;
const AAR_TYPE: &[u8] = b"android.com:pkg";

const URI_PREFIXES: [(&str, u8); 4] = [
    ("http://www.", 0x01),
    ("https://www.", 0x02),
    ("http://", 0x03),
    ("https://", 0x04),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NdefRecordType {
    Uri,
    Aar,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdefRecord {
    #[serde(rename = "type")]
    pub record_type: NdefRecordType,
    pub value: String,
}

impl NdefRecord {
    pub fn new(record_type: NdefRecordType, value: impl Into<String>) -> Self {
        Self {
            record_type,
            value: value.into(),
        }
    }

    fn type_and_payload(&self) -> Result<(u8, Vec<u8>, Vec<u8>)> {
        match self.record_type {
            NdefRecordType::Aar => Ok((SHORT_RECORD_EXTERNAL, AAR_TYPE.to_vec(), self.value.as_bytes().to_vec())),
            NdefRecordType::Uri => {
                let (prefix, code) = URI_PREFIXES
                    .iter()
                    .find(|(prefix, _)| self.value.starts_with(prefix))
                    .ok_or_else(|| TangemSdkError::EncodingFailed(format!("Unsupported NDEF URI {}", self.value)))?;
                let mut payload = vec![*code];
                payload.extend_from_slice(self.value[prefix.len()..].as_bytes());
                Ok((SHORT_RECORD_WELL_KNOWN, b"U".to_vec(), payload))
            }
            NdefRecordType::Text => {
                let mut payload = vec![0x02];
                payload.extend_from_slice(b"en");
                payload.extend_from_slice(self.value.as_bytes());
                Ok((SHORT_RECORD_WELL_KNOWN, b"T".to_vec(), payload))
            }
        }
    }
}

/// Length-prefixed NDEF message. A dynamic message leaves the end flag to the card.
pub fn encode_ndef(records: &[NdefRecord], use_dynamic_ndef: bool) -> Result<Vec<u8>> {
    let mut message = Vec::new();
    for (index, record) in records.iter().enumerate() {
        let (flags, record_type, payload) = record.type_and_payload()?;
        let mut header = flags;
        if index == 0 {
            header |= MESSAGE_BEGIN;
        }
        if !use_dynamic_ndef && index + 1 == records.len() {
            header |= MESSAGE_END;
        }
        let payload_len = u8::try_from(payload.len()).map_err(|_| TangemSdkError::DataSizeTooLarge)?;
        let type_len = u8::try_from(record_type.len()).map_err(|_| TangemSdkError::DataSizeTooLarge)?;
        message.extend_from_slice(&[header, type_len, payload_len]);
        message.extend_from_slice(&record_type);
        message.extend_from_slice(&payload);
    }

    let length = u16::try_from(message.len()).map_err(|_| TangemSdkError::DataSizeTooLarge)?;
    let mut encoded = length.to_be_bytes().to_vec();
    encoded.extend(message);
    Ok(encoded)
}
