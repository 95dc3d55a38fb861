//! Scripted reader, recording delegate and card response builders shared by the session tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tangem_sdk::apdu::Instruction;
use tangem_sdk::card::{CardStatus, EllipticCurve, ManufactureDate, SettingsMask, WalletStatus};
use tangem_sdk::tlv::{Tlv, TlvBuilder, TlvTag};
use tangem_sdk::{
    CardReader, CardSession, Config, Result, SessionViewDelegate, TangemSdkError, UserCodeType, WrongValueType,
};

pub const CARD_ID: &str = "AF99001800554008";

#[derive(Debug, Default)]
struct ReaderState {
    responses: VecDeque<Result<Bytes>>,
    sent: Vec<Bytes>,
    stopped: Vec<bool>,
}

/// Replays queued card answers in order and keeps every frame it was given
#[derive(Debug, Clone, Default)]
pub struct ScriptedReader {
    state: Arc<Mutex<ReaderState>>,
}

impl ScriptedReader {
    pub fn respond(&self, data: impl AsRef<[u8]>, sw: u16) -> &Self {
        let mut raw = data.as_ref().to_vec();
        raw.extend_from_slice(&sw.to_be_bytes());
        self.state.lock().responses.push_back(Ok(raw.into()));
        self
    }

    pub fn fail(&self, error: TangemSdkError) -> &Self {
        self.state.lock().responses.push_back(Err(error));
        self
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    /// Instruction byte of every frame sent so far
    pub fn instructions(&self) -> Vec<u8> {
        self.state.lock().sent.iter().map(|frame| frame[1]).collect()
    }

    /// Stop reasons reported by the session, one per session
    pub fn stopped(&self) -> Vec<bool> {
        self.state.lock().stopped.clone()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().responses.len()
    }
}

impl CardReader for ScriptedReader {
    fn start_session(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop_session(&mut self, cancelled: bool) {
        self.state.lock().stopped.push(cancelled);
    }

    fn transceive_raw(&mut self, command: &[u8]) -> Result<Bytes> {
        let mut state = self.state.lock();
        state.sent.push(Bytes::copy_from_slice(command));
        state.responses.pop_front().unwrap_or(Err(TangemSdkError::TagLost))
    }

    fn wait_for_tag(&mut self) -> Result<()> {
        if self.state.lock().responses.is_empty() {
            Err(TangemSdkError::TagLost)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started,
    TagConnected,
    TagLost,
    SecurityDelay(u32, u32),
    Delay(usize, usize),
    WrongCard(WrongValueType),
    Error(u32),
    CodeRequested(UserCodeType, bool),
    Dismissed,
}

/// Records what the session shows and answers code prompts from a queue
#[derive(Debug, Clone, Default)]
pub struct RecordingDelegate {
    events: Arc<Mutex<Vec<Event>>>,
    codes: Arc<Mutex<VecDeque<String>>>,
}

impl RecordingDelegate {
    pub fn with_codes(codes: &[&str]) -> Self {
        let delegate = Self::default();
        delegate
            .codes
            .lock()
            .extend(codes.iter().map(|code| (*code).to_owned()));
        delegate
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl SessionViewDelegate for RecordingDelegate {
    fn on_session_started(&mut self, _card_id: Option<&str>) {
        self.record(Event::Started);
    }

    fn on_tag_connected(&mut self) {
        self.record(Event::TagConnected);
    }

    fn on_tag_lost(&mut self) {
        self.record(Event::TagLost);
    }

    fn on_security_delay(&mut self, ms: u32, total_ms: u32) {
        self.record(Event::SecurityDelay(ms, total_ms));
    }

    fn on_delay(&mut self, total: usize, current: usize, _step: usize) {
        self.record(Event::Delay(total, current));
    }

    fn on_wrong_card(&mut self, kind: WrongValueType) {
        self.record(Event::WrongCard(kind));
    }

    fn on_error(&mut self, error: &TangemSdkError) {
        self.record(Event::Error(error.code()));
    }

    fn request_user_code(
        &mut self,
        code_type: UserCodeType,
        is_first_attempt: bool,
        _show_forgot_button: bool,
        _card_id: Option<&str>,
    ) -> Result<String> {
        self.record(Event::CodeRequested(code_type, is_first_attempt));
        self.codes.lock().pop_front().ok_or(TangemSdkError::UserCancelled)
    }

    fn dismiss(&mut self) {
        self.record(Event::Dismissed);
    }
}

pub fn session(reader: &ScriptedReader, delegate: &RecordingDelegate, config: Config) -> CardSession {
    CardSession::new(Box::new(reader.clone()), Box::new(delegate.clone()), config)
}

/// Options of the card answering a `Read`
#[derive(Debug, Clone)]
pub struct CardProfile {
    pub card_id: &'static str,
    pub firmware: &'static str,
    pub mask: SettingsMask,
    pub wallets_count: u8,
    pub pause: u16,
    pub default_passcode: bool,
    pub card_public_key: Vec<u8>,
}

impl Default for CardProfile {
    fn default() -> Self {
        Self {
            card_id: CARD_ID,
            firmware: "4.52r",
            mask: SettingsMask::IS_REUSABLE
                | SettingsMask::ALLOW_SET_PIN1
                | SettingsMask::ALLOW_SET_PIN2
                | SettingsMask::ALLOW_SELECT_BLOCKCHAIN
                | SettingsMask::ALLOW_UNENCRYPTED,
            wallets_count: 3,
            pause: 0,
            default_passcode: true,
            card_public_key: vec![0x04; 65],
        }
    }
}

pub fn read_response(profile: &CardProfile) -> Bytes {
    let mut card_data = TlvBuilder::new();
    card_data.append(TlvTag::BatchId, "AC01").unwrap();
    card_data
        .append(TlvTag::ManufactureDateTime, &ManufactureDate::new(2022, 3, 14).unwrap())
        .unwrap();
    card_data.append(TlvTag::IssuerName, "TANGEM AG").unwrap();

    let mut builder = TlvBuilder::new();
    builder.append(TlvTag::CardId, profile.card_id).unwrap();
    builder.append(TlvTag::ManufacturerName, "TANGEM").unwrap();
    builder.append(TlvTag::Status, &CardStatus::Loaded).unwrap();
    builder.append(TlvTag::Firmware, profile.firmware).unwrap();
    builder.append(TlvTag::CardPublicKey, &profile.card_public_key).unwrap();
    builder.append(TlvTag::SettingsMask, &profile.mask).unwrap();
    builder.append(TlvTag::IssuerPublicKey, &[0x04u8; 65]).unwrap();
    builder.append(TlvTag::PauseBeforePin2, &profile.pause).unwrap();
    builder.append(TlvTag::WalletsCount, &profile.wallets_count).unwrap();
    builder.append(TlvTag::PinIsDefault, &true).unwrap();
    if profile.default_passcode {
        builder.append(TlvTag::Pin2IsDefault, &true).unwrap();
    }
    builder.append_raw(TlvTag::CardData, card_data.serialize());
    builder.serialize()
}

pub fn wallet_block(index: u8, public_key: &[u8]) -> Bytes {
    let mut builder = TlvBuilder::new();
    builder.append(TlvTag::Status, &WalletStatus::Loaded).unwrap();
    builder.append(TlvTag::WalletIndex, &index).unwrap();
    builder.append(TlvTag::CurveId, &EllipticCurve::Secp256k1).unwrap();
    builder.append(TlvTag::WalletPublicKey, public_key).unwrap();
    builder.append(TlvTag::WalletSignedHashes, &4u16).unwrap();
    builder.serialize()
}

pub fn empty_wallet_block(index: u8) -> Bytes {
    let mut builder = TlvBuilder::new();
    builder.append(TlvTag::Status, &WalletStatus::Empty).unwrap();
    builder.append(TlvTag::WalletIndex, &index).unwrap();
    builder.serialize()
}

/// `Read` answer in WalletsList mode carrying the given slot blocks
pub fn wallets_list_response(blocks: &[Bytes]) -> Bytes {
    let mut builder = TlvBuilder::new();
    builder.append(TlvTag::CardId, CARD_ID).unwrap();
    for block in blocks {
        builder.append_raw(TlvTag::CardWallet, block.clone());
    }
    builder.serialize()
}

/// `Read` answer in Wallet mode
pub fn wallet_response(index: u8, public_key: &[u8]) -> Bytes {
    let mut builder = TlvBuilder::new();
    builder.append(TlvTag::CardId, CARD_ID).unwrap();
    for tlv in Tlv::deserialize(&wallet_block(index, public_key)).unwrap() {
        builder.append_raw(tlv.tag, tlv.value);
    }
    builder.serialize()
}

/// Answer carrying only the card id, plus optional extra tags
pub fn card_id_response(extra: &[(TlvTag, &[u8])]) -> Bytes {
    let mut builder = TlvBuilder::new();
    builder.append(TlvTag::CardId, CARD_ID).unwrap();
    for (tag, value) in extra {
        builder.append_raw(*tag, value.to_vec());
    }
    builder.serialize()
}

/// Payload TLVs of a sent frame
pub fn payload(frame: &[u8]) -> Vec<Tlv> {
    if frame.len() <= 7 {
        return Vec::new();
    }
    Tlv::deserialize(&frame[7..]).unwrap()
}

pub fn find<'a>(tlvs: &'a [Tlv], tag: TlvTag) -> Option<&'a Tlv> {
    tlvs.iter().find(|tlv| tlv.tag == tag)
}

pub fn ins(instruction: Instruction) -> u8 {
    instruction.code()
}
