mod common;

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use common::*;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tangem_sdk::apdu::encryption::{decrypt_payload, encrypt_payload, protocol_key, session_key};
use tangem_sdk::apdu::{EncryptionMode, Instruction};
use tangem_sdk::card::FirmwareType;
use tangem_sdk::commands::{PreflightReadTask, PurgeWalletCommand};
use tangem_sdk::tlv::{TlvBuilder, TlvTag};
use tangem_sdk::tlv::Tlv;
use tangem_sdk::{
    CardReader, Config, InMemoryStorage, PreflightReadMode, SecureStorage, TangemSdkError, UserCodeType,
    WrongValueType,
};

fn scan(reader: &ScriptedReader, delegate: &RecordingDelegate, config: Config) -> tangem_sdk::Result<tangem_sdk::Card> {
    session(reader, delegate, config).start(&mut PreflightReadTask::new(PreflightReadMode::FullCardRead, None))
}

#[test]
fn full_read_collects_available_wallets() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    reader
        .respond(read_response(&CardProfile::default()), 0x9000)
        .respond(
            wallets_list_response(&[
                wallet_block(0, &[0x02; 33]),
                empty_wallet_block(1),
                wallet_block(2, &[0x03; 33]),
            ]),
            0x9000,
        );

    let card = scan(&reader, &delegate, Config::default()).unwrap();
    assert_eq!(card.card_id, CARD_ID);
    assert_eq!(card.batch_id, "AC01");
    assert_eq!(card.wallets.iter().map(|w| w.index).collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(card.is_passcode_set, Some(false));
    assert!(!card.is_access_code_set);

    assert_eq!(reader.instructions(), vec![ins(Instruction::Read); 2]);
    assert_eq!(reader.stopped(), vec![false]);
    assert_eq!(
        delegate.events(),
        vec![Event::Started, Event::TagConnected, Event::Dismissed]
    );
}

#[test]
fn wrong_card_number_stops_after_the_read() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    reader.respond(read_response(&CardProfile::default()), 0x9000);

    let config = Config::default().with_card_id("AF99001800554003");
    let result = session(&reader, &delegate, config).start(&mut PurgeWalletCommand::new(vec![0x02; 33]));

    assert_eq!(result, Err(TangemSdkError::WrongCardNumber("AF99001800554003".into())));
    assert_eq!(reader.sent().len(), 1);
    let events = delegate.events();
    assert!(events.contains(&Event::WrongCard(WrongValueType::CardId)));
    assert!(events.contains(&Event::Error(50005)));
    assert_eq!(events.last(), Some(&Event::Dismissed));
}

#[test]
fn disallowed_firmware_type_is_a_wrong_card() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    reader.respond(read_response(&CardProfile::default()), 0x9000);

    let config = Config::default().with_allowed_card_types(vec![FirmwareType::Sdk]);
    let result = session(&reader, &delegate, config).start(&mut PurgeWalletCommand::new(vec![0x02; 33]));

    assert_eq!(result, Err(TangemSdkError::WrongCardType));
    assert!(delegate.events().contains(&Event::WrongCard(WrongValueType::CardType)));
}

#[test]
fn lost_tag_is_waited_for_and_the_frame_resent() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    reader
        .fail(TangemSdkError::TagLost)
        .respond(read_response(&CardProfile::default()), 0x9000);

    let card = session(&reader, &delegate, Config::default())
        .start(&mut PreflightReadTask::new(PreflightReadMode::ReadCardOnly, None))
        .unwrap();

    assert_eq!(card.card_id, CARD_ID);
    let sent = reader.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert_eq!(
        delegate.events(),
        vec![
            Event::Started,
            Event::TagConnected,
            Event::TagLost,
            Event::TagConnected,
            Event::Dismissed
        ]
    );
}

#[test]
fn security_delay_is_reported_until_the_card_answers() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    let mut pause = TlvBuilder::new();
    pause.append(TlvTag::Pause, &150u16).unwrap();
    reader
        .respond(pause.serialize(), 0x9789)
        .respond(pause.serialize(), 0x9789)
        .respond(read_response(&CardProfile::default()), 0x9000);

    session(&reader, &delegate, Config::default())
        .start(&mut PreflightReadTask::new(PreflightReadMode::ReadCardOnly, None))
        .unwrap();

    let delays: Vec<_> = delegate
        .events()
        .into_iter()
        .filter(|event| matches!(event, Event::SecurityDelay(..)))
        .collect();
    assert_eq!(delays, vec![Event::SecurityDelay(1500, 0); 2]);
    assert_eq!(reader.sent().len(), 3);
}

#[test]
fn refused_access_code_is_requested_and_retried() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::with_codes(&["123456"]);
    reader
        .respond(b"", 0x6A86)
        .respond(read_response(&CardProfile::default()), 0x9000);

    session(&reader, &delegate, Config::default())
        .start(&mut PreflightReadTask::new(PreflightReadMode::ReadCardOnly, None))
        .unwrap();

    assert!(delegate.events().contains(&Event::CodeRequested(UserCodeType::AccessCode, true)));
    let retried = payload(&reader.sent()[1]);
    let pin = find(&retried, TlvTag::Pin).unwrap();
    assert_eq!(&pin.value[..], Sha256::digest(b"123456").as_slice());
}

#[test]
fn declined_prompt_cancels_the_session() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    reader.respond(b"", 0x6A86);

    let result = session(&reader, &delegate, Config::default())
        .start(&mut PreflightReadTask::new(PreflightReadMode::ReadCardOnly, None));

    assert_eq!(result, Err(TangemSdkError::UserCancelled));
    assert_eq!(reader.stopped(), vec![true]);
    assert!(!delegate.events().iter().any(|event| matches!(event, Event::Error(_))));
}

#[test]
fn saved_access_code_is_used_by_the_next_session() {
    let storage: Arc<dyn SecureStorage> = Arc::new(InMemoryStorage::new());
    let config = Config::default().with_save_access_codes(true);

    let reader = ScriptedReader::default();
    reader
        .respond(b"", 0x6A86)
        .respond(read_response(&CardProfile::default()), 0x9000);
    session(&reader, &RecordingDelegate::with_codes(&["654321"]), config.clone())
        .with_storage(storage.clone())
        .start(&mut PreflightReadTask::new(PreflightReadMode::ReadCardOnly, None))
        .unwrap();

    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    reader.respond(read_response(&CardProfile::default()), 0x9000);
    session(&reader, &delegate, config.with_card_id(CARD_ID))
        .with_storage(storage)
        .start(&mut PreflightReadTask::new(PreflightReadMode::ReadCardOnly, Some(CARD_ID.into())))
        .unwrap();

    let first = payload(&reader.sent()[0]);
    assert_eq!(
        &find(&first, TlvTag::Pin).unwrap().value[..],
        Sha256::digest(b"654321").as_slice()
    );
    assert!(!delegate
        .events()
        .iter()
        .any(|event| matches!(event, Event::CodeRequested(..))));
}

const UID: [u8; 4] = [0x0A, 0x0B, 0x0C, 0x0D];
const KEY_B: [u8; 16] = [0x22; 16];

#[derive(Debug, Default)]
struct FastCardState {
    key: Option<Vec<u8>>,
    answers: VecDeque<Bytes>,
    received: Vec<(u8, Vec<u8>)>,
}

/// Card side of a fast-encrypted session: agrees on a key, then decrypts
/// every command and encrypts the queued plaintext answers
#[derive(Debug, Clone, Default)]
struct FastEncryptingCard {
    state: Arc<Mutex<FastCardState>>,
}

impl FastEncryptingCard {
    fn answer(&self, plaintext: impl Into<Bytes>) -> &Self {
        self.state.lock().answers.push_back(plaintext.into());
        self
    }

    /// Instruction and decrypted payload of every encrypted command
    fn received(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.lock().received.clone()
    }
}

impl CardReader for FastEncryptingCard {
    fn start_session(&mut self) -> tangem_sdk::Result<()> {
        Ok(())
    }

    fn stop_session(&mut self, _cancelled: bool) {}

    fn transceive_raw(&mut self, command: &[u8]) -> tangem_sdk::Result<Bytes> {
        let mut state = self.state.lock();
        let ok = 0x9000u16.to_be_bytes();

        if command[1] == ins(Instruction::OpenSession) {
            assert_eq!(command[2], EncryptionMode::Fast.code());
            let tlvs = Tlv::deserialize(&command[7..]).unwrap();
            let key_a = &find(&tlvs, TlvTag::SessionKeyA).unwrap().value;
            let secret = [key_a.as_ref(), KEY_B.as_slice()].concat();
            let access_code = Sha256::digest(b"000000");
            state.key = Some(session_key(&secret, &protocol_key(&access_code, &UID)).to_vec());

            let mut builder = TlvBuilder::new();
            builder
                .append(TlvTag::SessionKeyB, &KEY_B)
                .unwrap()
                .append(TlvTag::Uid, &UID)
                .unwrap();
            return Ok([builder.serialize().as_ref(), ok.as_slice()].concat().into());
        }

        let key = state.key.clone().expect("command before OpenSession");
        assert_eq!(command[2], EncryptionMode::Fast.code());
        let plain = decrypt_payload(&command[7..], &key).unwrap();
        state.received.push((command[1], plain));

        let answer = state.answers.pop_front().unwrap_or_default();
        let encrypted = encrypt_payload(&answer, &key).unwrap();
        Ok([encrypted.as_slice(), ok.as_slice()].concat().into())
    }
}

#[test]
fn fast_encrypted_session_decrypts_single_block_answers() {
    let card = FastEncryptingCard::default();
    card.answer(read_response(&CardProfile::default()))
        .answer(wallets_list_response(&[
            wallet_block(0, &[0x02; 33]),
            empty_wallet_block(1),
            empty_wallet_block(2),
        ]))
        .answer(card_id_response(&[]));
    // A bare card id answer fits in one AES block
    assert_eq!(encrypt_payload(&card_id_response(&[]), &[0u8; 32]).unwrap().len(), 16);

    let config = Config::default().with_encryption_mode(EncryptionMode::Fast);
    let response = tangem_sdk::CardSession::new(
        Box::new(card.clone()),
        Box::new(RecordingDelegate::default()),
        config,
    )
    .start(&mut PurgeWalletCommand::new(vec![0x02; 33]))
    .unwrap();

    assert_eq!(response.card_id, CARD_ID);
    let received = card.received();
    assert_eq!(
        received.iter().map(|(ins, _)| *ins).collect::<Vec<_>>(),
        vec![ins(Instruction::Read), ins(Instruction::Read), ins(Instruction::PurgeWallet)]
    );
    let purge = Tlv::deserialize(&received[2].1).unwrap();
    assert_eq!(&find(&purge, TlvTag::WalletIndex).unwrap().value[..], &[0]);
}
