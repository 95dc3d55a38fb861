mod common;

use bytes::Bytes;
use common::*;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};
use tangem_sdk::apdu::Instruction;
use tangem_sdk::apdu::encryption::{decrypt_payload, encrypt_payload};
use tangem_sdk::card::{CardStatus, EllipticCurve, SettingsMask};
use tangem_sdk::commands::{
    AttestCardKeyCommand, CreateWalletTask, DeleteFilesTask, FileToWrite, PersonalizeCommand, PurgeWalletCommand,
    ReadFilesTask, SignCommand, SignHashCommand, WriteFilesTask,
};
use tangem_sdk::personalization::{CardConfig, Issuer, Manufacturer, development_key};
use tangem_sdk::tlv::{Tlv, TlvBuilder, TlvDecoder, TlvTag};
use tangem_sdk::{Config, JsonRpcLinker, TangemSdkError};

const WALLET: [u8; 33] = [0x02; 33];

/// Read plus a one-page wallet list with `WALLET` in slot 0
fn script_preflight(reader: &ScriptedReader, profile: &CardProfile) {
    reader.respond(read_response(profile), 0x9000).respond(
        wallets_list_response(&[wallet_block(0, &WALLET), empty_wallet_block(1), empty_wallet_block(2)]),
        0x9000,
    );
}

#[test]
fn sign_pre_check_failure_sends_no_sign_frame() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    reader
        .respond(read_response(&CardProfile::default()), 0x9000)
        .respond(wallet_response(0, &WALLET), 0x9000);

    let mut command =
        SignHashCommand::new(vec![0xAB; 32], WALLET.to_vec()).with_derivation_path("m/44'/0'/0'/0/0".parse().unwrap());
    let result = session(&reader, &delegate, Config::default()).start(&mut command);

    assert_eq!(result, Err(TangemSdkError::HdWalletDisabled));
    assert_eq!(reader.instructions(), vec![ins(Instruction::Read); 2]);
}

#[test]
fn exhausted_wallet_sends_no_sign_frame() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    let profile = CardProfile {
        firmware: "3.34r",
        ..CardProfile::default()
    };
    let mut wallet = TlvBuilder::new();
    wallet
        .append(TlvTag::CurveId, &EllipticCurve::Secp256k1)
        .unwrap()
        .append(TlvTag::WalletPublicKey, &WALLET)
        .unwrap()
        .append(TlvTag::WalletRemainingSignatures, &0u16)
        .unwrap();
    reader.respond([read_response(&profile), wallet.serialize()].concat(), 0x9000);

    let result = session(&reader, &delegate, Config::default())
        .start(&mut SignHashCommand::new(vec![0xAB; 32], WALLET.to_vec()));

    assert_eq!(result, Err(TangemSdkError::NoRemainingSignatures));
    assert_eq!(reader.instructions(), vec![ins(Instruction::Read)]);
    assert!(!delegate.events().iter().any(|event| matches!(event, Event::CodeRequested(..))));
}

#[test]
fn sign_splits_the_signature_blob() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    let mut blob = vec![0x11; 64];
    blob.extend_from_slice(&[0x22; 64]);
    reader
        .respond(read_response(&CardProfile::default()), 0x9000)
        .respond(wallet_response(0, &WALLET), 0x9000)
        .respond(
            card_id_response(&[(TlvTag::WalletSignature, &blob), (TlvTag::WalletSignedHashes, &[0x00, 0x06])]),
            0x9000,
        );

    let response = session(&reader, &delegate, Config::default())
        .start(&mut SignCommand::new(&[vec![0x01; 32], vec![0x02; 32]], WALLET.to_vec()))
        .unwrap();

    assert_eq!(response.signatures, vec![vec![0x11; 64], vec![0x22; 64]]);
    assert_eq!(response.total_signed_hashes, Some(6));

    let sent = reader.sent();
    assert_eq!(sent[2][1], ins(Instruction::Sign));
    let tlvs = payload(&sent[2]);
    assert_eq!(&find(&tlvs, TlvTag::TransactionOutHashSize).unwrap().value[..], &[32]);
    assert_eq!(find(&tlvs, TlvTag::TransactionOutHash).unwrap().value.len(), 64);
    assert_eq!(
        &find(&tlvs, TlvTag::Pin2).unwrap().value[..],
        Sha256::digest(b"000").as_slice()
    );
}

#[test]
fn high_s_signature_comes_back_canonized() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    let mut high = vec![0x33; 32];
    high.extend(hex::decode("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364140").unwrap());
    reader
        .respond(read_response(&CardProfile::default()), 0x9000)
        .respond(wallet_response(0, &WALLET), 0x9000)
        .respond(card_id_response(&[(TlvTag::WalletSignature, &high)]), 0x9000);

    let response = session(&reader, &delegate, Config::default())
        .start(&mut SignHashCommand::new(vec![0x01; 32], WALLET.to_vec()))
        .unwrap();

    assert_eq!(&response.signature[..32], &[0x33; 32]);
    let mut low_s = [0u8; 32];
    low_s[31] = 0x01;
    assert_eq!(&response.signature[32..], &low_s);
}

#[test]
fn unconfirmed_wallet_creation_is_recovered_by_a_rescan() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    script_preflight(&reader, &CardProfile::default());
    reader.respond(b"", 0x6985).respond(
        wallets_list_response(&[wallet_block(0, &WALLET), wallet_block(1, &[0x03; 33]), empty_wallet_block(2)]),
        0x9000,
    );

    let response = session(&reader, &delegate, Config::default())
        .start(&mut CreateWalletTask::new(EllipticCurve::Secp256k1, false))
        .unwrap();

    assert_eq!(response.card_id, CARD_ID);
    assert_eq!(response.wallet.index, 1);
    assert_eq!(response.wallet.public_key, vec![0x03; 33]);
    assert_eq!(
        reader.instructions(),
        vec![
            ins(Instruction::Read),
            ins(Instruction::Read),
            ins(Instruction::CreateWallet),
            ins(Instruction::Read),
        ]
    );
    let create = payload(&reader.sent()[2]);
    assert_eq!(&find(&create, TlvTag::WalletIndex).unwrap().value[..], &[1]);
}

#[test]
fn second_wallet_with_default_passcode_is_already_created() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    script_preflight(&reader, &CardProfile::default());
    reader.respond(b"", 0x6A86);

    let result = session(&reader, &delegate, Config::default())
        .start(&mut CreateWalletTask::new(EllipticCurve::Secp256k1, false));

    assert_eq!(result, Err(TangemSdkError::AlreadyCreated));
    assert!(delegate.events().contains(&Event::Error(40501)));
}

#[test]
fn create_wallet_requires_select_blockchain() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    let profile = CardProfile {
        mask: SettingsMask::IS_REUSABLE,
        ..CardProfile::default()
    };
    script_preflight(&reader, &profile);

    let result = session(&reader, &delegate, Config::default())
        .start(&mut CreateWalletTask::new(EllipticCurve::Secp256k1, false));

    assert_eq!(result, Err(TangemSdkError::WalletCannotBeCreated));
    assert_eq!(reader.sent().len(), 2);
}

#[test]
fn purge_wallet_drops_the_wallet() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    script_preflight(&reader, &CardProfile::default());
    reader.respond(card_id_response(&[]), 0x9000);

    let response = session(&reader, &delegate, Config::default())
        .start(&mut PurgeWalletCommand::new(WALLET.to_vec()))
        .unwrap();

    assert_eq!(response.card_id, CARD_ID);
    let purge = payload(&reader.sent()[2]);
    assert_eq!(&find(&purge, TlvTag::WalletIndex).unwrap().value[..], &[0]);
    assert!(find(&purge, TlvTag::Pin2).is_some());
}

#[test]
fn write_file_walks_initiate_parts_and_confirm() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    script_preflight(&reader, &CardProfile::default());
    reader
        .respond(card_id_response(&[(TlvTag::FileIndex, &[5])]), 0x9000)
        .respond(card_id_response(&[]), 0x9000)
        .respond(card_id_response(&[]), 0x9000)
        .respond(card_id_response(&[]), 0x9000);

    let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
    let file = FileToWrite {
        data: data.clone(),
        file_visibility: None,
        wallet_public_key: Some(WALLET.to_vec()),
    };
    let response = session(&reader, &delegate, Config::default())
        .start(&mut WriteFilesTask::new(vec![file]))
        .unwrap();

    assert_eq!(response.files_indices, vec![5]);
    let sent = reader.sent();
    assert_eq!(sent.len(), 6);
    assert!(sent[2..].iter().all(|frame| frame[1] == ins(Instruction::WriteFileData)));

    let initiate = payload(&sent[2]);
    assert_eq!(&find(&initiate, TlvTag::Size).unwrap().value[..], &[0x03, 0xE8]);
    assert_eq!(&find(&initiate, TlvTag::WalletIndex).unwrap().value[..], &[0]);

    let second_part = payload(&sent[4]);
    assert_eq!(&find(&second_part, TlvTag::Offset).unwrap().value[..], &[0x03, 0x84]);
    assert_eq!(&find(&second_part, TlvTag::IssuerData).unwrap().value[..], &data[900..]);
    assert_eq!(&find(&second_part, TlvTag::FileIndex).unwrap().value[..], &[5]);

    let confirm = payload(&sent[5]);
    assert_eq!(
        &find(&confirm, TlvTag::CodeHash).unwrap().value[..],
        Sha256::digest(&data).as_slice()
    );

    let delays: Vec<_> = delegate
        .events()
        .into_iter()
        .filter(|event| matches!(event, Event::Delay(..)))
        .collect();
    assert_eq!(delays, vec![Event::Delay(1000, 0), Event::Delay(1000, 900)]);
}

#[test]
fn replay_protected_card_refuses_overwrite() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    let profile = CardProfile {
        mask: CardProfile::default().mask | SettingsMask::PROTECT_ISSUER_DATA_AGAINST_REPLAY,
        ..CardProfile::default()
    };
    script_preflight(&reader, &profile);
    reader.respond(b"", 0x6985);

    let result = session(&reader, &delegate, Config::default()).start(&mut WriteFilesTask::new(vec![FileToWrite {
        data: vec![0xAA; 10],
        file_visibility: None,
        wallet_public_key: None,
    }]));

    assert_eq!(result, Err(TangemSdkError::OverwritingDataIsProhibited));
}

#[test]
fn read_files_gathers_parts_until_the_card_runs_out() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    script_preflight(&reader, &CardProfile::default());
    let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
    reader
        .respond(
            card_id_response(&[
                (TlvTag::Size, &[0x03, 0xE8]),
                (TlvTag::IssuerData, &data[..900]),
                (TlvTag::FileIndex, &[0]),
                (TlvTag::FileSettings, &[0x01]),
            ]),
            0x9000,
        )
        .respond(
            card_id_response(&[(TlvTag::IssuerData, &data[900..]), (TlvTag::FileIndex, &[0])]),
            0x9000,
        )
        .respond(b"", 0x6A82);

    let response = session(&reader, &delegate, Config::default())
        .start(&mut ReadFilesTask::new(false))
        .unwrap();

    assert_eq!(response.files.len(), 1);
    assert_eq!(response.files[0].file_data, data);
    assert_eq!(response.files[0].file_index, 0);
    assert!(response.files[0].file_settings.is_some());

    let sent = reader.sent();
    assert_eq!(sent.len(), 5);
    assert!(sent[2..].iter().all(|frame| frame[1] == ins(Instruction::ReadFileData)));
    let second_part = payload(&sent[3]);
    assert_eq!(&find(&second_part, TlvTag::Offset).unwrap().value[..], &[0x03, 0x84]);
    assert!(find(&second_part, TlvTag::Pin2).is_none());
    let next_file = payload(&sent[4]);
    assert_eq!(&find(&next_file, TlvTag::FileIndex).unwrap().value[..], &[1]);
    assert_eq!(&find(&next_file, TlvTag::Offset).unwrap().value[..], &[0x00, 0x00]);
}

#[test]
fn stalled_file_read_is_an_invalid_response() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    script_preflight(&reader, &CardProfile::default());
    reader
        .respond(
            card_id_response(&[(TlvTag::Size, &[0x00, 0x10]), (TlvTag::IssuerData, &[0xAA; 4])]),
            0x9000,
        )
        .respond(card_id_response(&[]), 0x9000);

    let result = session(&reader, &delegate, Config::default()).start(&mut ReadFilesTask::new(false));
    assert_eq!(result, Err(TangemSdkError::InvalidResponse));
}

#[test]
fn delete_all_files_stops_when_the_card_refuses() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    script_preflight(&reader, &CardProfile::default());
    reader
        .respond(card_id_response(&[]), 0x9000)
        .respond(card_id_response(&[]), 0x9000)
        .respond(b"", 0x6286);

    let response = session(&reader, &delegate, Config::default())
        .start(&mut DeleteFilesTask::new(None))
        .unwrap();

    assert_eq!(response.card_id, CARD_ID);
    let sent = reader.sent();
    assert_eq!(sent.len(), 5);
    for frame in &sent[2..] {
        assert_eq!(frame[1], ins(Instruction::WriteFileData));
        let tlvs = payload(frame);
        assert_eq!(&find(&tlvs, TlvTag::InteractionMode).unwrap().value[..], &[0x05]);
        assert_eq!(&find(&tlvs, TlvTag::FileIndex).unwrap().value[..], &[0]);
    }
}

#[test]
fn listed_files_are_deleted_from_the_top() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    script_preflight(&reader, &CardProfile::default());
    reader
        .respond(card_id_response(&[]), 0x9000)
        .respond(card_id_response(&[]), 0x9000);

    session(&reader, &delegate, Config::default())
        .start(&mut DeleteFilesTask::new(Some(vec![0, 2])))
        .unwrap();

    let indices: Vec<u8> = reader.sent()[2..]
        .iter()
        .map(|frame| find(&payload(frame), TlvTag::FileIndex).unwrap().value[0])
        .collect();
    assert_eq!(indices, vec![2, 0]);
}

fn attestation(key: &SigningKey, challenge: &[u8], salt: &[u8]) -> Bytes {
    let signature: Signature = key.sign(&[challenge, salt].concat());
    let signature = signature.to_bytes();
    card_id_response(&[(TlvTag::Salt, salt), (TlvTag::CardSignature, signature.as_slice())])
}

#[test]
fn attest_card_key_checks_the_card_signature() {
    let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
    let profile = CardProfile {
        card_public_key: key.verifying_key().to_encoded_point(false).as_bytes().to_vec(),
        ..CardProfile::default()
    };
    let challenge = vec![0x01; 16];

    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    script_preflight(&reader, &profile);
    reader.respond(attestation(&key, &challenge, &[0x02; 16]), 0x9000);
    let response = session(&reader, &delegate, Config::default())
        .start(&mut AttestCardKeyCommand::new(Some(challenge.clone())))
        .unwrap();
    assert_eq!(response.salt, vec![0x02; 16]);
    assert_eq!(response.challenge, challenge);
    let sent = reader.sent();
    assert_eq!(sent[2][1], ins(Instruction::AttestCardKey));
    assert_eq!(&find(&payload(&sent[2]), TlvTag::Challenge).unwrap().value[..], &challenge[..]);

    let impostor = SigningKey::from_slice(&[0x43; 32]).unwrap();
    let reader = ScriptedReader::default();
    script_preflight(&reader, &profile);
    reader.respond(attestation(&impostor, &challenge, &[0x02; 16]), 0x9000);
    let result = session(&reader, &delegate, Config::default())
        .start(&mut AttestCardKeyCommand::new(Some(challenge)));
    assert_eq!(result, Err(TangemSdkError::CardVerificationFailed));
}

fn personalize_config() -> CardConfig {
    serde_json::from_str(
        r#"{
            "series": "BB",
            "startNumber": 300000000000,
            "count": 1,
            "PIN": "000000",
            "PIN2": "000",
            "CVC": "000",
            "pauseBeforePIN2": 5000,
            "smartSecurityDelay": false,
            "useActivation": false,
            "useBlock": false,
            "skipSecurityDelayIfValidatedByIssuer": false,
            "skipSecurityDelayIfValidatedByLinkedTerminal": false,
            "curveID": "secp256k1",
            "SigningMethod": 0,
            "isReusable": true,
            "allowSwapPIN": true,
            "allowSwapPIN2": true,
            "useCVC": false,
            "useNDEF": true,
            "useDynamicNDEF": false,
            "forbidPurgeWallet": false,
            "protocolAllowUnencrypted": true,
            "protocolAllowStaticEncryption": true,
            "forbidDefaultPIN": false,
            "disablePrecomputedNDEF": false,
            "skipCheckPIN2andCVCIfValidatedByIssuer": false,
            "allowSelectBlockchain": true,
            "createWallet": 0,
            "walletsCount": 4,
            "cardData": {
                "date": {"year": 2021, "month": 6, "day": 1},
                "batch": "FFFF",
                "blockchain": "ANY",
                "product_note": true
            },
            "NDEF": []
        }"#,
    )
    .unwrap()
}

#[test]
fn personalize_runs_under_the_development_key() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    let key = development_key();

    let mut blank = TlvBuilder::new();
    blank.append(TlvTag::CardId, "BB03000000000004").unwrap();
    blank.append(TlvTag::Status, &CardStatus::NotPersonalized).unwrap();
    let personalized = read_response(&CardProfile {
        card_id: "BB03000000000004",
        ..CardProfile::default()
    });
    reader
        .respond(blank.serialize(), 0x9000)
        .respond(encrypt_payload(&personalized, &key).unwrap(), 0x9000);

    let card = session(&reader, &delegate, Config::default())
        .start(&mut PersonalizeCommand::new(
            personalize_config(),
            Issuer::development(),
            Manufacturer::development(),
        ))
        .unwrap();
    assert_eq!(card.card_id, "BB03000000000004");

    let sent = reader.sent();
    assert_eq!(sent[1][1], ins(Instruction::Personalize));
    assert_eq!(sent[1][2], 0x00);
    let plain = decrypt_payload(&sent[1][7..], &key).unwrap();
    let decoder = TlvDecoder::new(Tlv::deserialize(&plain).unwrap());
    assert_eq!(decoder.decode::<String>(TlvTag::CardId).unwrap(), "BB03000000000004");
    assert_eq!(decoder.decode::<u8>(TlvTag::WalletsCount).unwrap(), 4);
}

#[test]
fn personalized_card_is_refused() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    reader.respond(read_response(&CardProfile::default()), 0x9000);

    let result = session(&reader, &delegate, Config::default()).start(&mut PersonalizeCommand::new(
        personalize_config(),
        Issuer::development(),
        Manufacturer::development(),
    ));

    assert_eq!(result, Err(TangemSdkError::AlreadyPersonalized));
    assert_eq!(reader.sent().len(), 1);
}

#[test]
fn jsonrpc_sign_hash_over_a_session() {
    let reader = ScriptedReader::default();
    let delegate = RecordingDelegate::default();
    reader
        .respond(read_response(&CardProfile::default()), 0x9000)
        .respond(wallet_response(0, &WALLET), 0x9000)
        .respond(card_id_response(&[(TlvTag::WalletSignature, &[0x44; 64])]), 0x9000);

    let request = format!(
        r#"{{"jsonrpc": "2.0", "id": 9, "method": "SIGN_HASH",
            "params": {{"hash": "{}", "walletPublicKey": "{}"}}}}"#,
        hex::encode([0xEE; 32]),
        hex::encode(WALLET),
    );
    let mut session = session(&reader, &delegate, Config::default());
    let output = JsonRpcLinker::new(&mut session).handle(&request);
    let response: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(response["id"], 9);
    assert_eq!(response["result"]["cardId"], CARD_ID);
    assert_eq!(response["result"]["signature"], hex::encode_upper([0x44; 64]));
}
