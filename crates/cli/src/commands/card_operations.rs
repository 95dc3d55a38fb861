//! Wallet and file operations

use std::path::Path;

use colored::Colorize;
use tangem_sdk::CardSession;
use tangem_sdk::PreflightReadMode;
use tangem_sdk::card::EllipticCurve;
use tangem_sdk::commands::{
    AttestCardKeyCommand, CreateWalletTask, DeleteFilesTask, DepersonalizeCommand, FileToWrite, PreflightReadTask,
    PurgeWalletCommand, ReadFilesTask, SignCommand, SignHashCommand, WriteFilesTask,
};
use tangem_sdk::hdwallet::DerivationPath;
use tracing::info;

use crate::utils::{parse_hex, print_json};

/// Read the card with every wallet
pub fn scan_command(session: &mut CardSession) -> Result<(), Box<dyn std::error::Error>> {
    let card = session.start(&mut PreflightReadTask::new(PreflightReadMode::FullCardRead, None))?;

    println!("{} {}", "Card".green().bold(), card.card_id);
    println!("  Firmware: {}", card.firmware_version);
    println!("  Wallets: {}", card.wallets.len());
    print_json(&card)
}

pub fn create_wallet_command(
    session: &mut CardSession,
    curve: EllipticCurve,
    permanent: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Creating a {} wallet", curve);
    let response = session.start(&mut CreateWalletTask::new(curve, permanent))?;

    println!(
        "Wallet #{} created: {}",
        response.wallet.index,
        hex::encode(&response.wallet.public_key)
    );
    Ok(())
}

pub fn purge_wallet_command(
    session: &mut CardSession,
    wallet_public_key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let public_key = parse_hex(wallet_public_key)?;
    let response = session.start(&mut PurgeWalletCommand::new(public_key))?;

    println!("Wallet purged on card {}", response.card_id);
    Ok(())
}

/// Sign with `SignHash` for a single hash and `Sign` for a batch
pub fn sign_command(
    session: &mut CardSession,
    wallet_public_key: &str,
    hashes: &[String],
    path: Option<DerivationPath>,
) -> Result<(), Box<dyn std::error::Error>> {
    let public_key = parse_hex(wallet_public_key)?;
    let hashes = hashes
        .iter()
        .map(|hash| parse_hex(hash))
        .collect::<Result<Vec<_>, _>>()?;

    if let [hash] = hashes.as_slice() {
        let mut command = SignHashCommand::new(hash.clone(), public_key);
        if let Some(path) = path {
            command = command.with_derivation_path(path);
        }
        let response = session.start(&mut command)?;
        println!("Signature: {}", hex::encode(&response.signature));
        return Ok(());
    }

    let mut command = SignCommand::new(&hashes, public_key);
    if let Some(path) = path {
        command = command.with_derivation_path(path);
    }
    let response = session.start(&mut command)?;
    for (index, signature) in response.signatures.iter().enumerate() {
        println!("Signature {}: {}", index, hex::encode(signature));
    }
    if let Some(total) = response.total_signed_hashes {
        println!("Total signed hashes: {}", total);
    }
    Ok(())
}

pub fn write_file_command(
    session: &mut CardSession,
    file: &Path,
    wallet_public_key: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(file)?;
    let wallet_public_key = wallet_public_key.map(parse_hex).transpose()?;
    info!("Uploading {} bytes from {}", data.len(), file.display());

    let response = session.start(&mut WriteFilesTask::new(vec![FileToWrite {
        data,
        file_visibility: None,
        wallet_public_key,
    }]))?;

    println!("File written at index {:?}", response.files_indices);
    Ok(())
}

pub fn read_files_command(
    session: &mut CardSession,
    indices: Vec<u8>,
    private: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = session.start(&mut ReadFilesTask::new(private).with_indices(indices))?;

    if response.files.is_empty() {
        println!("No files");
    }
    for file in &response.files {
        let visibility = file
            .file_settings
            .map_or_else(|| "unknown".to_owned(), |settings| format!("{:?}", settings.visibility));
        println!(
            "{} #{} ({} bytes, {})",
            "File".green().bold(),
            file.file_index,
            file.file_data.len(),
            visibility
        );
        println!("  {}", hex::encode(&file.file_data));
    }
    Ok(())
}

pub fn delete_files_command(session: &mut CardSession, indices: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
    let indices = (!indices.is_empty()).then_some(indices);
    let response = session.start(&mut DeleteFilesTask::new(indices))?;

    println!("Files deleted on card {}", response.card_id);
    Ok(())
}

pub fn attest_command(session: &mut CardSession) -> Result<(), Box<dyn std::error::Error>> {
    let response = session.start(&mut AttestCardKeyCommand::default())?;

    println!("{} card key of {}", "Attested".green().bold(), response.card_id);
    Ok(())
}

pub fn depersonalize_command(session: &mut CardSession) -> Result<(), Box<dyn std::error::Error>> {
    let response = session.start(&mut DepersonalizeCommand::new())?;
    print_json(&response)
}
