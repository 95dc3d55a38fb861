//! Offline HD wallet helpers

use colored::Colorize;
use tangem_sdk::card::EllipticCurve;
use tangem_sdk::hdwallet::{DerivationPath, EntropyLength, Mnemonic, NetworkType, make_master_key};

pub fn generate_mnemonic_command(words: usize) -> Result<(), Box<dyn std::error::Error>> {
    let length = EntropyLength::from_word_count(words)
        .ok_or_else(|| format!("Unsupported word count {}. Use 12, 15, 18, 21 or 24", words))?;
    let mnemonic = Mnemonic::generate(length)?;

    println!("{}", mnemonic.phrase());
    Ok(())
}

pub fn validate_mnemonic_command(phrase: &str) -> Result<(), Box<dyn std::error::Error>> {
    match Mnemonic::new(phrase) {
        Ok(mnemonic) => {
            println!("{} ({} words)", "Valid mnemonic".green(), mnemonic.words().len());
            Ok(())
        }
        Err(e) => Err(format!("Invalid mnemonic: {}", e).into()),
    }
}

/// Master key from the mnemonic, then public derivation along `path`
pub fn xpub_command(
    phrase: &str,
    passphrase: &str,
    curve: EllipticCurve,
    path: Option<&DerivationPath>,
    testnet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let seed = Mnemonic::new(phrase)?.to_seed(passphrase);
    let mut public_key = make_master_key(&seed, curve)?.public_key(curve)?;
    if let Some(path) = path {
        public_key = public_key.derive_path(path)?;
    }

    println!("Public key: {}", hex::encode(public_key.public_key()));
    println!("Chain code: {}", hex::encode(public_key.chain_code()));
    if curve == EllipticCurve::Secp256k1 {
        let network = if testnet {
            NetworkType::Testnet
        } else {
            NetworkType::Mainnet
        };
        println!("Extended key: {}", public_key.serialize(network)?);
    }
    Ok(())
}
