use std::path::PathBuf;

use clap::Subcommand;
use tangem_sdk::Config;
use tangem_sdk::card::EllipticCurve;
use tangem_sdk::hdwallet::DerivationPath;

mod card_operations;
mod credentials;
mod jsonrpc;
mod wallet;

pub use card_operations::*;
pub use credentials::*;
pub use jsonrpc::*;
pub use wallet::*;

use crate::utils::{reader, session};

/// Define subcommands for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// List available readers
    List,

    /// Read the card and all of its wallets
    Scan,

    /// Create a wallet in the first free slot
    CreateWallet {
        /// Curve of the new wallet
        #[arg(long, default_value = "secp256k1")]
        curve: EllipticCurve,

        /// The wallet can never be purged
        #[arg(long)]
        permanent: bool,
    },

    /// Purge a wallet
    PurgeWallet {
        /// Public key of the wallet, as a hex string
        #[arg(required = true)]
        wallet_public_key: String,
    },

    /// Sign one or more hashes with a wallet
    Sign {
        /// Public key of the signing wallet, as a hex string
        #[arg(required = true)]
        wallet_public_key: String,

        /// Hashes to sign, as hex strings of equal length
        #[arg(required = true, num_args = 1..)]
        hashes: Vec<String>,

        /// Optional key derivation path (HD wallets only)
        #[arg(long)]
        path: Option<DerivationPath>,
    },

    /// Change the access code
    SetAccessCode {
        /// New access code (prompted for if not specified)
        #[arg(long)]
        code: Option<String>,
    },

    /// Change the passcode
    SetPasscode {
        /// New passcode (prompted for if not specified)
        #[arg(long)]
        code: Option<String>,
    },

    /// Reset both user codes to their factory values
    ResetCodes,

    /// Write a file to the card
    WriteFile {
        /// File to upload
        #[arg(required = true)]
        file: PathBuf,

        /// Link the file to the wallet with this public key
        #[arg(long)]
        wallet_public_key: Option<String>,
    },

    /// Read files from the card
    ReadFiles {
        /// Indices to read; every file when omitted
        indices: Vec<u8>,

        /// Include private files (asks for the passcode)
        #[arg(long)]
        private: bool,
    },

    /// Delete files from the card
    DeleteFiles {
        /// Indices to delete; every file when omitted
        indices: Vec<u8>,
    },

    /// Check that the card holds the private half of its card key
    Attest,

    /// Erase the personalization of a development card
    Depersonalize,

    /// Run a JSON-RPC request against the card (reads stdin when omitted)
    Jsonrpc {
        /// Request, or a batch of requests, as JSON
        request: Option<String>,
    },

    /// Generate or validate a BIP39 mnemonic
    #[command(subcommand)]
    Mnemonic(MnemonicCommand),

    /// Derive an extended public key from a mnemonic
    Xpub {
        /// Mnemonic phrase
        #[arg(long, required = true)]
        mnemonic: String,

        /// Optional BIP39 passphrase
        #[arg(long, default_value = "")]
        passphrase: String,

        /// Curve of the master key
        #[arg(long, default_value = "secp256k1")]
        curve: EllipticCurve,

        /// Non-hardened derivation path applied to the master public key
        #[arg(long)]
        path: Option<DerivationPath>,

        /// Serialize for testnet
        #[arg(long)]
        testnet: bool,
    },
}

#[derive(Subcommand)]
pub enum MnemonicCommand {
    /// Generate a new random mnemonic
    Generate {
        /// Number of words: 12, 15, 18, 21 or 24
        #[arg(long, default_value_t = 12)]
        words: usize,
    },

    /// Check a mnemonic phrase
    Validate {
        /// Mnemonic phrase
        #[arg(required = true)]
        phrase: String,
    },
}

/// Run a parsed command. Only commands that talk to a card open a reader.
pub fn run(
    command: Commands,
    reader_name: Option<&str>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List => return reader::list_readers(),
        Commands::Mnemonic(MnemonicCommand::Generate { words }) => return generate_mnemonic_command(words),
        Commands::Mnemonic(MnemonicCommand::Validate { phrase }) => return validate_mnemonic_command(&phrase),
        Commands::Xpub {
            mnemonic,
            passphrase,
            curve,
            path,
            testnet,
        } => return xpub_command(&mnemonic, &passphrase, curve, path.as_ref(), testnet),
        _ => {}
    }

    let mut card_session = session::open_session(reader_name, config)?;

    match command {
        Commands::Scan => scan_command(&mut card_session),
        Commands::CreateWallet { curve, permanent } => create_wallet_command(&mut card_session, curve, permanent),
        Commands::PurgeWallet { wallet_public_key } => purge_wallet_command(&mut card_session, &wallet_public_key),
        Commands::Sign {
            wallet_public_key,
            hashes,
            path,
        } => sign_command(&mut card_session, &wallet_public_key, &hashes, path),
        Commands::SetAccessCode { code } => set_access_code_command(&mut card_session, code.as_deref()),
        Commands::SetPasscode { code } => set_passcode_command(&mut card_session, code.as_deref()),
        Commands::ResetCodes => reset_codes_command(&mut card_session),
        Commands::WriteFile {
            file,
            wallet_public_key,
        } => write_file_command(&mut card_session, &file, wallet_public_key.as_deref()),
        Commands::ReadFiles { indices, private } => read_files_command(&mut card_session, indices, private),
        Commands::DeleteFiles { indices } => delete_files_command(&mut card_session, indices),
        Commands::Attest => attest_command(&mut card_session),
        Commands::Depersonalize => depersonalize_command(&mut card_session),
        Commands::Jsonrpc { request } => jsonrpc_command(&mut card_session, request),
        Commands::List | Commands::Mnemonic(_) | Commands::Xpub { .. } => Ok(()),
    }
}
