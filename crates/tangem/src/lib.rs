//! Protocol engine for Tangem NFC cards.
//!
//! The crate turns typed commands into card frames and back:
//!
//! - [`tlv`] and [`apdu`] handle the wire format, including session encryption.
//! - [`commands`] holds every card command and the state machine that drives
//!   them through a [`CardSession`].
//! - [`hdwallet`] provides BIP32/BIP39 math matching what the card derives.
//! - [`jsonrpc`] exposes the commands to hosts that speak JSON-RPC.
//!
//! The transport is abstract: plug in a [`CardReader`] for the NFC or PC/SC
//! stack at hand and a [`SessionViewDelegate`] for user prompts.
//!
//! ```no_run
//! # fn run(reader: Box<dyn tangem_sdk::CardReader>) -> tangem_sdk::Result<()> {
//! use tangem_sdk::card::EllipticCurve;
//! use tangem_sdk::commands::CreateWalletTask;
//! use tangem_sdk::{CardSession, Config, SilentDelegate};
//!
//! let mut session = CardSession::new(reader, Box::new(SilentDelegate), Config::default());
//! let created = session.start(&mut CreateWalletTask::new(EllipticCurve::Secp256k1, false))?;
//! println!("Wallet {}", hex::encode(created.wallet.public_key));
//! # Ok(())
//! # }
//! ```

mod hex_serde;

pub mod apdu;
pub mod card;
pub mod commands;
pub mod config;
pub mod delegate;
pub mod environment;
pub mod error;
pub mod hdwallet;
pub mod jsonrpc;
pub mod personalization;
pub mod reader;
pub mod session;
pub mod storage;
pub mod tlv;

pub use card::Card;
pub use commands::{CardSessionRunnable, Command, PreflightReadMode};
pub use config::Config;
pub use delegate::{SessionViewDelegate, SilentDelegate, WrongValueType};
pub use environment::{SessionEnvironment, UserCodeType};
pub use error::{HdWalletError, MnemonicError, Result, TangemSdkError};
pub use jsonrpc::JsonRpcLinker;
pub use reader::CardReader;
pub use session::{CancellationHandle, CardSession};
pub use storage::{AccessCodeRepository, InMemoryStorage, SecureStorage};
