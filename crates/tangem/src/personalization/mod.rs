//! Factory provisioning of blank cards.
//!
//! [`serialize_personalization`] turns a [`CardConfig`] and the key material of
//! the parties involved into the `Personalize` payload. It is a pure function;
//! [`PersonalizeCommand`](crate::commands::PersonalizeCommand) sends the result.

mod card_id;
mod config;
mod keys;
mod ndef;

use bytes::Bytes;
use k256::ecdsa::{Signature, SigningKey, signature::Signer};
use sha2::{Digest, Sha256};

pub use card_id::generate_card_id;
pub use config::{CardConfig, CardConfigData};
pub use keys::{Acquirer, Issuer, KeyPair, Manufacturer};
pub use ndef::{NdefRecord, NdefRecordType, encode_ndef};

use crate::error::{Result, TangemSdkError};
use crate::tlv::{TlvBuilder, TlvTag};

#[cfg(test)]
pub(crate) use config::fixtures;

/// Used by the card instead of a session key while it is not personalized
pub fn development_key() -> [u8; 32] {
    Sha256::digest(b"1234").into()
}

/// ECDSA-secp256k1 signature of `card_id` as text, `r || s`
fn sign_card_id(card_id: &str, manufacturer: &Manufacturer) -> Result<Vec<u8>> {
    let key = SigningKey::from_slice(&manufacturer.key_pair.private_key)
        .map_err(|e| TangemSdkError::CryptoUtilsError(e.to_string()))?;
    let signature: Signature = key.sign(card_id.as_bytes());
    Ok(signature.to_bytes().to_vec())
}

fn serialize_card_data(
    config: &CardConfig,
    card_id: &str,
    issuer: &Issuer,
    manufacturer: &Manufacturer,
) -> Result<Bytes> {
    let data = &config.card_data;
    let mut builder = TlvBuilder::new();
    builder
        .append(TlvTag::BatchId, &data.batch)?
        .append(TlvTag::ProductMask, &data.product_mask())?
        .append(TlvTag::ManufactureDateTime, &data.manufacture_date())?
        .append(TlvTag::IssuerName, &issuer.id)?
        .append(TlvTag::BlockchainName, &data.blockchain)?
        .append(TlvTag::CardIdManufacturerSignature, &sign_card_id(card_id, manufacturer)?)?;

    if let Some(symbol) = &data.token_symbol {
        builder
            .append(TlvTag::TokenSymbol, symbol)?
            .append_optional(TlvTag::TokenContractAddress, data.token_contract_address.as_ref())?
            .append_optional(TlvTag::TokenDecimal, data.token_decimal.as_ref())?;
    }
    Ok(builder.serialize())
}

/// `Personalize` payload for the first card of `config`
pub fn serialize_personalization(
    config: &CardConfig,
    issuer: &Issuer,
    manufacturer: &Manufacturer,
    acquirer: Option<&Acquirer>,
) -> Result<Bytes> {
    let card_id = config.card_id().ok_or(TangemSdkError::SerializeCommandError)?;
    let max_signatures = config.max_signatures.unwrap_or(i32::MAX as u32);
    let pause = u16::try_from(config.pause_before_pin2 / 10)
        .map_err(|_| TangemSdkError::EncodingFailed("pauseBeforePIN2 is too long".into()))?;
    let ndef = if config.ndef_records.is_empty() {
        None
    } else {
        Some(encode_ndef(
            &config.ndef_records,
            config.use_dynamic_ndef == Some(true),
        )?)
    };

    let mut builder = TlvBuilder::new();
    builder
        .append(TlvTag::CardId, &card_id)?
        .append(TlvTag::CurveId, &config.curve_id)?
        .append(TlvTag::MaxSignatures, &max_signatures)?
        .append(TlvTag::SigningMethod, &config.signing_method)?
        .append(TlvTag::SettingsMask, &config.settings_mask())?
        .append(TlvTag::PauseBeforePin2, &pause)?
        .append(TlvTag::Cvc, config.cvc.as_bytes())?
        .append_optional(TlvTag::NdefData, ndef.as_ref())?
        .append(TlvTag::CreateWalletAtPersonalize, &(config.create_wallet != 0))?
        .append_optional(TlvTag::WalletsCount, config.wallets_count.as_ref())?
        .append(TlvTag::NewPin, &config.pin_sha256())?
        .append(TlvTag::NewPin2, &config.pin2_sha256())?
        .append_optional(TlvTag::NewPin3, config.pin3_sha256().as_ref())?
        .append_optional(TlvTag::CrExKey, config.hex_cr_ex_key.as_ref())?
        .append(TlvTag::IssuerPublicKey, &issuer.data_key_pair.public_key)?
        .append(TlvTag::IssuerTransactionPublicKey, &issuer.transaction_key_pair.public_key)?
        .append_optional(TlvTag::AcquirerPublicKey, acquirer.map(|a| &a.key_pair.public_key))?
        .append(
            TlvTag::CardData,
            &serialize_card_data(config, &card_id, issuer, manufacturer)?,
        )?;
    Ok(builder.serialize())
}
