use tracing::debug;

use super::{
    Card, CardSettings, CardStatus, CardWallet, EllipticCurve, FirmwareVersion, Issuer,
    LinkedTerminalStatus, Manufacturer, SettingsMask, WalletSettings, WalletSettingsMask,
    WalletStatus,
};
use crate::apdu::ResponseApdu;
use crate::error::{Result, TangemSdkError};
use crate::tlv::{TlvDecoder, TlvTag};

/// Builds a [`Card`] out of a `Read` response
pub struct CardDeserializer;

impl CardDeserializer {
    /// Decoder over the (already decrypted) response payload
    pub fn decoder(apdu: &ResponseApdu) -> Result<TlvDecoder> {
        apdu.tlv_data()
            .map(TlvDecoder::new)
            .ok_or(TangemSdkError::DeserializeApduFailed)
    }

    /// Decoder over the nested `CardData` block, if the card sent one
    pub fn card_data_decoder(decoder: &TlvDecoder) -> Option<TlvDecoder> {
        decoder
            .find(TlvTag::CardData)
            .and_then(|tlv| TlvDecoder::from_bytes(&tlv.value).ok())
            .filter(|d| !d.tlvs().is_empty())
    }

    /// `is_access_code_set_legacy` is used for firmware that does not report the flag
    pub fn deserialize(
        is_access_code_set_legacy: bool,
        decoder: &TlvDecoder,
        card_data: Option<&TlvDecoder>,
    ) -> Result<Card> {
        let status: CardStatus = decoder.decode(TlvTag::Status)?;
        match status {
            CardStatus::NotPersonalized => return Err(TangemSdkError::NotPersonalized),
            CardStatus::Purged => return Err(TangemSdkError::WalletIsPurged),
            CardStatus::Empty | CardStatus::Loaded => {}
        }
        if decoder.decode::<bool>(TlvTag::IsActivated)? {
            return Err(TangemSdkError::NotActivated);
        }
        let card_data = card_data.ok_or(TangemSdkError::DeserializeApduFailed)?;

        let firmware: FirmwareVersion = decoder.decode::<String>(TlvTag::Firmware)?.parse()?;
        let mask: SettingsMask = decoder.decode(TlvTag::SettingsMask)?;

        let is_passcode_set = if firmware >= FirmwareVersion::IS_PASSCODE_STATUS_AVAILABLE {
            Some(!decoder.decode::<bool>(TlvTag::Pin2IsDefault)?)
        } else {
            None
        };
        let is_access_code_set = if firmware >= FirmwareVersion::IS_ACCESS_CODE_STATUS_AVAILABLE {
            !decoder.decode::<bool>(TlvTag::PinIsDefault)?
        } else {
            is_access_code_set_legacy
        };

        let default_curve: Option<EllipticCurve> = decoder.decode_optional(TlvTag::CurveId)?;
        let supported_curves = if firmware < FirmwareVersion::MULTI_WALLET_AVAILABLE {
            default_curve.into_iter().collect()
        } else {
            EllipticCurve::ALL.to_vec()
        };

        let mut wallets = Vec::new();
        let mut remaining_signatures = None;
        if firmware < FirmwareVersion::MULTI_WALLET_AVAILABLE && status == CardStatus::Loaded {
            remaining_signatures = decoder
                .decode_optional::<u16>(TlvTag::WalletRemainingSignatures)?
                .map(u32::from);
            let curve = default_curve.ok_or_else(|| {
                TangemSdkError::DecodingFailedMissingTag(format!("{:?}", TlvTag::CurveId))
            })?;
            wallets.push(CardWallet {
                public_key: decoder.decode(TlvTag::WalletPublicKey)?,
                chain_code: None,
                curve,
                settings: WalletSettings {
                    is_permanent: mask
                        .to_wallet_settings()
                        .contains(WalletSettingsMask::IS_PERMANENT),
                },
                total_signed_hashes: decoder
                    .decode_optional::<u16>(TlvTag::WalletSignedHashes)?
                    .map(u32::from),
                remaining_signatures,
                index: 0,
                is_imported: false,
                has_backup: false,
            });
        }

        let manufacturer = Manufacturer {
            name: decoder.decode(TlvTag::ManufacturerName)?,
            manufacture_date: card_data.decode(TlvTag::ManufactureDateTime)?,
            signature: card_data.decode_optional(TlvTag::CardIdManufacturerSignature)?,
        };
        let issuer = Issuer {
            name: card_data.decode(TlvTag::IssuerName)?,
            public_key: decoder.decode(TlvTag::IssuerPublicKey)?,
        };
        let linked_terminal_status = if decoder.decode::<bool>(TlvTag::TerminalIsLinked)? {
            LinkedTerminalStatus::Current
        } else {
            LinkedTerminalStatus::None
        };

        let security_delay = decoder
            .decode_optional::<u16>(TlvTag::PauseBeforePin2)?
            .map_or(0, |pause| u32::from(pause) * 10);
        let settings = CardSettings::new(
            security_delay,
            decoder.decode_optional(TlvTag::WalletsCount)?.unwrap_or(1),
            mask,
            decoder.decode_optional(TlvTag::SigningMethod)?,
            default_curve,
        );

        Ok(Card {
            card_id: decoder.decode(TlvTag::CardId)?,
            batch_id: card_data.decode(TlvTag::BatchId)?,
            card_public_key: decoder.decode(TlvTag::CardPublicKey)?,
            firmware_version: firmware,
            manufacturer,
            issuer,
            settings,
            linked_terminal_status,
            is_access_code_set,
            is_passcode_set,
            supported_curves,
            wallets,
            health: decoder.decode_optional(TlvTag::Health)?,
            remaining_signatures,
        })
    }
}

/// Reads wallets out of nested `CardWallet` blocks
pub struct WalletDeserializer {
    /// Applied when a wallet block carries no settings mask of its own
    is_default_permanent: bool,
}

impl WalletDeserializer {
    pub const fn new(is_default_permanent: bool) -> Self {
        Self {
            is_default_permanent,
        }
    }

    /// Available wallets plus the number of wallet slots the response covered
    pub fn deserialize_wallets(&self, decoder: &TlvDecoder) -> Result<(Vec<CardWallet>, usize)> {
        let blocks = decoder
            .find_all(TlvTag::CardWallet)
            .map(|tlv| TlvDecoder::from_bytes(&tlv.value))
            .collect::<Result<Vec<_>>>()?;

        let mut wallets = Vec::with_capacity(blocks.len());
        for block in &blocks {
            if let Some(wallet) = self.deserialize_wallet(block)? {
                wallets.push(wallet);
            }
        }
        debug!(slots = blocks.len(), available = wallets.len(), "Wallets read");
        Ok((wallets, blocks.len()))
    }

    /// `None` for an empty or purged slot
    pub fn deserialize_wallet(&self, decoder: &TlvDecoder) -> Result<Option<CardWallet>> {
        let status: WalletStatus = decoder.decode(TlvTag::Status)?;
        if !status.is_available() {
            return Ok(None);
        }

        let is_permanent = decoder
            .decode_optional::<WalletSettingsMask>(TlvTag::SettingsMask)?
            .map_or(self.is_default_permanent, |mask| {
                mask.contains(WalletSettingsMask::IS_PERMANENT)
            });

        Ok(Some(CardWallet {
            public_key: decoder.decode(TlvTag::WalletPublicKey)?,
            chain_code: decoder.decode_optional(TlvTag::WalletHdChain)?,
            curve: decoder.decode(TlvTag::CurveId)?,
            settings: WalletSettings { is_permanent },
            total_signed_hashes: decoder
                .decode_optional::<u16>(TlvTag::WalletSignedHashes)?
                .map(u32::from),
            remaining_signatures: None,
            index: decoder.decode(TlvTag::WalletIndex)?,
            is_imported: status.is_imported(),
            has_backup: status.is_backed_up(),
        }))
    }
}
