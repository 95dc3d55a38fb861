use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    CardSessionRunnable, Command, ReadCommand, ReadWalletsListCommand, known_card,
    response_decoder, transceive,
};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::{Card, CardWallet, EllipticCurve, FirmwareVersion, SigningMethod, WalletSettings, WalletSettingsMask};
use crate::environment::SessionEnvironment;
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletResponse {
    pub card_id: String,
    pub wallet: CardWallet,
}

/// Creates a wallet in the lowest free slot.
///
/// Before COS 4 the card decides the wallet settings at personalization, so
/// `is_permanent` must match `card.settings.is_permanent_wallet`.
#[derive(Debug, Clone)]
pub struct CreateWalletCommand {
    curve: EllipticCurve,
    is_permanent: bool,
    wallet_index: Option<u8>,
}

impl CreateWalletCommand {
    pub const fn new(curve: EllipticCurve, is_permanent: bool) -> Self {
        Self {
            curve,
            is_permanent,
            wallet_index: None,
        }
    }

    /// Slot chosen by the last run
    pub const fn wallet_index(&self) -> Option<u8> {
        self.wallet_index
    }

    fn free_index(card: &Card) -> Result<u8> {
        let max = card.settings.max_wallets_count;
        (0..max)
            .find(|index| card.wallet_by_index(*index).is_none())
            .ok_or(if max == 1 {
                TangemSdkError::AlreadyCreated
            } else {
                TangemSdkError::MaxNumberOfWalletsCreated
            })
    }
}

impl Command for CreateWalletCommand {
    type Response = CreateWalletResponse;

    fn requires_passcode(&self) -> bool {
        true
    }

    fn perform_pre_check(&self, card: &Card) -> Result<()> {
        let is_multi_wallet = card.firmware_version >= FirmwareVersion::MULTI_WALLET_AVAILABLE;
        if is_multi_wallet && !card.settings.is_select_blockchain_allowed() {
            return Err(TangemSdkError::WalletCannotBeCreated);
        }
        if !card.supported_curves.contains(&self.curve) {
            return Err(TangemSdkError::UnsupportedCurve);
        }
        if !is_multi_wallet {
            if self.is_permanent != card.settings.is_permanent_wallet {
                return Err(TangemSdkError::UnsupportedWalletConfig);
            }
            if let Some(methods) = card.settings.default_signing_methods {
                if !SigningMethod::SIGN_HASH.methods().iter().all(|m| methods.contains(*m)) {
                    return Err(TangemSdkError::UnsupportedWalletConfig);
                }
            }
        }
        Ok(())
    }

    /// A multi-wallet card with a default passcode rejects a second creation as bad params
    fn map_error(&self, card: Option<&Card>, error: TangemSdkError) -> TangemSdkError {
        match (error, card) {
            (TangemSdkError::InvalidParams, Some(card))
                if card.firmware_version >= FirmwareVersion::IS_PASSCODE_STATUS_AVAILABLE
                    && card.is_passcode_set == Some(false) =>
            {
                TangemSdkError::AlreadyCreated
            }
            (error, _) => error,
        }
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;
        let index = self.wallet_index.ok_or(TangemSdkError::SerializeCommandError)?;

        let mut builder = TlvBuilder::new();
        builder
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append_optional(TlvTag::Pin2, environment.passcode_value())?
            .append(TlvTag::CardId, &card.card_id)?
            .append(TlvTag::WalletIndex, &index)?
            .append_optional(TlvTag::Cvc, environment.cvc.as_ref())?;

        if card.firmware_version >= FirmwareVersion::MULTI_WALLET_AVAILABLE {
            let settings = WalletSettingsMask::IS_REUSABLE.with_if(WalletSettingsMask::IS_PERMANENT, self.is_permanent);
            builder
                .append(TlvTag::SettingsMask, &settings)?
                .append(TlvTag::CurveId, &self.curve)?
                .append(TlvTag::SigningMethod, &SigningMethod::SIGN_HASH)?;
        }
        Ok(CommandApdu::new(Instruction::CreateWallet, builder.serialize()))
    }

    fn deserialize(&self, environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let card = known_card(environment)?;
        let decoder = response_decoder(&apdu)?;
        let index = match decoder.decode_optional::<u8>(TlvTag::WalletIndex)? {
            Some(index) => index,
            None => self.wallet_index.ok_or(TangemSdkError::DeserializeApduFailed)?,
        };
        let chain_code = if card.firmware_version >= FirmwareVersion::CREATE_WALLET_RESPONSE_AVAILABLE {
            decoder.decode_optional(TlvTag::WalletHdChain)?
        } else {
            None
        };

        Ok(CreateWalletResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
            wallet: CardWallet {
                public_key: decoder.decode(TlvTag::WalletPublicKey)?,
                chain_code,
                curve: self.curve,
                settings: WalletSettings {
                    is_permanent: self.is_permanent,
                },
                total_signed_hashes: Some(0),
                remaining_signatures: card.remaining_signatures,
                index,
                is_imported: false,
                has_backup: false,
            },
        })
    }
}

impl CardSessionRunnable for CreateWalletCommand {
    type Response = CreateWalletResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let index = Self::free_index(known_card(&session.environment)?)?;
        debug!(index, curve = %self.curve, "Creating wallet");
        self.wallet_index = Some(index);

        let response = transceive(self, session)?;
        let card = known_card(&session.environment)?.add_wallet(response.wallet.clone());
        session.environment.card = Some(card);
        Ok(response)
    }
}

/// Creates a wallet, recovering it by a rescan when the card's answer is lost
#[derive(Debug, Clone)]
pub struct CreateWalletTask {
    command: CreateWalletCommand,
}

impl CreateWalletTask {
    pub const fn new(curve: EllipticCurve, is_permanent: bool) -> Self {
        Self {
            command: CreateWalletCommand::new(curve, is_permanent),
        }
    }

    fn rescan(&self, session: &mut CardSession) -> Result<CreateWalletResponse> {
        let index = self.command.wallet_index().ok_or(TangemSdkError::UnknownError)?;
        let firmware = known_card(&session.environment)?.firmware_version.clone();
        if firmware < FirmwareVersion::MULTI_WALLET_AVAILABLE {
            ReadCommand::new().run(session)?;
        } else {
            ReadWalletsListCommand::new().run(session)?;
        }

        let card = known_card(&session.environment)?;
        let wallet = card.wallet_by_index(index).cloned().ok_or_else(|| {
            debug!(index, "Wallet not found after rescan");
            TangemSdkError::UnknownError
        })?;
        Ok(CreateWalletResponse {
            card_id: card.card_id.clone(),
            wallet,
        })
    }
}

impl CardSessionRunnable for CreateWalletTask {
    type Response = CreateWalletResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        match self.command.run(session) {
            Err(TangemSdkError::InvalidState) => {
                warn!("Wallet creation was not confirmed, rescanning the card");
                self.rescan(session)
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::fixtures::{card, wallet};
    use crate::card::{FirmwareType, SettingsMask};

    #[test]
    fn test_lowest_free_index() {
        let known = card(vec![wallet(0, 0x00), wallet(2, 0x02)]);
        assert_eq!(CreateWalletCommand::free_index(&known), Ok(1));

        let mut single = card(vec![wallet(0, 0x00)]);
        single.settings.max_wallets_count = 1;
        assert_eq!(CreateWalletCommand::free_index(&single), Err(TangemSdkError::AlreadyCreated));

        let mut full = card(vec![wallet(0, 0x00), wallet(1, 0x01)]);
        full.settings.max_wallets_count = 2;
        assert_eq!(
            CreateWalletCommand::free_index(&full),
            Err(TangemSdkError::MaxNumberOfWalletsCreated)
        );
    }

    #[test]
    fn test_pre_checks() {
        let command = CreateWalletCommand::new(EllipticCurve::Secp256k1, false);
        assert_eq!(command.perform_pre_check(&card(vec![])), Ok(()));

        let mut locked = card(vec![]);
        locked.settings = crate::card::CardSettings::new(0, 20, SettingsMask::IS_REUSABLE, None, None);
        assert_eq!(command.perform_pre_check(&locked), Err(TangemSdkError::WalletCannotBeCreated));

        let mut legacy = card(vec![]);
        legacy.firmware_version = FirmwareVersion::new(3, 5, 0, FirmwareType::Release);
        legacy.supported_curves = vec![EllipticCurve::Ed25519];
        assert_eq!(command.perform_pre_check(&legacy), Err(TangemSdkError::UnsupportedCurve));

        legacy.supported_curves = vec![EllipticCurve::Secp256k1];
        let permanent = CreateWalletCommand::new(EllipticCurve::Secp256k1, true);
        assert_eq!(
            permanent.perform_pre_check(&legacy),
            Err(TangemSdkError::UnsupportedWalletConfig)
        );
    }

    #[test]
    fn test_invalid_params_means_already_created() {
        let command = CreateWalletCommand::new(EllipticCurve::Secp256k1, false);
        let known = card(vec![]);
        assert_eq!(
            command.map_error(Some(&known), TangemSdkError::InvalidParams),
            TangemSdkError::AlreadyCreated
        );
        assert_eq!(
            command.map_error(None, TangemSdkError::InvalidParams),
            TangemSdkError::InvalidParams
        );
    }

    #[test]
    fn test_multi_wallet_tlvs() {
        let mut env = SessionEnvironment::default();
        env.card = Some(card(vec![]));
        let mut command = CreateWalletCommand::new(EllipticCurve::Ed25519, true);
        command.wallet_index = Some(4);

        let apdu = command.serialize(&env).unwrap();
        let tlvs = crate::tlv::Tlv::deserialize(&apdu.data).unwrap();
        let tags: Vec<TlvTag> = tlvs.iter().map(|t| t.tag).collect();
        assert_eq!(
            tags,
            vec![
                TlvTag::Pin,
                TlvTag::Pin2,
                TlvTag::CardId,
                TlvTag::WalletIndex,
                TlvTag::SettingsMask,
                TlvTag::CurveId,
                TlvTag::SigningMethod,
            ]
        );
        assert_eq!(tlvs[3].value.as_ref(), &[4]);
        assert_eq!(tlvs[4].value.as_ref(), &[0x00, 0x05]);
        assert_eq!(tlvs[5].value.as_ref(), b"ed25519");
    }
}
