use chrono::Datelike;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::card_id::generate_card_id;
use super::ndef::NdefRecord;
use crate::card::{EllipticCurve, ManufactureDate, ProductMask, SettingsMask, SigningMethod};

/// Everything written to a blank card during personalization.
///
/// Field names follow the JSON configuration files used by the factory tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardConfig {
    #[serde(default)]
    pub issuer_name: Option<String>,
    pub series: Option<String>,
    pub start_number: u64,
    #[serde(default)]
    pub count: u32,
    #[serde(rename = "PIN")]
    pub pin: String,
    #[serde(rename = "PIN2")]
    pub pin2: String,
    #[serde(rename = "PIN3", default)]
    pub pin3: Option<String>,
    #[serde(default, with = "crate::hex_serde::option")]
    pub hex_cr_ex_key: Option<Vec<u8>>,
    #[serde(rename = "CVC")]
    pub cvc: String,
    /// Milliseconds
    #[serde(rename = "pauseBeforePIN2")]
    pub pause_before_pin2: u32,
    pub smart_security_delay: bool,
    #[serde(rename = "curveID")]
    pub curve_id: EllipticCurve,
    #[serde(rename = "SigningMethod")]
    pub signing_method: SigningMethod,
    #[serde(rename = "MaxSignatures", default)]
    pub max_signatures: Option<u32>,
    #[serde(rename = "allowSwapPIN")]
    pub allow_set_pin1: bool,
    #[serde(rename = "allowSwapPIN2")]
    pub allow_set_pin2: bool,
    pub use_activation: bool,
    #[serde(rename = "useCVC")]
    pub use_cvc: bool,
    #[serde(rename = "useNDEF")]
    pub use_ndef: bool,
    #[serde(rename = "useDynamicNDEF", default)]
    pub use_dynamic_ndef: Option<bool>,
    #[serde(default)]
    pub use_one_command_at_time: Option<bool>,
    pub use_block: bool,
    pub allow_select_blockchain: bool,
    #[serde(rename = "forbidPurgeWallet")]
    pub prohibit_purge_wallet: bool,
    #[serde(rename = "protocolAllowUnencrypted")]
    pub allow_unencrypted: bool,
    #[serde(rename = "protocolAllowStaticEncryption")]
    pub allow_fast_encryption: bool,
    #[serde(default)]
    pub protect_issuer_data_against_replay: Option<bool>,
    #[serde(rename = "forbidDefaultPIN")]
    pub prohibit_default_pin1: bool,
    #[serde(rename = "disablePrecomputedNDEF", default)]
    pub disable_precomputed_ndef: Option<bool>,
    pub skip_security_delay_if_validated_by_issuer: bool,
    #[serde(rename = "skipCheckPIN2andCVCIfValidatedByIssuer")]
    pub skip_check_pin2_cvc_if_validated_by_issuer: bool,
    pub skip_security_delay_if_validated_by_linked_terminal: bool,
    #[serde(default)]
    pub restrict_overwrite_issuer_data_ex: Option<bool>,
    #[serde(default)]
    pub disable_issuer_data: Option<bool>,
    #[serde(default)]
    pub disable_user_data: Option<bool>,
    #[serde(default)]
    pub disable_files: Option<bool>,
    #[serde(rename = "allowHDWallets", default)]
    pub allow_hd_wallets: Option<bool>,
    /// Non-zero creates the first wallet during personalization
    pub create_wallet: u8,
    pub card_data: CardConfigData,
    #[serde(rename = "NDEF", default)]
    pub ndef_records: Vec<NdefRecord>,
    #[serde(default)]
    pub wallets_count: Option<u8>,
    #[serde(default)]
    pub is_reusable: Option<bool>,
}

impl CardConfig {
    /// Id of the first card of the batch
    pub fn card_id(&self) -> Option<String> {
        generate_card_id(self.series.as_deref()?, self.start_number)
    }

    pub fn settings_mask(&self) -> SettingsMask {
        let flag = |value: Option<bool>| value == Some(true);
        SettingsMask::default()
            .with_if(SettingsMask::IS_REUSABLE, self.is_reusable.unwrap_or(true))
            .with_if(SettingsMask::ALLOW_SET_PIN1, self.allow_set_pin1)
            .with_if(SettingsMask::ALLOW_SET_PIN2, self.allow_set_pin2)
            .with_if(SettingsMask::USE_CVC, self.use_cvc)
            .with_if(SettingsMask::USE_ONE_COMMAND_AT_TIME, flag(self.use_one_command_at_time))
            .with_if(SettingsMask::USE_NDEF, self.use_ndef)
            .with_if(SettingsMask::USE_DYNAMIC_NDEF, flag(self.use_dynamic_ndef))
            .with_if(SettingsMask::DISABLE_PRECOMPUTED_NDEF, flag(self.disable_precomputed_ndef))
            .with_if(SettingsMask::ALLOW_UNENCRYPTED, self.allow_unencrypted)
            .with_if(SettingsMask::ALLOW_FAST_ENCRYPTION, self.allow_fast_encryption)
            .with_if(SettingsMask::PROHIBIT_DEFAULT_PIN1, self.prohibit_default_pin1)
            .with_if(SettingsMask::USE_ACTIVATION, self.use_activation)
            .with_if(SettingsMask::USE_BLOCK, self.use_block)
            .with_if(SettingsMask::SMART_SECURITY_DELAY, self.smart_security_delay)
            .with_if(
                SettingsMask::PROTECT_ISSUER_DATA_AGAINST_REPLAY,
                flag(self.protect_issuer_data_against_replay),
            )
            .with_if(SettingsMask::PERMANENT_WALLET, self.prohibit_purge_wallet)
            .with_if(SettingsMask::ALLOW_SELECT_BLOCKCHAIN, self.allow_select_blockchain)
            .with_if(
                SettingsMask::SKIP_CHECK_PIN2_CVC_IF_VALIDATED_BY_ISSUER,
                self.skip_check_pin2_cvc_if_validated_by_issuer,
            )
            .with_if(
                SettingsMask::SKIP_SECURITY_DELAY_IF_VALIDATED_BY_ISSUER,
                self.skip_security_delay_if_validated_by_issuer,
            )
            .with_if(
                SettingsMask::SKIP_SECURITY_DELAY_IF_VALIDATED_BY_LINKED_TERMINAL,
                self.skip_security_delay_if_validated_by_linked_terminal,
            )
            .with_if(
                SettingsMask::RESTRICT_OVERWRITE_ISSUER_EXTRA_DATA,
                flag(self.restrict_overwrite_issuer_data_ex),
            )
            .with_if(SettingsMask::DISABLE_ISSUER_DATA, flag(self.disable_issuer_data))
            .with_if(SettingsMask::DISABLE_USER_DATA, flag(self.disable_user_data))
            .with_if(SettingsMask::DISABLE_FILES, flag(self.disable_files))
            .with_if(SettingsMask::ALLOW_HD_WALLETS, flag(self.allow_hd_wallets))
    }

    pub fn pin_sha256(&self) -> Vec<u8> {
        Sha256::digest(self.pin.as_bytes()).to_vec()
    }

    pub fn pin2_sha256(&self) -> Vec<u8> {
        Sha256::digest(self.pin2.as_bytes()).to_vec()
    }

    pub fn pin3_sha256(&self) -> Option<Vec<u8>> {
        self.pin3
            .as_ref()
            .map(|pin| Sha256::digest(pin.as_bytes()).to_vec())
    }
}

/// Manufacturing data block of a [`CardConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardConfigData {
    /// Today when unset
    #[serde(default)]
    pub date: Option<ManufactureDate>,
    pub batch: String,
    pub blockchain: String,
    #[serde(rename = "product_note", default)]
    pub product_note: Option<bool>,
    #[serde(rename = "product_tag", default)]
    pub product_tag: Option<bool>,
    #[serde(rename = "product_id_card", default)]
    pub product_id_card: Option<bool>,
    #[serde(rename = "product_id_issuer", default)]
    pub product_id_issuer: Option<bool>,
    #[serde(rename = "product_authentication", default)]
    pub product_authentication: Option<bool>,
    #[serde(rename = "product_twin_card", default)]
    pub product_twin: Option<bool>,
    #[serde(rename = "token_symbol", default)]
    pub token_symbol: Option<String>,
    #[serde(rename = "token_contract_address", default)]
    pub token_contract_address: Option<String>,
    #[serde(rename = "token_decimal", default)]
    pub token_decimal: Option<u16>,
}

impl CardConfigData {
    pub fn product_mask(&self) -> ProductMask {
        let flag = |value: Option<bool>| value == Some(true);
        ProductMask::default()
            .with_if(ProductMask::NOTE, flag(self.product_note))
            .with_if(ProductMask::TAG, flag(self.product_tag))
            .with_if(ProductMask::ID_CARD, flag(self.product_id_card))
            .with_if(ProductMask::ID_ISSUER, flag(self.product_id_issuer))
            .with_if(ProductMask::AUTHENTICATION, flag(self.product_authentication))
            .with_if(ProductMask::TWIN_CARD, flag(self.product_twin))
    }

    pub fn manufacture_date(&self) -> ManufactureDate {
        self.date.unwrap_or_else(|| {
            let today = chrono::Utc::now().date_naive();
            ManufactureDate {
                year: u16::try_from(today.year()).unwrap_or(u16::MAX),
                month: today.month() as u8,
                day: today.day() as u8,
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::card::SigningMethodCode;

    /// Release-like configuration of a single-wallet note card
    pub(crate) fn config() -> CardConfig {
        CardConfig {
            issuer_name: None,
            series: Some("BB".into()),
            start_number: 300_000_000_000,
            count: 0,
            pin: "000000".into(),
            pin2: "000".into(),
            pin3: None,
            hex_cr_ex_key: None,
            cvc: "000".into(),
            pause_before_pin2: 5000,
            smart_security_delay: true,
            curve_id: EllipticCurve::Secp256k1,
            signing_method: SigningMethod::build(&[SigningMethodCode::SignHash]),
            max_signatures: None,
            allow_set_pin1: true,
            allow_set_pin2: true,
            use_activation: false,
            use_cvc: false,
            use_ndef: true,
            use_dynamic_ndef: None,
            use_one_command_at_time: None,
            use_block: false,
            allow_select_blockchain: true,
            prohibit_purge_wallet: false,
            allow_unencrypted: true,
            allow_fast_encryption: true,
            protect_issuer_data_against_replay: Some(true),
            prohibit_default_pin1: false,
            disable_precomputed_ndef: None,
            skip_security_delay_if_validated_by_issuer: true,
            skip_check_pin2_cvc_if_validated_by_issuer: true,
            skip_security_delay_if_validated_by_linked_terminal: true,
            restrict_overwrite_issuer_data_ex: None,
            disable_issuer_data: None,
            disable_user_data: None,
            disable_files: None,
            allow_hd_wallets: Some(true),
            create_wallet: 0,
            card_data: CardConfigData {
                date: ManufactureDate::new(2021, 6, 1),
                batch: "FFFF".into(),
                blockchain: "ANY".into(),
                product_note: Some(true),
                product_tag: None,
                product_id_card: None,
                product_id_issuer: None,
                product_authentication: None,
                product_twin: None,
                token_symbol: None,
                token_contract_address: None,
                token_decimal: None,
            },
            ndef_records: Vec::new(),
            wallets_count: Some(20),
            is_reusable: None,
        }
    }
}
