//! Key material of the parties involved in personalization.
//!
//! The `development` constructors return the publicly known keys SDK cards
//! are personalized with. They are useless for production cards.

use std::fmt;

use hex_literal::hex;
use serde::{Deserialize, Serialize};

const DEV_ISSUER_DATA_PUBLIC_KEY: [u8; 65] = hex!(
    "045F16BD1D2EAFE463E62A335A09E6B2BBCBD04452526885CB679FC4D27AF1BD22F553C7DEEFB54FD3D4F361D14E6DC3F11B7D4EA183250A60720EBDF9E110CD26"
);
const DEV_ISSUER_DATA_PRIVATE_KEY: [u8; 32] =
    hex!("11121314151617184771ED81F2BACF57479E4735EB1405083927372D40DA9E92");
const DEV_ISSUER_TRANSACTION_PUBLIC_KEY: [u8; 65] = hex!(
    "0484C5192E9BFA6C528A344F442137A92B89EA835BFEF1D04CB4362EB906B508C5889846CFEA71BA6DC7B3120C2208DF9C46127D3D85CB5CFBD1479E97133A39D8"
);
const DEV_ISSUER_TRANSACTION_PRIVATE_KEY: [u8; 32] =
    hex!("11121314151617184771ED81F2BACF57479E4735EB1405081918171615141312");
const DEV_ACQUIRER_PUBLIC_KEY: [u8; 65] = hex!(
    "0456AD1A82B22BCB40C38FD08939F87E6B80E40DEC5B3BDB351C55FCD709E47F9FB2ED00C2304D3A986F79C5AE0AC3C84E88DA46DC8F513B7542C716AF8C9A2DAF"
);
const DEV_ACQUIRER_PRIVATE_KEY: [u8; 32] =
    hex!("21222324252627284771ED81F2BACF57479E4735EB1405083927372D40DA9E92");
const DEV_MANUFACTURER_PUBLIC_KEY: [u8; 65] = hex!(
    "04BAB86D56298C996F564A84FC88E28AED38184B12F07E519113BEF48C76F3DF3ADC303599B08AC05B55EC3DF98D9338573A6242F76F5D28F4F0F364E87E8FCA2F"
);
const DEV_MANUFACTURER_PRIVATE_KEY: [u8; 32] =
    hex!("1B48CFD24BBB5B394771ED81F2BACF57479E4735EB1405083927372D40DA9E92");

/// Uncompressed secp256k1 public key and its 32-byte secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "zeroize", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub struct KeyPair {
    #[serde(with = "crate::hex_serde")]
    pub public_key: Vec<u8>,
    #[serde(with = "crate::hex_serde")]
    pub private_key: Vec<u8>,
}

impl KeyPair {
    pub fn new(public_key: &[u8], private_key: &[u8]) -> Self {
        Self {
            public_key: public_key.to_vec(),
            private_key: private_key.to_vec(),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Company issuing the cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuer {
    pub name: String,
    /// Written to the card as the issuer name, NUL terminated
    pub id: String,
    pub data_key_pair: KeyPair,
    pub transaction_key_pair: KeyPair,
}

impl Issuer {
    pub fn development() -> Self {
        let name = "TANGEM SDK";
        Self {
            name: name.to_owned(),
            id: format!("{name}\0"),
            data_key_pair: KeyPair::new(&DEV_ISSUER_DATA_PUBLIC_KEY, &DEV_ISSUER_DATA_PRIVATE_KEY),
            transaction_key_pair: KeyPair::new(
                &DEV_ISSUER_TRANSACTION_PUBLIC_KEY,
                &DEV_ISSUER_TRANSACTION_PRIVATE_KEY,
            ),
        }
    }
}

/// Operator of the terminal infrastructure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acquirer {
    pub name: String,
    pub id: String,
    pub key_pair: KeyPair,
}

impl Acquirer {
    pub fn development() -> Self {
        let name = "Smart Cash";
        Self {
            name: name.to_owned(),
            id: format!("{name}\0"),
            key_pair: KeyPair::new(&DEV_ACQUIRER_PUBLIC_KEY, &DEV_ACQUIRER_PRIVATE_KEY),
        }
    }
}

/// Signs the id of every card it produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manufacturer {
    pub name: String,
    pub key_pair: KeyPair,
}

impl Manufacturer {
    pub fn development() -> Self {
        Self {
            name: "TANGEM".to_owned(),
            key_pair: KeyPair::new(&DEV_MANUFACTURER_PUBLIC_KEY, &DEV_MANUFACTURER_PRIVATE_KEY),
        }
    }
}
