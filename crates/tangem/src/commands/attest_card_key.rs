use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{Signature, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CardSessionRunnable, Command, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::environment::SessionEnvironment;
use crate::error::{Result, TangemSdkError};
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

const CHALLENGE_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestCardKeyResponse {
    pub card_id: String,
    #[serde(with = "crate::hex_serde")]
    pub salt: Vec<u8>,
    #[serde(with = "crate::hex_serde")]
    pub card_signature: Vec<u8>,
    #[serde(with = "crate::hex_serde")]
    pub challenge: Vec<u8>,
}

impl AttestCardKeyResponse {
    /// Check the card signature over `challenge || salt`
    pub fn verify(&self, card_public_key: &[u8]) -> Result<bool> {
        let key = VerifyingKey::from_sec1_bytes(card_public_key)
            .map_err(|e| TangemSdkError::CryptoUtilsError(e.to_string()))?;
        let Ok(signature) = Signature::from_slice(&self.card_signature) else {
            return Ok(false);
        };
        // Cards are not bound to low-S
        let signature = signature.normalize_s().unwrap_or(signature);
        let message = [self.challenge.as_slice(), self.salt.as_slice()].concat();
        Ok(key.verify(&message, &signature).is_ok())
    }
}

/// Proves the card holds the private half of its card key
#[derive(Debug, Clone, Default)]
pub struct AttestCardKeyCommand {
    challenge: Option<Vec<u8>>,
}

impl AttestCardKeyCommand {
    /// A random challenge is drawn when none is given
    pub const fn new(challenge: Option<Vec<u8>>) -> Self {
        Self { challenge }
    }
}

impl Command for AttestCardKeyCommand {
    type Response = AttestCardKeyResponse;

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;
        let challenge = self
            .challenge
            .as_ref()
            .ok_or(TangemSdkError::SerializeCommandError)?;

        let mut builder = TlvBuilder::new();
        builder
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append(TlvTag::CardId, &card.card_id)?
            .append(TlvTag::Challenge, challenge)?;
        Ok(CommandApdu::new(Instruction::AttestCardKey, builder.serialize()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = response_decoder(&apdu)?;
        Ok(AttestCardKeyResponse {
            card_id: decoder.decode(TlvTag::CardId)?,
            salt: decoder.decode(TlvTag::Salt)?,
            card_signature: decoder.decode(TlvTag::CardSignature)?,
            challenge: self.challenge.clone().unwrap_or_default(),
        })
    }
}

impl CardSessionRunnable for AttestCardKeyCommand {
    type Response = AttestCardKeyResponse;

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        if self.challenge.is_none() {
            let mut challenge = vec![0u8; CHALLENGE_LEN];
            rand::rng().fill_bytes(&mut challenge);
            self.challenge = Some(challenge);
        }
        let card_public_key = known_card(&session.environment)?.card_public_key.clone();

        let response = transceive(&*self, session)?;
        if !response.verify(&card_public_key)? {
            warn!(card_id = %response.card_id, "Card key attestation failed");
            return Err(TangemSdkError::CardVerificationFailed);
        }
        debug!("Card key attested");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use k256::ecdsa::SigningKey;
    use k256::ecdsa::signature::Signer;

    use super::*;
    use crate::card::fixtures::card;
    use crate::tlv::Tlv;

    fn signed(challenge: &[u8], salt: &[u8]) -> (Vec<u8>, AttestCardKeyResponse) {
        let key = SigningKey::from_slice(&[0x11; 32]).unwrap();
        let signature: Signature = key.sign(&[challenge, salt].concat());
        let public_key = key.verifying_key().to_encoded_point(false).as_bytes().to_vec();
        let response = AttestCardKeyResponse {
            card_id: "AF99001800554008".into(),
            salt: salt.to_vec(),
            card_signature: signature.to_bytes().to_vec(),
            challenge: challenge.to_vec(),
        };
        (public_key, response)
    }

    #[test]
    fn test_verify() {
        let (public_key, response) = signed(&[0x01; 16], &[0x02; 16]);
        assert_eq!(response.verify(&public_key), Ok(true));

        let mut tampered = response.clone();
        tampered.salt[0] ^= 0xFF;
        assert_eq!(tampered.verify(&public_key), Ok(false));

        let mut garbage = response;
        garbage.card_signature = vec![0x00; 3];
        assert_eq!(garbage.verify(&public_key), Ok(false));
    }

    #[test]
    fn test_attest_frame() {
        let mut env = SessionEnvironment::default();
        env.card = Some(card(vec![]));
        let apdu = AttestCardKeyCommand::new(Some(vec![0xAA; 16]))
            .serialize(&env)
            .unwrap();
        assert_eq!(apdu.ins, Instruction::AttestCardKey);
        let tlvs = Tlv::deserialize(&apdu.data).unwrap();
        let tags: Vec<TlvTag> = tlvs.iter().map(|tlv| tlv.tag).collect();
        assert_eq!(tags, vec![TlvTag::Pin, TlvTag::CardId, TlvTag::Challenge]);
        assert_eq!(&tlvs[2].value[..], &[0xAA; 16]);
    }

    #[test]
    fn test_challenge_is_needed_before_serializing() {
        let mut env = SessionEnvironment::default();
        env.card = Some(card(vec![]));
        assert_eq!(
            AttestCardKeyCommand::default().serialize(&env),
            Err(TangemSdkError::SerializeCommandError)
        );
    }
}
