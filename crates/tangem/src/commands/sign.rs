use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CardSessionRunnable, Command, PreflightReadMode, known_card, response_decoder, transceive};
use crate::apdu::{CommandApdu, Instruction, ResponseApdu};
use crate::card::{Card, EllipticCurve, FirmwareVersion, SigningMethodCode};
use crate::environment::SessionEnvironment;
use crate::error::{Result, TangemSdkError};
use crate::hdwallet::DerivationPath;
use crate::session::CardSession;
use crate::tlv::{TlvBuilder, TlvTag};

/// Packed hash bytes a single sign round may carry
const MAX_CHUNK_BYTES: usize = 512;
const MAX_CHUNK_HASHES: usize = 10;

/// A hash and its position in the caller's list
#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexedHash {
    index: usize,
    data: Vec<u8>,
}

/// Hashes of one length sent in a single round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashChunk {
    hash_size: usize,
    hashes: Vec<IndexedHash>,
}

impl HashChunk {
    pub const fn hash_size(&self) -> usize {
        self.hash_size
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Hashes back to back, as the card expects them
    pub fn flattened(&self) -> Vec<u8> {
        self.hashes.iter().flat_map(|hash| hash.data.iter().copied()).collect()
    }
}

/// Splits hashes into card-sized rounds and puts the signatures back in caller order.
///
/// The card signs hashes of a single length per round, so hashes are grouped
/// by length first. Each group is cut into chunks of `512 / length` hashes,
/// but never fewer than one or more than ten.
#[derive(Debug, Clone, Default)]
pub struct ChunkedHashesContainer {
    chunks: Vec<HashChunk>,
    current: usize,
    signatures: BTreeMap<usize, Vec<u8>>,
}

impl ChunkedHashesContainer {
    pub fn new(hashes: &[Vec<u8>]) -> Self {
        let mut groups: BTreeMap<usize, Vec<IndexedHash>> = BTreeMap::new();
        for (index, data) in hashes.iter().enumerate() {
            groups.entry(data.len()).or_default().push(IndexedHash {
                index,
                data: data.clone(),
            });
        }

        let chunks = groups
            .into_iter()
            .flat_map(|(hash_size, group)| {
                let chunk_size = MAX_CHUNK_BYTES
                    .checked_div(hash_size)
                    .unwrap_or(MAX_CHUNK_HASHES)
                    .clamp(1, MAX_CHUNK_HASHES);
                group
                    .chunks(chunk_size)
                    .map(|hashes| HashChunk {
                        hash_size,
                        hashes: hashes.to_vec(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        Self {
            chunks,
            current: 0,
            signatures: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks_count(&self) -> usize {
        self.chunks.len()
    }

    pub const fn current_chunk_index(&self) -> usize {
        self.current
    }

    pub fn chunks(&self) -> &[HashChunk] {
        &self.chunks
    }

    /// Chunk for the next round, `None` once every chunk is signed
    pub fn current_chunk(&self) -> Option<&HashChunk> {
        self.chunks.get(self.current)
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.chunks.len()
    }

    /// Record the signatures of the current chunk and move on
    pub fn add_signed_chunk(&mut self, signatures: Vec<Vec<u8>>) -> Result<()> {
        let chunk = self.current_chunk().ok_or(TangemSdkError::UnknownError)?;
        if signatures.len() != chunk.len() {
            return Err(TangemSdkError::InvalidResponse);
        }
        let indices: Vec<usize> = chunk.hashes.iter().map(|hash| hash.index).collect();
        self.signatures.extend(indices.into_iter().zip(signatures));
        self.current += 1;
        Ok(())
    }

    /// Every signature collected so far, in the order the hashes were given
    pub fn signatures(&self) -> Vec<Vec<u8>> {
        self.signatures.values().cloned().collect()
    }
}

/// Cut a signature blob into `count` equally sized signatures
fn split_signatures(blob: &[u8], count: usize) -> Result<Vec<Vec<u8>>> {
    if count == 0 || blob.is_empty() || blob.len() % count != 0 {
        return Err(TangemSdkError::InvalidResponse);
    }
    Ok(blob.chunks(blob.len() / count).map(<[u8]>::to_vec).collect())
}

/// `r || s` with `s` moved to the lower half of the curve order
fn normalize_s(signature: &[u8]) -> Result<Vec<u8>> {
    let parsed = k256::ecdsa::Signature::from_slice(signature)
        .map_err(|e| TangemSdkError::CryptoUtilsError(e.to_string()))?;
    Ok(parsed
        .normalize_s()
        .map_or_else(|| signature.to_vec(), |low| low.to_bytes().to_vec()))
}

/// Signatures of one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChunk {
    pub card_id: String,
    pub signatures: Vec<Vec<u8>>,
    pub total_signed_hashes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    pub card_id: String,
    /// One signature per hash, in the order the hashes were given
    #[serde(with = "crate::hex_serde::list")]
    pub signatures: Vec<Vec<u8>>,
    pub total_signed_hashes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignHashResponse {
    pub card_id: String,
    #[serde(with = "crate::hex_serde")]
    pub signature: Vec<u8>,
    pub total_signed_hashes: Option<u32>,
}

/// Signs any number of hashes with a card wallet, one round per chunk
#[derive(Debug, Clone)]
pub struct SignCommand {
    wallet_public_key: Vec<u8>,
    derivation_path: Option<DerivationPath>,
    container: ChunkedHashesContainer,
    use_terminal_keys: bool,
}

impl SignCommand {
    pub fn new(hashes: &[Vec<u8>], wallet_public_key: Vec<u8>) -> Self {
        Self {
            wallet_public_key,
            derivation_path: None,
            container: ChunkedHashesContainer::new(hashes),
            use_terminal_keys: false,
        }
    }

    /// Sign with the wallet's child key at `path`
    #[must_use]
    pub fn with_derivation_path(mut self, path: DerivationPath) -> Self {
        self.derivation_path = Some(path);
        self
    }

    pub const fn container(&self) -> &ChunkedHashesContainer {
        &self.container
    }

    /// Collected signatures, secp256k1 ones in low-S form unless the config says otherwise
    fn process_signatures(&self, environment: &SessionEnvironment) -> Result<Vec<Vec<u8>>> {
        let signatures = self.container.signatures();
        if !environment.config.canonize_secp256k1_signatures {
            return Ok(signatures);
        }
        let is_secp256k1 = environment
            .card
            .as_ref()
            .and_then(|card| card.wallet(&self.wallet_public_key))
            .is_some_and(|wallet| wallet.curve == EllipticCurve::Secp256k1);
        if !is_secp256k1 {
            return Ok(signatures);
        }
        signatures.iter().map(|signature| normalize_s(signature)).collect()
    }

    /// Linked terminals sign their requests only on cards that predate HD wallets
    fn should_use_terminal_keys(card: &Card) -> bool {
        card.settings.is_linked_terminal_enabled && card.firmware_version < FirmwareVersion::HD_WALLET_AVAILABLE
    }
}

impl Command for SignCommand {
    type Response = SignedChunk;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        PreflightReadMode::ReadWallet(self.wallet_public_key.clone())
    }

    fn requires_passcode(&self) -> bool {
        true
    }

    fn perform_pre_check(&self, card: &Card) -> Result<()> {
        let wallet = card
            .wallet(&self.wallet_public_key)
            .ok_or(TangemSdkError::WalletNotFound)?;

        if self.derivation_path.is_some() {
            if card.firmware_version < FirmwareVersion::HD_WALLET_AVAILABLE {
                return Err(TangemSdkError::NotSupportedFirmwareVersion);
            }
            if wallet.curve == EllipticCurve::Secp256r1 {
                return Err(TangemSdkError::UnsupportedCurve);
            }
            if !card.settings.is_hd_wallet_allowed {
                return Err(TangemSdkError::HdWalletDisabled);
            }
        }

        if wallet.remaining_signatures == Some(0) {
            return Err(TangemSdkError::NoRemainingSignatures);
        }
        if card
            .settings
            .default_signing_methods
            .is_some_and(|methods| !methods.contains(SigningMethodCode::SignHash))
        {
            return Err(TangemSdkError::SignHashesNotAvailable);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let card = known_card(environment)?;
        let wallet_index = card
            .wallet(&self.wallet_public_key)
            .map(|wallet| wallet.index)
            .ok_or(TangemSdkError::WalletNotFound)?;
        let chunk = self
            .container
            .current_chunk()
            .ok_or(TangemSdkError::EmptyHashes)?;

        let hash_size = chunk.hash_size();
        let hash_size_data = match u8::try_from(hash_size) {
            Ok(size) => vec![size],
            Err(_) => u16::try_from(hash_size)
                .map_err(|_| TangemSdkError::HashSizeMustBeEqual)?
                .to_be_bytes()
                .to_vec(),
        };
        let hashes = chunk.flattened();

        let mut builder = TlvBuilder::new();
        builder
            .append_optional(TlvTag::Pin, environment.access_code_value())?
            .append_optional(TlvTag::Pin2, environment.passcode_value())?
            .append(TlvTag::CardId, &card.card_id)?
            .append(TlvTag::TransactionOutHashSize, &hash_size_data)?
            .append(TlvTag::TransactionOutHash, &hashes)?
            .append_optional(TlvTag::Cvc, environment.cvc.as_ref())?
            .append(TlvTag::WalletIndex, &wallet_index)?;

        if self.use_terminal_keys {
            if let Some(keys) = &environment.terminal_keys {
                builder
                    .append(TlvTag::TerminalTransactionSignature, &keys.sign(&hashes))?
                    .append(TlvTag::TerminalPublicKey, keys.public_key())?;
            }
        }
        builder.append_optional(TlvTag::WalletHdPath, self.derivation_path.as_ref())?;

        Ok(CommandApdu::new(Instruction::Sign, builder.serialize()))
    }

    fn deserialize(&self, _environment: &SessionEnvironment, apdu: ResponseApdu) -> Result<Self::Response> {
        let decoder = response_decoder(&apdu)?;
        let chunk = self
            .container
            .current_chunk()
            .ok_or(TangemSdkError::UnknownError)?;
        let blob: Vec<u8> = decoder.decode(TlvTag::WalletSignature)?;

        Ok(SignedChunk {
            card_id: decoder.decode(TlvTag::CardId)?,
            signatures: split_signatures(&blob, chunk.len())?,
            total_signed_hashes: decoder
                .decode_optional::<u16>(TlvTag::WalletSignedHashes)?
                .map(u32::from),
        })
    }
}

impl CardSessionRunnable for SignCommand {
    type Response = SignResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        Command::preflight_read_mode(self)
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let card = known_card(&session.environment)?;
        if self.container.is_empty() {
            return Err(TangemSdkError::EmptyHashes);
        }
        self.use_terminal_keys = Self::should_use_terminal_keys(card);

        loop {
            debug!(
                chunk = self.container.current_chunk_index() + 1,
                total = self.container.chunks_count(),
                "Signing chunk"
            );
            let signed = transceive(&*self, session)?;
            self.container.add_signed_chunk(signed.signatures)?;
            if !self.container.is_complete() {
                continue;
            }

            let signatures = self.process_signatures(&session.environment)?;
            let card = known_card(&session.environment)?;
            if let Some(wallet) = card.wallet(&self.wallet_public_key) {
                let mut wallet = wallet.clone();
                wallet.total_signed_hashes = signed.total_signed_hashes;
                wallet.remaining_signatures = wallet
                    .remaining_signatures
                    .map(|remaining| remaining.saturating_sub(signatures.len() as u32));
                session.environment.card = Some(card.update_wallet(wallet));
            }

            return Ok(SignResponse {
                card_id: signed.card_id,
                signatures,
                total_signed_hashes: signed.total_signed_hashes,
            });
        }
    }
}

/// Signs a single hash
#[derive(Debug, Clone)]
pub struct SignHashCommand {
    inner: SignCommand,
}

impl SignHashCommand {
    pub fn new(hash: Vec<u8>, wallet_public_key: Vec<u8>) -> Self {
        Self {
            inner: SignCommand::new(&[hash], wallet_public_key),
        }
    }

    #[must_use]
    pub fn with_derivation_path(self, path: DerivationPath) -> Self {
        Self {
            inner: self.inner.with_derivation_path(path),
        }
    }
}

impl CardSessionRunnable for SignHashCommand {
    type Response = SignHashResponse;

    fn preflight_read_mode(&self) -> PreflightReadMode {
        Command::preflight_read_mode(&self.inner)
    }

    fn run(&mut self, session: &mut CardSession) -> Result<Self::Response> {
        let response = self.inner.run(session)?;
        let signature = response
            .signatures
            .into_iter()
            .next()
            .ok_or(TangemSdkError::UnknownError)?;
        Ok(SignHashResponse {
            card_id: response.card_id,
            signature,
            total_signed_hashes: response.total_signed_hashes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{FirmwareType, SigningMethod};
    use crate::card::fixtures::{card, wallet};
    use crate::tlv::Tlv;

    fn hashes(count: usize, size: usize) -> Vec<Vec<u8>> {
        (0..count).map(|i| vec![i as u8; size]).collect()
    }

    #[test]
    fn test_chunks_group_by_length() {
        let mut input = hashes(2, 16);
        input.extend(hashes(2, 17));
        input.extend(hashes(11, 32));
        let container = ChunkedHashesContainer::new(&input);

        let sizes: Vec<(usize, usize)> = container
            .chunks()
            .iter()
            .map(|chunk| (chunk.hash_size(), chunk.len()))
            .collect();
        assert_eq!(sizes, vec![(16, 2), (17, 2), (32, 10), (32, 1)]);
    }

    #[test]
    fn test_chunk_size_bounds() {
        assert_eq!(ChunkedHashesContainer::new(&hashes(3, 600)).chunks_count(), 3);
        assert_eq!(ChunkedHashesContainer::new(&hashes(37, 64)).chunks()[0].len(), 8);
        assert!(ChunkedHashesContainer::new(&[]).is_empty());
    }

    #[test]
    fn test_signatures_keep_input_order() {
        for count in 1..=37 {
            let mut input = hashes(count, 32);
            // Interleave another length so groups are not in input order
            for (i, hash) in input.iter_mut().enumerate() {
                if i % 3 == 0 {
                    hash.truncate(20);
                }
            }

            let mut container = ChunkedHashesContainer::new(&input);
            while let Some(chunk) = container.current_chunk() {
                let signatures = chunk.hashes.iter().map(|hash| hash.data.repeat(2)).collect();
                container.add_signed_chunk(signatures).unwrap();
            }

            let expected: Vec<Vec<u8>> = input.iter().map(|hash| hash.repeat(2)).collect();
            assert_eq!(container.signatures(), expected, "count {count}");
        }
    }

    #[test]
    fn test_split_signature_blob() {
        let blob: Vec<u8> = (0..128).collect();
        let signatures = split_signatures(&blob, 2).unwrap();
        assert_eq!(signatures[0], (0..64).collect::<Vec<u8>>());
        assert_eq!(signatures[1], (64..128).collect::<Vec<u8>>());
        assert_eq!(split_signatures(&blob, 3), Err(TangemSdkError::InvalidResponse));
    }

    #[test]
    fn test_pre_check_order() {
        let command = SignCommand::new(&hashes(1, 32), vec![0x01; 33]);

        let known = card(vec![wallet(0, 0x00)]);
        assert_eq!(command.perform_pre_check(&known), Err(TangemSdkError::WalletNotFound));

        let mut exhausted = wallet(1, 0x01);
        exhausted.remaining_signatures = Some(0);
        let known = card(vec![exhausted.clone()]);
        assert_eq!(command.perform_pre_check(&known), Err(TangemSdkError::NoRemainingSignatures));

        let mut old = known.clone();
        old.firmware_version = FirmwareVersion::new(4, 12, 0, FirmwareType::Release);
        let derived = command.clone().with_derivation_path("m/0/1".parse().unwrap());
        assert_eq!(derived.perform_pre_check(&old), Err(TangemSdkError::NotSupportedFirmwareVersion));

        let mut r1 = exhausted;
        r1.curve = EllipticCurve::Secp256r1;
        assert_eq!(
            derived.perform_pre_check(&card(vec![r1])),
            Err(TangemSdkError::UnsupportedCurve)
        );

        let mut no_hash = card(vec![wallet(1, 0x01)]);
        no_hash.settings.default_signing_methods = Some(SigningMethod::build(&[SigningMethodCode::SignRaw]));
        assert_eq!(command.perform_pre_check(&no_hash), Err(TangemSdkError::SignHashesNotAvailable));

        let mut no_hd = card(vec![wallet(1, 0x01)]);
        no_hd.settings.is_hd_wallet_allowed = false;
        assert_eq!(derived.perform_pre_check(&no_hd), Err(TangemSdkError::HdWalletDisabled));
        assert_eq!(command.perform_pre_check(&no_hd), Ok(()));
    }

    /// `r = 0x11..11`, `s = n - 1`
    fn high_s_signature() -> Vec<u8> {
        let mut signature = vec![0x11; 32];
        signature.extend(hex::decode("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364140").unwrap());
        signature
    }

    fn signed(command: &mut SignCommand, signatures: Vec<Vec<u8>>) {
        command.container.add_signed_chunk(signatures).unwrap();
    }

    #[test]
    fn test_secp256k1_signatures_are_canonized() {
        let mut env = SessionEnvironment::default();
        env.card = Some(card(vec![wallet(0, 0x00)]));
        let low = vec![0x22; 64];
        let mut command = SignCommand::new(&hashes(2, 32), vec![0x00; 33]);
        signed(&mut command, vec![high_s_signature(), low.clone()]);

        let processed = command.process_signatures(&env).unwrap();
        let mut expected = vec![0x11; 32];
        expected.extend([0u8; 31]);
        expected.push(0x01);
        assert_eq!(processed, vec![expected, low]);

        env.config = env.config.clone().with_canonize_secp256k1_signatures(false);
        assert_eq!(command.process_signatures(&env).unwrap()[0], high_s_signature());
    }

    #[test]
    fn test_other_curves_are_left_alone() {
        let mut ed = wallet(0, 0x00);
        ed.curve = EllipticCurve::Ed25519;
        let mut env = SessionEnvironment::default();
        env.card = Some(card(vec![ed]));
        let mut command = SignCommand::new(&hashes(1, 32), vec![0x00; 33]);
        signed(&mut command, vec![high_s_signature()]);

        assert_eq!(command.process_signatures(&env).unwrap(), vec![high_s_signature()]);
    }

    #[test]
    fn test_serialize_round() {
        let mut env = SessionEnvironment::default();
        env.card = Some(card(vec![wallet(0, 0x00), wallet(3, 0x03)]));
        let command = SignCommand::new(&hashes(2, 32), vec![0x03; 33])
            .with_derivation_path("m/0'/1'/2".parse().unwrap());

        let apdu = command.serialize(&env).unwrap();
        assert_eq!(apdu.ins, Instruction::Sign);
        let tlvs = Tlv::deserialize(&apdu.data).unwrap();
        let find = |tag| tlvs.iter().find(|tlv| tlv.tag == tag).map(|tlv| tlv.value.to_vec());

        assert_eq!(find(TlvTag::TransactionOutHashSize), Some(vec![32]));
        assert_eq!(find(TlvTag::TransactionOutHash).map(|h| h.len()), Some(64));
        assert_eq!(find(TlvTag::WalletIndex), Some(vec![3]));
        assert_eq!(
            find(TlvTag::WalletHdPath),
            Some(hex::decode("800000008000000100000002").unwrap())
        );
        assert_eq!(find(TlvTag::TerminalPublicKey), None);
    }
}
