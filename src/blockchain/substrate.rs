//! Substrate family factory (Polkadot, Kusama, Westend, Bittensor).
//!
//! The payload carries the unsigned extrinsic pieces the chain's registry
//! produced: `{method, era, nonce, tip, specVersion, transactionVersion,
//! genesisHash, blockHash}` (hex strings / integers). The factory builds
//! the v4 signing payload, signs sr25519 (payloads over 256 bytes are
//! blake2b-256 pre-hashed, per the extrinsic format) and assembles the
//! signed extrinsic: compact length, version byte 0x84,
//! `MultiAddress::Id`, `MultiSignature::Sr25519`, era, nonce, tip,
//! method.

use async_trait::async_trait;
use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use serde::Deserialize;
use tracing::info;

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::{AdditionalAddresses, SigningWallet};
use crate::crypto::sr25519::Sr25519Key;

const EXTRINSIC_VERSION_SIGNED: u8 = 0x84;
const MULTI_ADDRESS_ID: u8 = 0x00;
const MULTI_SIGNATURE_SR25519: u8 = 0x01;

/// SCALE compact encoding of an unsigned integer.
fn compact(value: u64, out: &mut Vec<u8>) {
    if value < 1 << 6 {
        out.push((value as u8) << 2);
    } else if value < 1 << 14 {
        out.extend_from_slice(&(((value as u16) << 2) | 0b01).to_le_bytes());
    } else if value < 1 << 30 {
        out.extend_from_slice(&(((value as u32) << 2) | 0b10).to_le_bytes());
    } else {
        let bytes = value.to_le_bytes();
        let len = 8 - value.leading_zeros() as usize / 8;
        out.push(0b11 | (((len - 4) as u8) << 2));
        out.extend_from_slice(&bytes[..len]);
    }
}

fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2bVar::new(32).expect("valid length");
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize_variable(&mut out).expect("sized buffer");
    out
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnsignedExtrinsic {
    method: String,
    era: String,
    nonce: u64,
    #[serde(default)]
    tip: u64,
    spec_version: u32,
    transaction_version: u32,
    genesis_hash: String,
    block_hash: String,
}

fn decode_hex_field(network: Network, name: &str, value: &str) -> Result<Vec<u8>, SignerError> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| SignerError::payload(network, format!("{name} hex: {e}")))
}

struct SubstrateWallet {
    network: Network,
    key: Sr25519Key,
    ss58_format: u16,
}

impl SubstrateWallet {
    fn signing_payload(
        &self,
        tx: &UnsignedExtrinsic,
        method: &[u8],
        era: &[u8],
        genesis_hash: &[u8],
        block_hash: &[u8],
    ) -> Vec<u8> {
        let mut payload = Vec::with_capacity(method.len() + 96);
        payload.extend_from_slice(method);
        payload.extend_from_slice(era);
        compact(tx.nonce, &mut payload);
        compact(tx.tip, &mut payload);
        payload.extend_from_slice(&tx.spec_version.to_le_bytes());
        payload.extend_from_slice(&tx.transaction_version.to_le_bytes());
        payload.extend_from_slice(genesis_hash);
        payload.extend_from_slice(block_hash);
        payload
    }
}

#[async_trait]
impl SigningWallet for SubstrateWallet {
    async fn address(&self) -> Result<String, SignerError> {
        self.key.ss58_address(self.ss58_format)
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(AdditionalAddresses::new())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let tx: UnsignedExtrinsic = serde_json::from_str(raw)
            .map_err(|e| SignerError::payload(self.network, format!("unsigned extrinsic: {e}")))?;

        let method = decode_hex_field(self.network, "method", &tx.method)?;
        let era = decode_hex_field(self.network, "era", &tx.era)?;
        let genesis_hash = decode_hex_field(self.network, "genesisHash", &tx.genesis_hash)?;
        let block_hash = decode_hex_field(self.network, "blockHash", &tx.block_hash)?;
        if genesis_hash.len() != 32 || block_hash.len() != 32 {
            return Err(SignerError::payload(self.network, "hashes must be 32 bytes"));
        }

        let payload = self.signing_payload(&tx, &method, &era, &genesis_hash, &block_hash);
        let signature = if payload.len() > 256 {
            self.key.sign(&blake2b_256(&payload))
        } else {
            self.key.sign(&payload)
        };

        // signed extrinsic body
        let mut body = Vec::with_capacity(1 + 33 + 65 + era.len() + method.len() + 16);
        body.push(EXTRINSIC_VERSION_SIGNED);
        body.push(MULTI_ADDRESS_ID);
        body.extend_from_slice(&self.key.public_key_bytes());
        body.push(MULTI_SIGNATURE_SR25519);
        body.extend_from_slice(&signature);
        body.extend_from_slice(&era);
        compact(tx.nonce, &mut body);
        compact(tx.tip, &mut body);
        body.extend_from_slice(&method);

        let mut extrinsic = Vec::with_capacity(body.len() + 4);
        compact(body.len() as u64, &mut extrinsic);
        extrinsic.extend_from_slice(&body);
        Ok(format!("0x{}", hex::encode(extrinsic)))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    let ss58_format = network.ss58_format().ok_or_else(|| {
        SignerError::UnsupportedNetwork(format!("{network} is not a Substrate network"))
    })?;
    info!(network = %network, ss58_format, "building Substrate signing wallet");

    let opts = options.require_mnemonic(network)?;
    let key = Sr25519Key::from_mnemonic(&opts.mnemonic, "")?;
    Ok(Box::new(SubstrateWallet {
        network,
        key,
        ss58_format,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::{MnemonicOptions, WalletKind};
    use schnorrkel::signing_context;
    use serde_json::json;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn options() -> WalletOptions {
        WalletOptions::Mnemonic(MnemonicOptions::new(TEST_MNEMONIC, WalletKind::Omni, 0))
    }

    fn unsigned(method_len: usize) -> String {
        json!({
            "method": format!("0x{}", hex::encode(vec![0x05u8; method_len])),
            "era": "0xf501",
            "nonce": 4,
            "tip": 0,
            "specVersion": 1002000,
            "transactionVersion": 26,
            "genesisHash": format!("0x{}", hex::encode([0xAAu8; 32])),
            "blockHash": format!("0x{}", hex::encode([0xBBu8; 32])),
        })
        .to_string()
    }

    #[test]
    fn test_compact_encoding() {
        let mut out = Vec::new();
        compact(0, &mut out);
        assert_eq!(out, [0x00]);
        out.clear();
        compact(1, &mut out);
        assert_eq!(out, [0x04]);
        out.clear();
        compact(63, &mut out);
        assert_eq!(out, [0xFC]);
        out.clear();
        compact(64, &mut out);
        assert_eq!(out, [0x01, 0x01]);
        out.clear();
        compact(16384, &mut out);
        assert_eq!(out, [0x02, 0x00, 0x01, 0x00]);
        out.clear();
        compact(1 << 32, &mut out);
        assert_eq!(out[0], 0b11 | (1 << 2));
        assert_eq!(out.len(), 6);
    }

    #[tokio::test]
    async fn test_address_per_network_format() {
        let polkadot = signing_wallet(Network::Polkadot, options()).await.unwrap();
        let westend = signing_wallet(Network::Westend, options()).await.unwrap();
        let a = polkadot.address().await.unwrap();
        let b = westend.address().await.unwrap();
        assert!(a.starts_with('1'));
        assert!(b.starts_with('5'));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_signed_extrinsic_structure_and_signature() {
        let wallet = signing_wallet(Network::Polkadot, options()).await.unwrap();
        let signed = wallet.sign_transaction(&unsigned(8)).await.unwrap();
        let bytes = hex::decode(signed.trim_start_matches("0x")).unwrap();

        // Body starts after the compact length (2 bytes for this size).
        let body = &bytes[2..];
        assert_eq!(body[0], EXTRINSIC_VERSION_SIGNED);
        assert_eq!(body[1], MULTI_ADDRESS_ID);
        assert_eq!(body[34], MULTI_SIGNATURE_SR25519);

        // Signature verifies over the reconstructed signing payload.
        let public = schnorrkel::PublicKey::from_bytes(&body[2..34]).unwrap();
        let signature = schnorrkel::Signature::from_bytes(&body[35..99]).unwrap();

        let mut payload = Vec::new();
        payload.extend_from_slice(&[0x05u8; 8]); // method
        payload.extend_from_slice(&[0xf5, 0x01]); // era
        compact(4, &mut payload);
        compact(0, &mut payload);
        payload.extend_from_slice(&1_002_000u32.to_le_bytes());
        payload.extend_from_slice(&26u32.to_le_bytes());
        payload.extend_from_slice(&[0xAAu8; 32]);
        payload.extend_from_slice(&[0xBBu8; 32]);

        let context = signing_context(b"substrate");
        assert!(public.verify(context.bytes(&payload), &signature).is_ok());
    }

    #[tokio::test]
    async fn test_oversized_payload_is_prehashed() {
        let wallet = signing_wallet(Network::Polkadot, options()).await.unwrap();
        let signed = wallet.sign_transaction(&unsigned(400)).await.unwrap();
        let bytes = hex::decode(signed.trim_start_matches("0x")).unwrap();
        let body = &bytes[2..];
        let public = schnorrkel::PublicKey::from_bytes(&body[2..34]).unwrap();
        let signature = schnorrkel::Signature::from_bytes(&body[35..99]).unwrap();

        let mut payload = Vec::new();
        payload.extend_from_slice(&[0x05u8; 400]);
        payload.extend_from_slice(&[0xf5, 0x01]);
        compact(4, &mut payload);
        compact(0, &mut payload);
        payload.extend_from_slice(&1_002_000u32.to_le_bytes());
        payload.extend_from_slice(&26u32.to_le_bytes());
        payload.extend_from_slice(&[0xAAu8; 32]);
        payload.extend_from_slice(&[0xBBu8; 32]);

        let context = signing_context(b"substrate");
        let digest = blake2b_256(&payload);
        assert!(public.verify(context.bytes(&digest), &signature).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_fields_rejected() {
        let wallet = signing_wallet(Network::Kusama, options()).await.unwrap();
        assert!(matches!(
            wallet.sign_transaction("{}").await.unwrap_err(),
            SignerError::InvalidPayload { .. }
        ));
        let bad_hash = json!({
            "method": "0x00", "era": "0x00", "nonce": 0,
            "specVersion": 1, "transactionVersion": 1,
            "genesisHash": "0xabcd", "blockHash": "0xabcd"
        })
        .to_string();
        assert!(matches!(
            wallet.sign_transaction(&bad_hash).await.unwrap_err(),
            SignerError::InvalidPayload { .. }
        ));
    }
}
