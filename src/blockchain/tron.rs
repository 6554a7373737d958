//! Tron factory.
//!
//! The payload is the JSON transaction as the chain SDK builds it; its
//! `txID` field is the sha256 of the raw transaction protobuf, and the
//! signature is a recoverable secp256k1 signature over that digest,
//! appended to the transaction's `signature` array. The base58check
//! address hashes the uncompressed public key with keccak-256 under the
//! 0x41 version byte.

use async_trait::async_trait;
use sha3::{Digest, Keccak256};
use tracing::info;

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::{AdditionalAddresses, SigningWallet};
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::paths::path_for;
use crate::crypto::secp256k1::Secp256k1Key;

const ADDRESS_PREFIX: u8 = 0x41;

struct TronWallet {
    network: Network,
    key: Secp256k1Key,
}

impl TronWallet {
    fn base58_address(&self) -> String {
        let public_key = self.key.public_key_uncompressed();
        let digest = Keccak256::digest(&public_key[1..]);

        let mut payload = Vec::with_capacity(21);
        payload.push(ADDRESS_PREFIX);
        payload.extend_from_slice(&digest[12..]);
        bs58::encode(payload).with_check().into_string()
    }
}

#[async_trait]
impl SigningWallet for TronWallet {
    async fn address(&self) -> Result<String, SignerError> {
        Ok(self.base58_address())
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(AdditionalAddresses::new())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let mut tx: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| SignerError::payload(self.network, format!("transaction json: {e}")))?;

        let tx_id = tx
            .get("txID")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SignerError::payload(self.network, "missing txID"))?;
        let digest: [u8; 32] = hex::decode(tx_id)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| SignerError::payload(self.network, "txID must be 32 hex bytes"))?;

        let mut signature = self.key.sign_digest_recoverable(&digest)?;
        // Tron carries the recovery byte in 27/28 form.
        signature[64] += 27;

        tx["signature"] = serde_json::json!([hex::encode(signature)]);
        serde_json::to_string(&tx)
            .map_err(|e| SignerError::payload(self.network, format!("serialize: {e}")))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building Tron signing wallet");
    let opts = options.require_mnemonic(network)?;

    let path = match &opts.derivation_path_override {
        Some(path) => path.clone(),
        None => path_for(opts.wallet_kind, network, opts.index)?,
    };
    let seed = seed_from_mnemonic(&opts.mnemonic)?;
    let key = Secp256k1Key::derive(&seed[..], &path)?;
    Ok(Box::new(TronWallet { network, key }))
}
