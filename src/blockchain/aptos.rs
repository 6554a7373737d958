//! Aptos factory.
//!
//! The payload is JSON `{rawTxBytes}` — the hex signing message prepared
//! by the chain SDK. The factory signs it with ed25519 and returns the
//! transaction bytes untouched next to the BCS-encoded ed25519 account
//! authenticator. The account address is sha3-256 of the public key with
//! the single-key scheme suffix 0x00.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::info;

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::{AdditionalAddresses, SigningWallet};
use crate::crypto::ed25519::Ed25519Key;
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::paths::path_for;

const SCHEME_ED25519: u8 = 0x00;
const AUTHENTICATOR_VARIANT_ED25519: u8 = 0x00;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnsignedPayload {
    raw_tx_bytes: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedPayload {
    transaction_bytes: String,
    authenticator_bytes: String,
}

/// BCS `AccountAuthenticator::Ed25519 { public_key, signature }`.
fn bcs_authenticator(public_key: &[u8; 32], signature: &[u8; 64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + 1 + 32 + 1 + 64);
    bytes.push(AUTHENTICATOR_VARIANT_ED25519);
    bytes.push(32); // uleb128 length
    bytes.extend_from_slice(public_key);
    bytes.push(64); // uleb128 length
    bytes.extend_from_slice(signature);
    bytes
}

struct AptosWallet {
    network: Network,
    key: Ed25519Key,
}

#[async_trait]
impl SigningWallet for AptosWallet {
    async fn address(&self) -> Result<String, SignerError> {
        let mut hasher = Sha3_256::new();
        hasher.update(self.key.public_key_bytes());
        hasher.update([SCHEME_ED25519]);
        Ok(format!("0x{}", hex::encode(hasher.finalize())))
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(AdditionalAddresses::new())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let payload: UnsignedPayload = serde_json::from_str(raw)
            .map_err(|e| SignerError::payload(self.network, format!("transaction json: {e}")))?;
        let tx_hex = payload.raw_tx_bytes.trim_start_matches("0x").to_string();
        let tx_bytes = hex::decode(&tx_hex)
            .map_err(|e| SignerError::payload(self.network, format!("rawTxBytes hex: {e}")))?;

        let signature = self.key.sign(&tx_bytes);
        let authenticator = bcs_authenticator(&self.key.public_key_bytes(), &signature);

        let signed = SignedPayload {
            transaction_bytes: tx_hex,
            authenticator_bytes: hex::encode(authenticator),
        };
        serde_json::to_string(&signed)
            .map_err(|e| SignerError::payload(self.network, format!("serialize: {e}")))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building Aptos signing wallet");
    let opts = options.require_mnemonic(network)?;

    let path = match &opts.derivation_path_override {
        Some(path) => path.clone(),
        None => path_for(opts.wallet_kind, network, opts.index)?,
    };
    let seed = seed_from_mnemonic(&opts.mnemonic)?;
    let key = Ed25519Key::derive(&seed[..], &path)
        .map_err(|e| SignerError::WalletNotInitialized(format!("aptos key: {e}")))?;
    Ok(Box::new(AptosWallet { network, key }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::{MnemonicOptions, WalletKind};
    use ed25519_dalek::Verifier;
    use serde_json::json;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn options(index: u32) -> WalletOptions {
        WalletOptions::Mnemonic(MnemonicOptions::new(TEST_MNEMONIC, WalletKind::Omni, index))
    }

    #[tokio::test]
    async fn test_address_shape_and_determinism() {
        let wallet = signing_wallet(Network::Aptos, options(0)).await.unwrap();
        let address = wallet.address().await.unwrap();
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 66);
        assert_eq!(address, wallet.address().await.unwrap());

        let sibling = signing_wallet(Network::Aptos, options(1)).await.unwrap();
        assert_ne!(address, sibling.address().await.unwrap());
    }

    #[tokio::test]
    async fn test_signed_payload_structure() {
        let wallet = signing_wallet(Network::Aptos, options(0)).await.unwrap();
        let raw = json!({ "rawTxBytes": hex::encode([0x1Bu8; 50]) }).to_string();
        let signed = wallet.sign_transaction(&raw).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&signed).unwrap();

        assert_eq!(
            value["transactionBytes"].as_str().unwrap(),
            hex::encode([0x1Bu8; 50])
        );
        let authenticator =
            hex::decode(value["authenticatorBytes"].as_str().unwrap()).unwrap();
        assert_eq!(authenticator.len(), 1 + 1 + 32 + 1 + 64);
        assert_eq!(authenticator[0], AUTHENTICATOR_VARIANT_ED25519);
        assert_eq!(authenticator[1], 32);
        assert_eq!(authenticator[34], 64);

        // signature inside the authenticator verifies over the tx bytes
        let public: [u8; 32] = authenticator[2..34].try_into().unwrap();
        let signature: [u8; 64] = authenticator[35..].try_into().unwrap();
        let verifying = ed25519_dalek::VerifyingKey::from_bytes(&public).unwrap();
        assert!(verifying
            .verify(&[0x1Bu8; 50], &ed25519_dalek::Signature::from_bytes(&signature))
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_field_rejected() {
        let wallet = signing_wallet(Network::Aptos, options(0)).await.unwrap();
        let err = wallet.sign_transaction(r#"{"foo":1}"#).await.unwrap_err();
        assert!(matches!(err, SignerError::InvalidPayload { .. }));
    }
}
