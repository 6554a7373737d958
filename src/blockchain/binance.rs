//! Binance Beacon chain factory, plus the Beacon address helper the BSC
//! (EVM) factory exposes as a secondary address.
//!
//! The canonical amino StdTx serialization belongs to the chain SDK, so
//! the payload carries the canonical sign bytes alongside the raw
//! transaction JSON: `{signBytes, txRaw}`. The factory signs
//! sha256(signBytes) with secp256k1 and appends `{pubKey, signature}` to
//! `txRaw.signatures`. A payload without sign bytes is a signing mode
//! this factory does not implement.

use async_trait::async_trait;
use bech32::{ToBase32, Variant};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::{MnemonicOptions, WalletOptions};
use crate::core::wallet::{AdditionalAddresses, SigningWallet};
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::paths::path_for;
use crate::crypto::secp256k1::Secp256k1Key;

const HRP: &str = "bnb";

fn derive_key(opts: &MnemonicOptions) -> Result<Secp256k1Key, SignerError> {
    let path = match &opts.derivation_path_override {
        Some(path) => path.clone(),
        None => path_for(opts.wallet_kind, Network::BinanceBeacon, opts.index)?,
    };
    let seed = seed_from_mnemonic(&opts.mnemonic)?;
    Secp256k1Key::derive(&seed[..], &path)
}

fn bech_address(key: &Secp256k1Key) -> Result<String, SignerError> {
    bech32::encode(HRP, key.public_key_hash160().to_base32(), Variant::Bech32)
        .map_err(|e| SignerError::KeyDerivation(format!("bech32: {e}")))
}

/// Beacon address for the BSC factory's `binanceBeaconAddress` secondary.
pub(crate) fn beacon_address(opts: &MnemonicOptions) -> Result<String, SignerError> {
    bech_address(&derive_key(opts)?)
}

struct BinanceBeaconWallet {
    network: Network,
    key: Secp256k1Key,
}

#[async_trait]
impl SigningWallet for BinanceBeaconWallet {
    async fn address(&self) -> Result<String, SignerError> {
        bech_address(&self.key)
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(AdditionalAddresses::new())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| SignerError::payload(self.network, format!("transaction json: {e}")))?;

        let sign_bytes_hex = value
            .get("signBytes")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SignerError::UnsupportedSigningMode(
                    "binance signing requires canonical signBytes".to_string(),
                )
            })?;
        let sign_bytes = hex::decode(sign_bytes_hex.trim_start_matches("0x"))
            .map_err(|e| SignerError::payload(self.network, format!("signBytes hex: {e}")))?;

        let mut tx_raw = value
            .get("txRaw")
            .cloned()
            .ok_or_else(|| SignerError::payload(self.network, "missing txRaw"))?;

        let digest: [u8; 32] = Sha256::digest(&sign_bytes).into();
        let signature = self.key.sign_digest(&digest)?;

        let witness = serde_json::json!({
            "pubKey": hex::encode(self.key.public_key_compressed()),
            "signature": hex::encode(signature),
        });
        match tx_raw.get_mut("signatures").and_then(|s| s.as_array_mut()) {
            Some(signatures) => signatures.push(witness),
            None => tx_raw["signatures"] = serde_json::json!([witness]),
        }

        serde_json::to_string(&tx_raw)
            .map_err(|e| SignerError::payload(self.network, format!("serialize: {e}")))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building Binance Beacon signing wallet");
    let opts = options.require_mnemonic(network)?;
    let key = derive_key(opts)?;
    Ok(Box::new(BinanceBeaconWallet { network, key }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::WalletKind;
    use serde_json::json;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn options() -> WalletOptions {
        WalletOptions::Mnemonic(MnemonicOptions::new(TEST_MNEMONIC, WalletKind::Omni, 0))
    }

    #[tokio::test]
    async fn test_address_prefix() {
        let wallet = signing_wallet(Network::BinanceBeacon, options()).await.unwrap();
        let address = wallet.address().await.unwrap();
        assert!(address.starts_with("bnb1"));
        assert_eq!(address, wallet.address().await.unwrap());
    }

    #[tokio::test]
    async fn test_beacon_helper_matches_wallet_address() {
        let opts = MnemonicOptions::new(TEST_MNEMONIC, WalletKind::Omni, 0);
        let wallet = signing_wallet(Network::BinanceBeacon, options()).await.unwrap();
        assert_eq!(beacon_address(&opts).unwrap(), wallet.address().await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_appends_witness() {
        let wallet = signing_wallet(Network::BinanceBeacon, options()).await.unwrap();
        let raw = json!({
            "signBytes": hex::encode(b"canonical sign doc"),
            "txRaw": { "msg": [{}], "memo": "" }
        })
        .to_string();
        let signed = wallet.sign_transaction(&raw).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&signed).unwrap();
        assert_eq!(value["signatures"].as_array().unwrap().len(), 1);
        assert_eq!(value["memo"], "");
        assert_eq!(signed, wallet.sign_transaction(&raw).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_sign_bytes_is_mode_error() {
        let wallet = signing_wallet(Network::BinanceBeacon, options()).await.unwrap();
        let err = wallet
            .sign_transaction(r#"{"txRaw":{}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::UnsupportedSigningMode(_)));
    }
}
