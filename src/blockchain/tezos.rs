//! Tezos factory.
//!
//! The payload is the hex forged operation. Signing prepends the generic
//! operation watermark (0x03), hashes with blake2b-256 and signs ed25519.
//! The output mirrors the taquito signer shape: `{bytes, sig, prefixSig,
//! sbytes}`. Addresses are `tz1…` (blake2b-160 of the public key under
//! the ed25519 base58check prefix); the public key itself is exposed as
//! the `tezosPubKey` secondary in `edpk…` form.

use async_trait::async_trait;
use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use serde::Serialize;
use tracing::info;

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::{AdditionalAddresses, AddressValue, SigningWallet};
use crate::crypto::ed25519::Ed25519Key;
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::paths::path_for;

const WATERMARK_GENERIC: u8 = 0x03;

// base58check prefixes (from the Tezos address registry)
const PREFIX_TZ1: [u8; 3] = [6, 161, 159];
const PREFIX_EDPK: [u8; 4] = [13, 15, 37, 217];
const PREFIX_EDSIG: [u8; 5] = [9, 245, 205, 134, 18];
const PREFIX_SIG: [u8; 3] = [4, 130, 43];

fn blake2b(data: &[u8], out_len: usize) -> Vec<u8> {
    let mut hasher = Blake2bVar::new(out_len).expect("valid blake2b length");
    hasher.update(data);
    let mut out = vec![0u8; out_len];
    hasher.finalize_variable(&mut out).expect("sized buffer");
    out
}

fn base58check(prefix: &[u8], payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(prefix.len() + payload.len());
    data.extend_from_slice(prefix);
    data.extend_from_slice(payload);
    bs58::encode(data).with_check().into_string()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedOperation {
    bytes: String,
    sig: String,
    prefix_sig: String,
    sbytes: String,
}

struct TezosWallet {
    network: Network,
    key: Ed25519Key,
}

#[async_trait]
impl SigningWallet for TezosWallet {
    async fn address(&self) -> Result<String, SignerError> {
        let hash = blake2b(&self.key.public_key_bytes(), 20);
        Ok(base58check(&PREFIX_TZ1, &hash))
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        let mut additional = AdditionalAddresses::new();
        additional.insert(
            "tezosPubKey",
            AddressValue::Single(base58check(&PREFIX_EDPK, &self.key.public_key_bytes())),
        );
        Ok(additional)
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let op_hex = raw.trim_start_matches("0x");
        let op_bytes = hex::decode(op_hex)
            .map_err(|e| SignerError::payload(self.network, format!("operation hex: {e}")))?;

        let mut watermarked = Vec::with_capacity(1 + op_bytes.len());
        watermarked.push(WATERMARK_GENERIC);
        watermarked.extend_from_slice(&op_bytes);

        let digest = blake2b(&watermarked, 32);
        let signature = self.key.sign(&digest);

        let signed = SignedOperation {
            bytes: op_hex.to_string(),
            sig: base58check(&PREFIX_SIG, &signature),
            prefix_sig: base58check(&PREFIX_EDSIG, &signature),
            sbytes: format!("{op_hex}{}", hex::encode(signature)),
        };
        serde_json::to_string(&signed)
            .map_err(|e| SignerError::payload(self.network, format!("serialize: {e}")))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building Tezos signing wallet");
    let opts = options.require_mnemonic(network)?;

    let path = match &opts.derivation_path_override {
        Some(path) => path.clone(),
        None => path_for(opts.wallet_kind, network, opts.index)?,
    };
    let seed = seed_from_mnemonic(&opts.mnemonic)?;
    let key = Ed25519Key::derive(&seed[..], &path)?;
    Ok(Box::new(TezosWallet { network, key }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::{MnemonicOptions, WalletKind};

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn options(index: u32) -> WalletOptions {
        WalletOptions::Mnemonic(MnemonicOptions::new(TEST_MNEMONIC, WalletKind::Omni, index))
    }

    #[tokio::test]
    async fn test_address_prefix_and_determinism() {
        let wallet = signing_wallet(Network::Tezos, options(0)).await.unwrap();
        let address = wallet.address().await.unwrap();
        assert!(address.starts_with("tz1"));
        assert_eq!(address, wallet.address().await.unwrap());
    }

    #[tokio::test]
    async fn test_public_key_secondary() {
        let wallet = signing_wallet(Network::Tezos, options(0)).await.unwrap();
        let additional = wallet.additional_addresses().await.unwrap();
        match additional.get("tezosPubKey").unwrap() {
            AddressValue::Single(pk) => assert!(pk.starts_with("edpk")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_signed_operation_shape() {
        let wallet = signing_wallet(Network::Tezos, options(0)).await.unwrap();
        let signed = wallet.sign_transaction("deadbeef").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&signed).unwrap();
        assert_eq!(value["bytes"], "deadbeef");
        assert!(value["prefixSig"].as_str().unwrap().starts_with("edsig"));
        assert!(value["sig"].as_str().unwrap().starts_with("sig"));
        let sbytes = value["sbytes"].as_str().unwrap();
        assert!(sbytes.starts_with("deadbeef"));
        assert_eq!(sbytes.len(), "deadbeef".len() + 128);
    }

    #[tokio::test]
    async fn test_ledger_unsupported() {
        #[cfg(feature = "ledger")]
        {
            use crate::core::options::{LedgerConfig, LedgerOptions};
            use crate::hardware::ledger::apdu::{ApduCommand, ApduResponse};
            use crate::hardware::ledger::transport::{share, LedgerTransport};

            struct NeverTransport;

            #[async_trait]
            impl LedgerTransport for NeverTransport {
                async fn exchange(
                    &mut self,
                    _command: &ApduCommand,
                ) -> Result<ApduResponse, SignerError> {
                    panic!("must not be reached");
                }
            }

            let options = WalletOptions::Ledger(LedgerOptions {
                transport: share(NeverTransport),
                config: LedgerConfig::new(),
            });
            let err = signing_wallet(Network::Tezos, options).await.err().unwrap();
            assert!(matches!(err, SignerError::LedgerNotSupported(Network::Tezos)));
        }
    }

    #[tokio::test]
    async fn test_bad_hex_rejected() {
        let wallet = signing_wallet(Network::Tezos, options(0)).await.unwrap();
        let err = wallet.sign_transaction("zzz").await.unwrap_err();
        assert!(matches!(err, SignerError::InvalidPayload { .. }));
    }
}
