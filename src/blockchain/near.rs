//! NEAR factory.
//!
//! The payload is the hex Borsh `Transaction`. The signature is ed25519
//! over sha256(tx bytes); the signed artifact is the Borsh
//! `SignedTransaction`, which is the transaction bytes followed by the
//! signature enum (key type 0x00, then 64 bytes). The primary address is
//! the hex form of the ed25519 public key.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::{AdditionalAddresses, SigningWallet};
use crate::crypto::ed25519::Ed25519Key;
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::paths::path_for;

#[cfg(feature = "ledger")]
use crate::core::options::{LedgerApp, LedgerOptions};
#[cfg(feature = "ledger")]
use crate::hardware::ledger::LedgerNearApp;

const ED25519_KEY_TYPE: u8 = 0x00;

enum NearSigner {
    Software(Ed25519Key),
    #[cfg(feature = "ledger")]
    Ledger(LedgerNearApp),
}

impl NearSigner {
    async fn public_key(&self) -> Result<[u8; 32], SignerError> {
        match self {
            NearSigner::Software(key) => Ok(key.public_key_bytes()),
            #[cfg(feature = "ledger")]
            NearSigner::Ledger(app) => app.get_public_key().await,
        }
    }

    async fn sign_transaction_bytes(&self, tx_bytes: &[u8]) -> Result<[u8; 64], SignerError> {
        match self {
            NearSigner::Software(key) => {
                let digest: [u8; 32] = Sha256::digest(tx_bytes).into();
                Ok(key.sign(&digest))
            }
            // The device hashes the payload itself.
            #[cfg(feature = "ledger")]
            NearSigner::Ledger(app) => app.sign(tx_bytes).await,
        }
    }
}

struct NearWallet {
    network: Network,
    signer: NearSigner,
}

#[async_trait]
impl SigningWallet for NearWallet {
    async fn address(&self) -> Result<String, SignerError> {
        Ok(hex::encode(self.signer.public_key().await?))
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(AdditionalAddresses::new())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let tx_bytes = hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| SignerError::payload(self.network, format!("transaction hex: {e}")))?;
        if tx_bytes.is_empty() {
            return Err(SignerError::payload(self.network, "empty transaction"));
        }

        let signature = self.signer.sign_transaction_bytes(&tx_bytes).await?;

        // Borsh SignedTransaction = transaction ‖ signature enum.
        let mut signed = Vec::with_capacity(tx_bytes.len() + 1 + 64);
        signed.extend_from_slice(&tx_bytes);
        signed.push(ED25519_KEY_TYPE);
        signed.extend_from_slice(&signature);
        Ok(hex::encode(signed))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building NEAR signing wallet");
    let signer = match options {
        WalletOptions::Mnemonic(opts) => {
            let path = match &opts.derivation_path_override {
                Some(path) => path.clone(),
                None => path_for(opts.wallet_kind, network, opts.index)?,
            };
            let seed = seed_from_mnemonic(&opts.mnemonic)?;
            NearSigner::Software(Ed25519Key::derive(&seed[..], &path)?)
        }
        #[cfg(feature = "ledger")]
        WalletOptions::Ledger(LedgerOptions { transport, config }) => {
            let path = config.derivation_path(LedgerApp::Near)?;
            NearSigner::Ledger(LedgerNearApp::new(transport, path)?)
        }
    };
    Ok(Box::new(NearWallet { network, signer }))
}
