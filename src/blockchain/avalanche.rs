//! Avalanche platform/atomic factory (`AvalancheP`, `AvalancheCAtomic`)
//! and the C/P bech address helpers the C-chain factory shares.
//!
//! Every Avalanche key derives from the EVM-path secp256k1 key; the bech
//! addresses hash its public key (SHA-256 then RIPEMD-160) and wrap it in
//! `C-avax1…` / `P-avax1…`. Exported transactions arrive as JSON
//! `{txBytes, signatureIndices?}`; each credential gets a recoverable
//! signature over sha256(txBytes), appended in index order so the output
//! is byte-identical across runs.

use async_trait::async_trait;
use bech32::{ToBase32, Variant};
use ethers::core::utils::to_checksum;
use ethers::signers::Signer as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::{MnemonicOptions, WalletOptions};
use crate::core::wallet::{AdditionalAddresses, AddressValue, SigningWallet};
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::paths::path_for;
use crate::crypto::secp256k1::Secp256k1Key;

const HRP: &str = "avax";

fn evm_path_key(opts: &MnemonicOptions) -> Result<Secp256k1Key, SignerError> {
    let path = match &opts.derivation_path_override {
        Some(path) => path.clone(),
        None => path_for(opts.wallet_kind, Network::AvalancheC, opts.index)?,
    };
    let seed = seed_from_mnemonic(&opts.mnemonic)?;
    Secp256k1Key::derive(&seed[..], &path)
}

fn format_chain_address(chain: char, hash: &[u8; 20]) -> Result<String, SignerError> {
    let encoded = bech32::encode(HRP, hash.to_base32(), Variant::Bech32)
        .map_err(|e| SignerError::KeyDerivation(format!("bech32: {e}")))?;
    Ok(format!("{chain}-{encoded}"))
}

/// C- and P-chain bech addresses for the EVM-path key.
pub(crate) fn bech_addresses(opts: &MnemonicOptions) -> Result<(String, String), SignerError> {
    let key = evm_path_key(opts)?;
    let hash = key.public_key_hash160();
    Ok((
        format_chain_address('C', &hash)?,
        format_chain_address('P', &hash)?,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnsignedExport {
    /// Hex (0x-optional) bytes of the unsigned transaction.
    tx_bytes: String,
    /// One entry per required credential; defaults to a single credential.
    #[serde(default)]
    signature_indices: Option<Vec<u32>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Credential {
    signatures: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedExport {
    tx_bytes: String,
    credentials: Vec<Credential>,
}

struct AvalancheWallet {
    network: Network,
    key: Secp256k1Key,
    ethereum_address: String,
    c_address: String,
    p_address: String,
}

#[async_trait]
impl SigningWallet for AvalancheWallet {
    async fn address(&self) -> Result<String, SignerError> {
        // Primary address is the EVM one, as the original exposes it.
        Ok(self.ethereum_address.clone())
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        let mut additional = AdditionalAddresses::new();
        additional.insert("cAddressBech", AddressValue::Single(self.c_address.clone()));
        additional.insert("pAddressBech", AddressValue::Single(self.p_address.clone()));
        Ok(additional)
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let unsigned: UnsignedExport = serde_json::from_str(raw)
            .map_err(|e| SignerError::payload(self.network, format!("export tx: {e}")))?;

        let tx_hex = unsigned.tx_bytes.trim_start_matches("0x");
        let tx_bytes = hex::decode(tx_hex)
            .map_err(|e| SignerError::payload(self.network, format!("txBytes hex: {e}")))?;

        let digest: [u8; 32] = Sha256::digest(&tx_bytes).into();
        let signature = self.key.sign_digest_recoverable(&digest)?;
        let signature_hex = format!("0x{}", hex::encode(signature));

        let credential_count = unsigned
            .signature_indices
            .as_ref()
            .map(|indices| indices.len().max(1))
            .unwrap_or(1);

        let signed = SignedExport {
            tx_bytes: format!("0x{tx_hex}"),
            credentials: (0..credential_count)
                .map(|_| Credential {
                    signatures: vec![signature_hex.clone()],
                })
                .collect(),
        };

        serde_json::to_string(&signed)
            .map_err(|e| SignerError::payload(self.network, format!("serialize: {e}")))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building Avalanche signing wallet");
    let opts = options.require_mnemonic(network)?;

    let key = evm_path_key(opts)?;
    let ethereum_address = {
        let signer = ethers::signers::LocalWallet::from(key.signing_key().clone());
        to_checksum(&signer.address(), None)
    };
    let hash = key.public_key_hash160();

    Ok(Box::new(AvalancheWallet {
        network,
        ethereum_address,
        c_address: format_chain_address('C', &hash)?,
        p_address: format_chain_address('P', &hash)?,
        key,
    }))
}
