//! Cosmos SDK family factory (Cosmos Hub, Osmosis, Juno, Akash, Kava).
//!
//! Direct (protobuf) signing only: the payload is the hex `SignDoc`
//! exactly as the chain SDK serialized it, the output is the hex `TxRaw`
//! with body and auth bytes preserved byte-for-byte and one signature
//! appended. Amino/JSON documents fail `UnsupportedSigningMode`, matching
//! the original's direct-signer guard.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bech32::{ToBase32, Variant};
use prost::Message;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::{AdditionalAddresses, AddressValue, SigningWallet};
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::paths::path_for;
use crate::crypto::secp256k1::{hash160, Secp256k1Key};

#[cfg(feature = "ledger")]
use crate::core::options::{LedgerApp, LedgerOptions};
#[cfg(feature = "ledger")]
use crate::hardware::ledger::LedgerCosmosApp;

/// `cosmos.tx.v1beta1.SignDoc`
#[derive(Clone, PartialEq, Message)]
pub struct SignDoc {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(string, tag = "3")]
    pub chain_id: String,
    #[prost(uint64, tag = "4")]
    pub account_number: u64,
}

/// `cosmos.tx.v1beta1.TxRaw`
#[derive(Clone, PartialEq, Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

fn bech32_address(prefix: &str, compressed_pubkey: &[u8]) -> Result<String, SignerError> {
    let hash = hash160(compressed_pubkey);
    bech32::encode(prefix, hash.to_base32(), Variant::Bech32)
        .map_err(|e| SignerError::KeyDerivation(format!("bech32: {e}")))
}

fn decode_sign_doc(network: Network, raw: &str) -> Result<(Vec<u8>, SignDoc), SignerError> {
    // An amino/JSON sign doc is a different signing mode, not a payload bug.
    if raw.trim_start().starts_with('{') {
        return Err(SignerError::UnsupportedSigningMode(
            "only direct signing supported".to_string(),
        ));
    }

    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .map_err(|e| SignerError::payload(network, format!("sign doc hex: {e}")))?;
    let doc = SignDoc::decode(bytes.as_slice())
        .map_err(|e| SignerError::payload(network, format!("sign doc protobuf: {e}")))?;
    Ok((bytes, doc))
}

fn assemble_tx_raw(doc: &SignDoc, signature: &[u8]) -> String {
    let tx_raw = TxRaw {
        body_bytes: doc.body_bytes.clone(),
        auth_info_bytes: doc.auth_info_bytes.clone(),
        signatures: vec![signature.to_vec()],
    };
    hex::encode(tx_raw.encode_to_vec())
}

struct CosmosSoftwareWallet {
    network: Network,
    prefix: &'static str,
    key: Secp256k1Key,
}

#[async_trait]
impl SigningWallet for CosmosSoftwareWallet {
    async fn address(&self) -> Result<String, SignerError> {
        bech32_address(self.prefix, &self.key.public_key_compressed())
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        let mut additional = AdditionalAddresses::new();
        additional.insert(
            "cosmosPubKey",
            AddressValue::Single(BASE64.encode(self.key.public_key_compressed())),
        );
        Ok(additional)
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let (bytes, doc) = decode_sign_doc(self.network, raw)?;
        let digest: [u8; 32] = Sha256::digest(&bytes).into();
        let signature = self.key.sign_digest(&digest)?;
        Ok(assemble_tx_raw(&doc, &signature))
    }
}

#[cfg(feature = "ledger")]
struct CosmosLedgerWallet {
    network: Network,
    app: LedgerCosmosApp,
}

#[cfg(feature = "ledger")]
#[async_trait]
impl SigningWallet for CosmosLedgerWallet {
    async fn address(&self) -> Result<String, SignerError> {
        let (_public_key, address) = self.app.get_address().await?;
        Ok(address)
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        let (public_key, _address) = self.app.get_address().await?;
        let mut additional = AdditionalAddresses::new();
        additional.insert("cosmosPubKey", AddressValue::Single(BASE64.encode(public_key)));
        Ok(additional)
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let (bytes, doc) = decode_sign_doc(self.network, raw)?;
        let signature = self.app.sign(&bytes).await?;
        Ok(assemble_tx_raw(&doc, &signature))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    let prefix = network.bech32_prefix().ok_or_else(|| {
        SignerError::UnsupportedNetwork(format!("{network} is not a Cosmos SDK network"))
    })?;
    info!(network = %network, prefix, "building Cosmos signing wallet");

    match options {
        WalletOptions::Mnemonic(opts) => {
            let path = match &opts.derivation_path_override {
                Some(path) => path.clone(),
                None => path_for(opts.wallet_kind, network, opts.index)?,
            };
            let seed = seed_from_mnemonic(&opts.mnemonic)?;
            let key = Secp256k1Key::derive(&seed[..], &path)?;
            Ok(Box::new(CosmosSoftwareWallet {
                network,
                prefix,
                key,
            }))
        }
        #[cfg(feature = "ledger")]
        WalletOptions::Ledger(LedgerOptions { transport, config }) => {
            let path = config.derivation_path(LedgerApp::Cosmos)?;
            let app = LedgerCosmosApp::new(transport, path, prefix)?;
            Ok(Box::new(CosmosLedgerWallet { network, app }))
        }
    }
}
