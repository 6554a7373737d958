//! Stellar factory (mainnet and testnet).
//!
//! The payload is the base64 XDR `TransactionEnvelope` (v1, not yet
//! signed). The signature base is sha256 of network id ‖ ENVELOPE_TYPE_TX
//! ‖ transaction XDR; the output envelope carries one decorated signature
//! (hint = trailing public key bytes). Addresses are strkeys: base32 of
//! version 0x30 ‖ public key ‖ CRC16 (little-endian).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tracing::info;

use super::codec::crc16_xmodem;
use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::{AdditionalAddresses, SigningWallet};
use crate::crypto::ed25519::Ed25519Key;
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::paths::path_for;

const PUBLIC_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";
const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// strkey version byte for ed25519 public keys ('G').
const VERSION_ACCOUNT: u8 = 6 << 3;

const ENVELOPE_TYPE_TX: [u8; 4] = [0, 0, 0, 2];

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for byte in data {
        buffer = (buffer << 8) | *byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize] as char);
    }
    out
}

fn strkey(public_key: &[u8; 32]) -> String {
    let mut data = Vec::with_capacity(35);
    data.push(VERSION_ACCOUNT);
    data.extend_from_slice(public_key);
    let crc = crc16_xmodem(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    base32_encode(&data)
}

fn network_passphrase(network: Network) -> Result<&'static str, SignerError> {
    match network {
        Network::Stellar => Ok(PUBLIC_PASSPHRASE),
        Network::StellarTestnet => Ok(TESTNET_PASSPHRASE),
        other => Err(SignerError::UnsupportedNetwork(format!(
            "unsupported Stellar network: {other}"
        ))),
    }
}

struct StellarWallet {
    network: Network,
    key: Ed25519Key,
    network_id: [u8; 32],
}

#[async_trait]
impl SigningWallet for StellarWallet {
    async fn address(&self) -> Result<String, SignerError> {
        Ok(strkey(&self.key.public_key_bytes()))
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(AdditionalAddresses::new())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let envelope = BASE64
            .decode(raw.trim())
            .map_err(|e| SignerError::payload(self.network, format!("envelope base64: {e}")))?;
        if envelope.len() < 8 || envelope[..4] != ENVELOPE_TYPE_TX {
            return Err(SignerError::payload(
                self.network,
                "expected an ENVELOPE_TYPE_TX v1 envelope",
            ));
        }
        if envelope[envelope.len() - 4..] != [0, 0, 0, 0] {
            return Err(SignerError::payload(
                self.network,
                "envelope already carries signatures",
            ));
        }
        let tx_xdr = &envelope[4..envelope.len() - 4];

        // signature base: network id ‖ envelope type ‖ transaction
        let mut base = Vec::with_capacity(36 + tx_xdr.len());
        base.extend_from_slice(&self.network_id);
        base.extend_from_slice(&ENVELOPE_TYPE_TX);
        base.extend_from_slice(tx_xdr);
        let digest: [u8; 32] = Sha256::digest(&base).into();
        let signature = self.key.sign(&digest);

        let public_key = self.key.public_key_bytes();
        let mut signed = Vec::with_capacity(envelope.len() + 76);
        signed.extend_from_slice(&ENVELOPE_TYPE_TX);
        signed.extend_from_slice(tx_xdr);
        signed.extend_from_slice(&1u32.to_be_bytes()); // one decorated signature
        signed.extend_from_slice(&public_key[28..]); // hint
        signed.extend_from_slice(&64u32.to_be_bytes());
        signed.extend_from_slice(&signature);

        Ok(BASE64.encode(signed))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building Stellar signing wallet");
    let passphrase = network_passphrase(network)?;
    let opts = options.require_mnemonic(network)?;

    let path = match &opts.derivation_path_override {
        Some(path) => path.clone(),
        None => path_for(opts.wallet_kind, network, opts.index)?,
    };
    let seed = seed_from_mnemonic(&opts.mnemonic)?;
    let key = Ed25519Key::derive(&seed[..], &path)?;
    Ok(Box::new(StellarWallet {
        network,
        key,
        network_id: Sha256::digest(passphrase.as_bytes()).into(),
    }))
}
