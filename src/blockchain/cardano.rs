//! Cardano factory (Shelley, CIP-1852 keys).
//!
//! The payload is the hex CBOR of an unsigned transaction array
//! `[body, witness_set, …]`. The body hash (blake2b-256 of the body CBOR)
//! is signed by the payment key always, and by the stake key as well
//! whenever the body carries certificates or withdrawals — both vkey
//! witnesses land in the witness set or the call fails; a partial witness
//! set is never returned. Witness order is payment-then-stake, stable
//! across runs.
//!
//! Addresses are mainnet base addresses: blake2b-224 payment and stake
//! key hashes under the 0x01 header, bech32 `addr…`.

use async_trait::async_trait;
use bech32::{ToBase32, Variant};
use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use ciborium::value::Value;
use tracing::{debug, info};

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::{MnemonicOptions, WalletOptions};
use crate::core::wallet::{AdditionalAddresses, SigningWallet};
use crate::crypto::ed25519_bip32::XPrv;
use crate::crypto::mnemonic::entropy_from_mnemonic;
use crate::crypto::path::DerivationPath;
use crate::crypto::paths::path_for;

const HEADER_BASE_MAINNET: u8 = 0x01;
const BODY_KEY_CERTIFICATES: u64 = 4;
const BODY_KEY_WITHDRAWALS: u64 = 5;
const WITNESS_KEY_VKEY: u64 = 0;

fn blake2b(data: &[u8], out_len: usize) -> Vec<u8> {
    let mut hasher = Blake2bVar::new(out_len).expect("valid blake2b length");
    hasher.update(data);
    let mut out = vec![0u8; out_len];
    hasher.finalize_variable(&mut out).expect("sized buffer");
    out
}

struct CardanoWallet {
    network: Network,
    payment: XPrv,
    stake: XPrv,
}

impl CardanoWallet {
    fn from_options(opts: &MnemonicOptions) -> Result<Self, SignerError> {
        let account_path = match &opts.derivation_path_override {
            Some(path) => path.clone(),
            None => path_for(opts.wallet_kind, Network::Cardano, opts.index)?,
        };
        let account_path: DerivationPath = account_path.parse()?;

        let entropy = entropy_from_mnemonic(&opts.mnemonic)?;
        let account = XPrv::from_entropy(&entropy, b"")?.derive_path(&account_path)?;

        let payment_branch: DerivationPath = "m/0/0".parse()?;
        let stake_branch: DerivationPath = "m/2/0".parse()?;
        Ok(Self {
            network: Network::Cardano,
            payment: account.derive_path(&payment_branch)?,
            stake: account.derive_path(&stake_branch)?,
        })
    }

    fn base_address(&self) -> Result<String, SignerError> {
        let mut payload = Vec::with_capacity(57);
        payload.push(HEADER_BASE_MAINNET);
        payload.extend_from_slice(&blake2b(&self.payment.public_key(), 28));
        payload.extend_from_slice(&blake2b(&self.stake.public_key(), 28));
        bech32::encode("addr", payload.to_base32(), Variant::Bech32)
            .map_err(|e| SignerError::KeyDerivation(format!("bech32: {e}")))
    }
}

/// Does this transaction body oblige the stake key to witness?
fn requires_stake_witness(body: &Value) -> bool {
    match body {
        Value::Map(entries) => entries.iter().any(|(key, _)| {
            matches!(key, Value::Integer(i)
                if *i == BODY_KEY_CERTIFICATES.into() || *i == BODY_KEY_WITHDRAWALS.into())
        }),
        _ => false,
    }
}

fn encode(value: &Value) -> Result<Vec<u8>, SignerError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| SignerError::SigningFailed(format!("cbor encode: {e}")))?;
    Ok(bytes)
}

#[async_trait]
impl SigningWallet for CardanoWallet {
    async fn address(&self) -> Result<String, SignerError> {
        self.base_address()
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(AdditionalAddresses::new())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let bytes = hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| SignerError::payload(self.network, format!("transaction hex: {e}")))?;
        let tx: Value = ciborium::de::from_reader(bytes.as_slice())
            .map_err(|e| SignerError::payload(self.network, format!("transaction cbor: {e}")))?;

        let mut elements = match tx {
            Value::Array(elements) if elements.len() >= 2 => elements,
            _ => {
                return Err(SignerError::payload(
                    self.network,
                    "expected [body, witness_set, …] array",
                ))
            }
        };

        let body_bytes = encode(&elements[0])?;
        let body_hash = blake2b(&body_bytes, 32);

        // payment witness always; stake witness whenever the body demands it
        let mut witnesses = vec![(&self.payment, "payment")];
        if requires_stake_witness(&elements[0]) {
            witnesses.push((&self.stake, "stake"));
        }

        let vkey_witnesses: Vec<Value> = witnesses
            .iter()
            .map(|(key, role)| {
                debug!(role, "adding vkey witness");
                Value::Array(vec![
                    Value::Bytes(key.public_key().to_vec()),
                    Value::Bytes(key.sign(&body_hash).to_vec()),
                ])
            })
            .collect();

        match &mut elements[1] {
            Value::Map(entries) => {
                entries.retain(|(key, _)| {
                    !matches!(key, Value::Integer(i) if *i == WITNESS_KEY_VKEY.into())
                });
                entries.insert(
                    0,
                    (
                        Value::Integer(WITNESS_KEY_VKEY.into()),
                        Value::Array(vkey_witnesses),
                    ),
                );
            }
            _ => {
                return Err(SignerError::payload(
                    self.network,
                    "witness set must be a map",
                ))
            }
        }

        Ok(hex::encode(encode(&Value::Array(elements))?))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building Cardano signing wallet");
    let opts = options.require_mnemonic(network)?;
    Ok(Box::new(CardanoWallet::from_options(opts)?))
}
