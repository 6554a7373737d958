//! Solana factory.
//!
//! Payloads are hex legacy wire transactions. Signing slots this wallet's
//! signature into its required-signer position; when the transaction
//! touches the stake program, the ten deterministically derived sibling
//! accounts (stake 1–5, lido 6–10) co-sign for every slot they appear in,
//! in required-signer order, so the output is byte-identical across runs.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::{AdditionalAddresses, AddressValue, SigningWallet};
use crate::crypto::ed25519::Ed25519Key;
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::path::increment_derivation_path;
use crate::crypto::paths::path_for;

#[cfg(feature = "ledger")]
use crate::core::options::{LedgerApp, LedgerOptions};
#[cfg(feature = "ledger")]
use crate::hardware::ledger::LedgerSolanaApp;

/// `Stake11111111111111111111111111111111111111`
const STAKE_PROGRAM_ID: &str = "Stake11111111111111111111111111111111111111";

const STAKE_ACCOUNT_INDICES: [u32; 5] = [1, 2, 3, 4, 5];
const LIDO_STAKE_ACCOUNT_INDICES: [u32; 5] = [6, 7, 8, 9, 10];

// --- wire format -----------------------------------------------------------

/// Legacy wire transaction: shortvec of signatures followed by the
/// compiled message.
struct WireTransaction {
    signatures: Vec<[u8; 64]>,
    message: Vec<u8>,
}

struct CompiledMessage {
    num_required_signatures: usize,
    account_keys: Vec<[u8; 32]>,
    /// Program id per instruction, resolved through the key table.
    program_ids: Vec<[u8; 32]>,
}

fn decode_shortvec(data: &[u8], cursor: &mut usize) -> Result<usize, SignerError> {
    let mut len = 0usize;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(*cursor)
            .ok_or_else(|| SignerError::SigningFailed("truncated shortvec".to_string()))?;
        *cursor += 1;
        len |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            return Ok(len);
        }
        shift += 7;
        if shift > 14 {
            return Err(SignerError::SigningFailed("oversized shortvec".to_string()));
        }
    }
}

fn encode_shortvec(len: usize, out: &mut Vec<u8>) {
    let mut rem = len;
    loop {
        let mut byte = (rem & 0x7F) as u8;
        rem >>= 7;
        if rem != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if rem == 0 {
            return;
        }
    }
}

fn take<'a>(data: &'a [u8], cursor: &mut usize, n: usize) -> Result<&'a [u8], SignerError> {
    let slice = data
        .get(*cursor..*cursor + n)
        .ok_or_else(|| SignerError::SigningFailed("truncated transaction".to_string()))?;
    *cursor += n;
    Ok(slice)
}

impl WireTransaction {
    fn decode(network: Network, bytes: &[u8]) -> Result<Self, SignerError> {
        let mut cursor = 0usize;
        let sig_count = decode_shortvec(bytes, &mut cursor)
            .map_err(|_| SignerError::payload(network, "truncated signature table"))?;
        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            let mut sig = [0u8; 64];
            sig.copy_from_slice(
                take(bytes, &mut cursor, 64)
                    .map_err(|_| SignerError::payload(network, "truncated signature"))?,
            );
            signatures.push(sig);
        }
        let message = bytes[cursor..].to_vec();
        if message.is_empty() {
            return Err(SignerError::payload(network, "empty message"));
        }
        Ok(Self {
            signatures,
            message,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.signatures.len() * 64 + self.message.len());
        encode_shortvec(self.signatures.len(), &mut out);
        for sig in &self.signatures {
            out.extend_from_slice(sig);
        }
        out.extend_from_slice(&self.message);
        out
    }
}

impl CompiledMessage {
    fn decode(network: Network, message: &[u8]) -> Result<Self, SignerError> {
        if message.first().is_some_and(|b| b & 0x80 != 0) {
            return Err(SignerError::UnsupportedSigningMode(
                "versioned Solana transactions are not supported".to_string(),
            ));
        }

        let mut cursor = 0usize;
        let header = take(message, &mut cursor, 3)
            .map_err(|_| SignerError::payload(network, "truncated message header"))?;
        let num_required_signatures = header[0] as usize;

        let key_count = decode_shortvec(message, &mut cursor)
            .map_err(|_| SignerError::payload(network, "truncated key table"))?;
        let mut account_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            let mut key = [0u8; 32];
            key.copy_from_slice(
                take(message, &mut cursor, 32)
                    .map_err(|_| SignerError::payload(network, "truncated account key"))?,
            );
            account_keys.push(key);
        }

        // recent blockhash
        take(message, &mut cursor, 32)
            .map_err(|_| SignerError::payload(network, "truncated blockhash"))?;

        let instruction_count = decode_shortvec(message, &mut cursor)
            .map_err(|_| SignerError::payload(network, "truncated instructions"))?;
        let mut program_ids = Vec::with_capacity(instruction_count);
        for _ in 0..instruction_count {
            let program_index = take(message, &mut cursor, 1)
                .map_err(|_| SignerError::payload(network, "truncated instruction"))?[0]
                as usize;
            let accounts = decode_shortvec(message, &mut cursor)
                .map_err(|_| SignerError::payload(network, "truncated instruction accounts"))?;
            take(message, &mut cursor, accounts)
                .map_err(|_| SignerError::payload(network, "truncated instruction accounts"))?;
            let data_len = decode_shortvec(message, &mut cursor)
                .map_err(|_| SignerError::payload(network, "truncated instruction data"))?;
            take(message, &mut cursor, data_len)
                .map_err(|_| SignerError::payload(network, "truncated instruction data"))?;

            let program_id = account_keys.get(program_index).ok_or_else(|| {
                SignerError::payload(network, "instruction program index out of range")
            })?;
            program_ids.push(*program_id);
        }

        Ok(Self {
            num_required_signatures,
            account_keys,
            program_ids,
        })
    }

    fn required_signers(&self) -> &[[u8; 32]] {
        &self.account_keys[..self.num_required_signatures.min(self.account_keys.len())]
    }
}

/// The explicit auxiliary-signer predicate: a stake-program instruction is
/// present. Whether a given sibling actually signs is then decided by its
/// membership in the required-signer set.
fn touches_stake_program(message: &CompiledMessage) -> bool {
    static STAKE_PROGRAM_KEY: Lazy<[u8; 32]> = Lazy::new(|| {
        bs58::decode(STAKE_PROGRAM_ID)
            .into_vec()
            .expect("static program id")
            .try_into()
            .expect("static program id length")
    });
    message.program_ids.iter().any(|id| *id == *STAKE_PROGRAM_KEY)
}

// --- signer ----------------------------------------------------------------

enum SolanaSigner {
    Software(Ed25519Key),
    #[cfg(feature = "ledger")]
    Ledger(LedgerSolanaApp),
}

impl SolanaSigner {
    async fn public_key(&self) -> Result<[u8; 32], SignerError> {
        match self {
            SolanaSigner::Software(key) => Ok(key.public_key_bytes()),
            #[cfg(feature = "ledger")]
            SolanaSigner::Ledger(app) => app.get_public_key().await,
        }
    }

    async fn sign(&self, message: &[u8]) -> Result<[u8; 64], SignerError> {
        match self {
            SolanaSigner::Software(key) => Ok(key.sign(message)),
            #[cfg(feature = "ledger")]
            SolanaSigner::Ledger(app) => app.sign_message(message).await,
        }
    }
}

fn signer_for(options: &WalletOptions) -> Result<SolanaSigner, SignerError> {
    match options {
        WalletOptions::Mnemonic(opts) => {
            let path = match &opts.derivation_path_override {
                Some(path) => path.clone(),
                None => path_for(opts.wallet_kind, Network::Solana, opts.index)?,
            };
            let seed = seed_from_mnemonic(&opts.mnemonic)?;
            Ok(SolanaSigner::Software(Ed25519Key::derive(&seed[..], &path)?))
        }
        #[cfg(feature = "ledger")]
        WalletOptions::Ledger(LedgerOptions { transport, config }) => {
            let path = config.derivation_path(LedgerApp::Solana)?;
            Ok(SolanaSigner::Ledger(LedgerSolanaApp::new(
                transport.clone(),
                path,
            )?))
        }
    }
}

/// Options for the sibling account at `offset` (stake/lido sub-wallets).
fn sibling_options(options: &WalletOptions, offset: u32) -> Result<WalletOptions, SignerError> {
    match options {
        WalletOptions::Mnemonic(opts) => {
            let base = match &opts.derivation_path_override {
                Some(path) => path.clone(),
                None => path_for(opts.wallet_kind, Network::Solana, opts.index)?,
            };
            let path = increment_derivation_path(&base, offset)?;
            Ok(WalletOptions::Mnemonic(opts.with_path_override(path)))
        }
        #[cfg(feature = "ledger")]
        WalletOptions::Ledger(LedgerOptions { transport, config }) => {
            let base = config.derivation_path(LedgerApp::Solana)?;
            let path = increment_derivation_path(&format!("{base}/0"), offset)?;
            let config = crate::core::options::LedgerConfig::new()
                .with_app(LedgerApp::Solana, path);
            Ok(WalletOptions::Ledger(LedgerOptions {
                transport: transport.clone(),
                config,
            }))
        }
    }
}

struct SolanaWallet {
    network: Network,
    base: SolanaSigner,
    options: WalletOptions,
}

impl SolanaWallet {
    fn sibling_signer(&self, offset: u32) -> Result<SolanaSigner, SignerError> {
        signer_for(&sibling_options(&self.options, offset)?)
    }

    /// Sibling derivations are pure given (seed, path), so they can run
    /// concurrently; the transport lock still serializes hardware fetches.
    async fn sibling_addresses(&self, indices: &[u32]) -> Result<Vec<String>, SignerError> {
        let signers = indices
            .iter()
            .map(|offset| self.sibling_signer(*offset))
            .collect::<Result<Vec<_>, _>>()?;
        let keys = futures::future::try_join_all(
            signers.iter().map(|signer| signer.public_key()),
        )
        .await?;
        Ok(keys
            .into_iter()
            .map(|key| bs58::encode(key).into_string())
            .collect())
    }

    /// Apply co-signatures from every derived sibling that appears among
    /// the message's required signers.
    async fn co_sign(
        &self,
        tx: &mut WireTransaction,
        message: &CompiledMessage,
    ) -> Result<(), SignerError> {
        let signers = message.required_signers();
        for offset in STAKE_ACCOUNT_INDICES.iter().chain(&LIDO_STAKE_ACCOUNT_INDICES) {
            let signer = self.sibling_signer(*offset)?;
            let public_key = signer.public_key().await?;
            if let Some(position) = signers.iter().position(|k| *k == public_key) {
                debug!(offset, position, "stake sibling co-signing");
                tx.signatures[position] = signer.sign(&tx.message).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SigningWallet for SolanaWallet {
    async fn address(&self) -> Result<String, SignerError> {
        Ok(bs58::encode(self.base.public_key().await?).into_string())
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        let mut additional = AdditionalAddresses::new();
        additional.insert(
            "stakeAccounts",
            AddressValue::Many(self.sibling_addresses(&STAKE_ACCOUNT_INDICES).await?),
        );
        additional.insert(
            "lidoStakeAccounts",
            AddressValue::Many(self.sibling_addresses(&LIDO_STAKE_ACCOUNT_INDICES).await?),
        );
        Ok(additional)
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let bytes = hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| SignerError::payload(self.network, format!("transaction hex: {e}")))?;
        let mut tx = WireTransaction::decode(self.network, &bytes)?;
        let message = CompiledMessage::decode(self.network, &tx.message)?;

        // The signature table always spans every required signer.
        if tx.signatures.len() < message.num_required_signatures {
            tx.signatures
                .resize(message.num_required_signatures, [0u8; 64]);
        }

        let public_key = self.base.public_key().await?;
        let position = message
            .required_signers()
            .iter()
            .position(|k| *k == public_key)
            .ok_or_else(|| {
                SignerError::payload(self.network, "wallet is not a required signer")
            })?;
        tx.signatures[position] = self.base.sign(&tx.message).await?;

        if touches_stake_program(&message) {
            info!("stake program transaction — gathering sibling witnesses");
            self.co_sign(&mut tx, &message).await?;
        }

        Ok(hex::encode(tx.encode()))
    }
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building Solana signing wallet");
    let base = signer_for(&options)?;
    Ok(Box::new(SolanaWallet {
        network,
        base,
        options,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::{MnemonicOptions, WalletKind};

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn options() -> WalletOptions {
        WalletOptions::Mnemonic(MnemonicOptions::new(TEST_MNEMONIC, WalletKind::Omni, 0))
    }

    /// Build a minimal legacy message: `signer_keys` then `programs`,
    /// one instruction per program.
    fn build_message(signer_keys: &[[u8; 32]], programs: &[[u8; 32]]) -> Vec<u8> {
        let mut message = vec![signer_keys.len() as u8, 0, programs.len() as u8];
        encode_shortvec(signer_keys.len() + programs.len(), &mut message);
        for key in signer_keys.iter().chain(programs) {
            message.extend_from_slice(key);
        }
        message.extend_from_slice(&[0x11; 32]); // blockhash
        encode_shortvec(programs.len(), &mut message);
        for (i, _) in programs.iter().enumerate() {
            message.push((signer_keys.len() + i) as u8); // program index
            encode_shortvec(1, &mut message);
            message.push(0);
            encode_shortvec(2, &mut message);
            message.extend_from_slice(&[0xAA, 0xBB]);
        }
        message
    }

    fn build_unsigned(signer_keys: &[[u8; 32]], programs: &[[u8; 32]]) -> String {
        let message = build_message(signer_keys, programs);
        let tx = WireTransaction {
            signatures: vec![[0u8; 64]; signer_keys.len()],
            message,
        };
        hex::encode(tx.encode())
    }

    fn stake_program_key() -> [u8; 32] {
        bs58::decode(STAKE_PROGRAM_ID)
            .into_vec()
            .unwrap()
            .try_into()
            .unwrap()
    }

    async fn base_pubkey() -> [u8; 32] {
        signer_for(&options()).unwrap().public_key().await.unwrap()
    }

    #[tokio::test]
    async fn test_address_is_base58_pubkey() {
        let wallet = signing_wallet(Network::Solana, options()).await.unwrap();
        let address = wallet.address().await.unwrap();
        let decoded = bs58::decode(&address).into_vec().unwrap();
        assert_eq!(decoded.len(), 32);
        assert_eq!(address, wallet.address().await.unwrap());
    }

    #[tokio::test]
    async fn test_ten_sibling_accounts_exposed() {
        let wallet = signing_wallet(Network::Solana, options()).await.unwrap();
        let additional = wallet.additional_addresses().await.unwrap();
        let stake = match additional.get("stakeAccounts").unwrap() {
            AddressValue::Many(v) => v.clone(),
            other => panic!("unexpected: {other:?}"),
        };
        let lido = match additional.get("lidoStakeAccounts").unwrap() {
            AddressValue::Many(v) => v.clone(),
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(stake.len(), 5);
        assert_eq!(lido.len(), 5);
        // all eleven addresses (base + siblings) pairwise distinct
        let mut all = stake;
        all.extend(lido);
        all.push(wallet.address().await.unwrap());
        let unique: std::collections::BTreeSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 11);
    }

    #[tokio::test]
    async fn test_sign_simple_transfer() {
        let wallet = signing_wallet(Network::Solana, options()).await.unwrap();
        let raw = build_unsigned(&[base_pubkey().await], &[[3u8; 32]]);
        let signed = wallet.sign_transaction(&raw).await.unwrap();

        let bytes = hex::decode(&signed).unwrap();
        let tx = WireTransaction::decode(Network::Solana, &bytes).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert_ne!(tx.signatures[0], [0u8; 64]);
        assert_eq!(signed, wallet.sign_transaction(&raw).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_signer_payload_rejected() {
        let wallet = signing_wallet(Network::Solana, options()).await.unwrap();
        let raw = build_unsigned(&[[9u8; 32]], &[[3u8; 32]]);
        let err = wallet.sign_transaction(&raw).await.unwrap_err();
        assert!(matches!(err, SignerError::InvalidPayload { .. }));
    }

    #[tokio::test]
    async fn test_stake_transaction_gathers_sibling_witness() {
        let wallet = signing_wallet(Network::Solana, options()).await.unwrap();

        // Require the base wallet plus stake sibling #1 as signers.
        let sibling = signer_for(&sibling_options(&options(), 1).unwrap()).unwrap();
        let sibling_key = sibling.public_key().await.unwrap();
        let raw = build_unsigned(&[base_pubkey().await, sibling_key], &[stake_program_key()]);

        let signed = wallet.sign_transaction(&raw).await.unwrap();
        let tx = WireTransaction::decode(Network::Solana, &hex::decode(signed).unwrap()).unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert_ne!(tx.signatures[0], [0u8; 64], "base signature missing");
        assert_ne!(tx.signatures[1], [0u8; 64], "sibling witness missing");
    }

    #[tokio::test]
    async fn test_non_stake_transaction_leaves_other_slots_empty() {
        let wallet = signing_wallet(Network::Solana, options()).await.unwrap();
        let sibling = signer_for(&sibling_options(&options(), 1).unwrap()).unwrap();
        let sibling_key = sibling.public_key().await.unwrap();
        // Same two signers, but no stake instruction → sibling must not sign.
        let raw = build_unsigned(&[base_pubkey().await, sibling_key], &[[3u8; 32]]);
        let signed = wallet.sign_transaction(&raw).await.unwrap();
        let tx = WireTransaction::decode(Network::Solana, &hex::decode(signed).unwrap()).unwrap();
        assert_eq!(tx.signatures[1], [0u8; 64]);
    }

    #[tokio::test]
    async fn test_versioned_transaction_unsupported() {
        let wallet = signing_wallet(Network::Solana, options()).await.unwrap();
        let mut message = vec![0x80]; // version prefix
        message.extend_from_slice(&[0u8; 40]);
        let tx = WireTransaction {
            signatures: vec![[0u8; 64]],
            message,
        };
        let err = wallet
            .sign_transaction(&hex::encode(tx.encode()))
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::UnsupportedSigningMode(_)));
    }

    #[test]
    fn test_shortvec_roundtrip() {
        for len in [0usize, 1, 127, 128, 300, 16383] {
            let mut buf = Vec::new();
            encode_shortvec(len, &mut buf);
            let mut cursor = 0;
            assert_eq!(decode_shortvec(&buf, &mut cursor).unwrap(), len);
            assert_eq!(cursor, buf.len());
        }
    }
}
