//! EVM family factory: Ethereum, Polygon, Optimism, Arbitrum, Celo, BSC
//! and the Avalanche C-chain. One factory covers all of them; BSC and the
//! C-chain differ only in their additional addresses.
//!
//! Transactions arrive as the JSON form of an ethers typed transaction
//! and leave as the hex RLP signed encoding. Message signing supports
//! EIP-191 personal messages and, via a shape predicate, EIP-712 typed
//! data.

use async_trait::async_trait;
use ethers::core::utils::to_checksum;
use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::transaction::eip712::TypedData;
#[cfg(feature = "ledger")]
use ethers::types::Signature;
use tracing::{debug, info};

use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::{MnemonicOptions, WalletOptions};
use crate::core::wallet::{AdditionalAddresses, AddressValue, SigningWallet};
use crate::crypto::mnemonic::seed_from_mnemonic;
use crate::crypto::paths::path_for;
use crate::crypto::secp256k1::Secp256k1Key;

#[cfg(feature = "ledger")]
use crate::core::options::{LedgerApp, LedgerOptions};
#[cfg(feature = "ledger")]
use crate::hardware::ledger::LedgerEthereumApp;

/// EIP-712 typed-data message predicate: all four top-level properties
/// EIP-712 requires must be present. Decided here once, never inferred
/// by probing fields at call sites.
pub fn is_eip712_message(value: &serde_json::Value) -> bool {
    value.is_object()
        && value.get("types").is_some()
        && value.get("primaryType").is_some()
        && value.get("domain").is_some()
        && value.get("message").is_some()
}

/// Derive the ethers signer for an EVM network from software options.
pub(crate) fn local_wallet(
    network: Network,
    opts: &MnemonicOptions,
) -> Result<LocalWallet, SignerError> {
    let path = match &opts.derivation_path_override {
        Some(path) => path.clone(),
        None => path_for(opts.wallet_kind, network, opts.index)?,
    };
    let seed = seed_from_mnemonic(&opts.mnemonic)?;
    let key = Secp256k1Key::derive(&seed[..], &path)?;
    Ok(LocalWallet::from(key.signing_key().clone()))
}

struct EvmSoftwareWallet {
    network: Network,
    signer: LocalWallet,
    additional: AdditionalAddresses,
}

#[async_trait]
impl SigningWallet for EvmSoftwareWallet {
    async fn address(&self) -> Result<String, SignerError> {
        Ok(to_checksum(&self.signer.address(), None))
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(self.additional.clone())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let tx: TypedTransaction = serde_json::from_str(raw)
            .map_err(|e| SignerError::payload(self.network, format!("typed transaction: {e}")))?;

        let signature = self
            .signer
            .sign_transaction(&tx)
            .await
            .map_err(|e| SignerError::SigningFailed(format!("evm: {e}")))?;

        let signed = tx.rlp_signed(&signature);
        debug!(network = %self.network, bytes = signed.len(), "evm transaction signed");
        Ok(format!("0x{}", hex::encode(signed)))
    }

    async fn sign_message(&self, raw: &str) -> Result<String, SignerError> {
        // Typed data first; everything else is a personal message.
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
            if is_eip712_message(&value) {
                let typed: TypedData = serde_json::from_value(value).map_err(|e| {
                    SignerError::payload(self.network, format!("eip712 payload: {e}"))
                })?;
                let signature = self
                    .signer
                    .sign_typed_data(&typed)
                    .await
                    .map_err(|e| SignerError::SigningFailed(format!("eip712: {e}")))?;
                return Ok(format!("0x{signature}"));
            }
        }

        let signature = self
            .signer
            .sign_message(raw.as_bytes())
            .await
            .map_err(|e| SignerError::SigningFailed(format!("personal message: {e}")))?;
        Ok(format!("0x{signature}"))
    }
}

#[cfg(feature = "ledger")]
struct EvmLedgerWallet {
    network: Network,
    app: LedgerEthereumApp,
}

#[cfg(feature = "ledger")]
impl EvmLedgerWallet {
    fn signature_from_parts(
        tx: &TypedTransaction,
        v: u8,
        r: [u8; 32],
        s: [u8; 32],
    ) -> Signature {
        let parity = match v {
            0 | 1 => v as u64,
            27 | 28 => (v - 27) as u64,
            _ => (v as u64).wrapping_sub(35) % 2,
        };
        // Legacy transactions with a chain id re-expand to the EIP-155
        // value (the device truncates it to one byte); typed transactions
        // take plain 27/28.
        let v = match (tx, tx.chain_id()) {
            (TypedTransaction::Legacy(_), Some(chain_id)) => chain_id.as_u64() * 2 + 35 + parity,
            _ => 27 + parity,
        };
        Signature {
            r: ethers::types::U256::from_big_endian(&r),
            s: ethers::types::U256::from_big_endian(&s),
            v,
        }
    }
}

#[cfg(feature = "ledger")]
#[async_trait]
impl SigningWallet for EvmLedgerWallet {
    async fn address(&self) -> Result<String, SignerError> {
        let (_public_key, address) = self.app.get_address().await?;
        Ok(address)
    }

    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError> {
        Ok(AdditionalAddresses::new())
    }

    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError> {
        let tx: TypedTransaction = serde_json::from_str(raw)
            .map_err(|e| SignerError::payload(self.network, format!("typed transaction: {e}")))?;

        let unsigned_rlp = tx.rlp();
        let (v, r, s) = self.app.sign_transaction(&unsigned_rlp).await?;
        let signature = Self::signature_from_parts(&tx, v, r, s);

        let signed = tx.rlp_signed(&signature);
        Ok(format!("0x{}", hex::encode(signed)))
    }

    async fn sign_message(&self, raw: &str) -> Result<String, SignerError> {
        let (v, r, s) = self.app.sign_personal_message(raw.as_bytes()).await?;
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&r);
        bytes[32..64].copy_from_slice(&s);
        bytes[64] = v;
        Ok(format!("0x{}", hex::encode(bytes)))
    }
}

/// Secondary addresses for the EVM networks that carry them.
fn software_additional(
    network: Network,
    opts: &MnemonicOptions,
) -> Result<AdditionalAddresses, SignerError> {
    let mut additional = AdditionalAddresses::new();
    match network {
        Network::AvalancheC => {
            let (c, p) = super::avalanche::bech_addresses(opts)?;
            additional.insert("cAddressBech", AddressValue::Single(c));
            additional.insert("pAddressBech", AddressValue::Single(p));
        }
        Network::Binance => match super::binance::beacon_address(opts) {
            Ok(beacon) => {
                additional.insert("binanceBeaconAddress", AddressValue::Single(beacon));
            }
            // Wallet kinds without a Beacon derivation still sign on BSC;
            // they simply have no secondary address to expose.
            Err(SignerError::UnsupportedDerivation { .. }) => {}
            Err(e) => return Err(e),
        },
        _ => {}
    }
    Ok(additional)
}

/// Whether this EVM network has a hardware path. BSC and the C-chain
/// additional addresses have no ledger derivation, so those networks stay
/// software-only (matching the sibling-wallet behaviour they depend on).
fn ledger_capable(network: Network) -> bool {
    !matches!(network, Network::Binance | Network::AvalancheC)
}

pub(crate) async fn signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    info!(network = %network, "building EVM signing wallet");
    match options {
        WalletOptions::Mnemonic(opts) => {
            let signer = local_wallet(network, &opts)?;
            let additional = software_additional(network, &opts)?;
            Ok(Box::new(EvmSoftwareWallet {
                network,
                signer,
                additional,
            }))
        }
        #[cfg(feature = "ledger")]
        WalletOptions::Ledger(LedgerOptions { transport, config }) => {
            if !ledger_capable(network) {
                return Err(SignerError::LedgerNotSupported(network));
            }
            let path = config.derivation_path(LedgerApp::Ethereum)?;
            let app = LedgerEthereumApp::new(transport, path)?;
            Ok(Box::new(EvmLedgerWallet { network, app }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::WalletKind;
    use serde_json::json;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn options(index: u32) -> WalletOptions {
        WalletOptions::Mnemonic(MnemonicOptions::new(TEST_MNEMONIC, WalletKind::Omni, index))
    }

    #[test]
    fn test_eip712_predicate() {
        let typed = json!({
            "types": {}, "primaryType": "Mail", "domain": {}, "message": {}
        });
        assert!(is_eip712_message(&typed));

        let partial = json!({ "types": {}, "domain": {} });
        assert!(!is_eip712_message(&partial));
        assert!(!is_eip712_message(&json!("just a string")));
    }

    #[tokio::test]
    async fn test_known_address_for_reference_mnemonic() {
        let wallet = signing_wallet(Network::Ethereum, options(0)).await.unwrap();
        assert_eq!(
            wallet.address().await.unwrap(),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }

    #[tokio::test]
    async fn test_index_one_yields_known_sibling() {
        let wallet = signing_wallet(Network::Ethereum, options(1)).await.unwrap();
        assert_eq!(
            wallet.address().await.unwrap(),
            "0x6Fac4D18c912343BF86fa7049364Dd4E424Ab9C0"
        );
    }

    #[tokio::test]
    async fn test_plain_evm_has_no_additional_addresses() {
        let wallet = signing_wallet(Network::Polygon, options(0)).await.unwrap();
        assert!(wallet.additional_addresses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sign_legacy_transaction() {
        let wallet = signing_wallet(Network::Ethereum, options(0)).await.unwrap();
        let raw = json!({
            "to": "0x9858EfFD232B4033E47d90003D41EC34EcaEda94",
            "value": "0xde0b6b3a7640000",
            "gas": "0x5208",
            "gasPrice": "0x3b9aca00",
            "nonce": "0x0",
            "chainId": "0x1"
        })
        .to_string();
        let signed = wallet.sign_transaction(&raw).await.unwrap();
        assert!(signed.starts_with("0x"));
        // Deterministic: RFC-6979 signatures reproduce byte-for-byte.
        assert_eq!(signed, wallet.sign_transaction(&raw).await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_transaction_rejects_garbage() {
        let wallet = signing_wallet(Network::Ethereum, options(0)).await.unwrap();
        let err = wallet.sign_transaction("not json").await.unwrap_err();
        assert!(matches!(err, SignerError::InvalidPayload { .. }));
    }

    #[tokio::test]
    async fn test_personal_message_signature_shape() {
        let wallet = signing_wallet(Network::Ethereum, options(0)).await.unwrap();
        let signature = wallet.sign_message("hello").await.unwrap();
        assert!(signature.starts_with("0x"));
        assert_eq!(signature.len(), 2 + 130);
    }

    #[cfg(feature = "ledger")]
    #[test]
    fn test_legacy_eip155_v_expansion() {
        let tx: TypedTransaction = serde_json::from_value(json!({
            "to": "0x9858EfFD232B4033E47d90003D41EC34EcaEda94",
            "chainId": "0x89"
        }))
        .unwrap();
        let signature =
            EvmLedgerWallet::signature_from_parts(&tx, 36, [1u8; 32], [2u8; 32]);
        // chain 137 → 137*2 + 35 + parity(1)
        assert_eq!(signature.v, 137 * 2 + 35 + 1);
    }
}
