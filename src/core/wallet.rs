//! The uniform signing contract every per-network factory returns.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::core::errors::SignerError;

/// A secondary address entry: one string or an ordered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressValue {
    Single(String),
    Many(Vec<String>),
}

impl From<String> for AddressValue {
    fn from(s: String) -> Self {
        AddressValue::Single(s)
    }
}

impl From<Vec<String>> for AddressValue {
    fn from(v: Vec<String>) -> Self {
        AddressValue::Many(v)
    }
}

/// Secondary address material keyed by stable per-network names
/// (`cAddressBech`, `stakeAccounts`, ...). Ordered map so enumeration is
/// caller-independent; empty when a network defines no secondary
/// addresses — never absent.
pub type AdditionalAddresses = BTreeMap<&'static str, AddressValue>;

/// Uniform signing contract.
///
/// Implementations own either software key material or a hardware-adapter
/// handle, never the raw mnemonic. Methods are async because hardware
/// round-trips may suspend. `raw` payloads are opaque, network-specific
/// encoded strings owned by each chain's transaction library; the
/// implementation routes the right key to that encoding and reassembles
/// the signed artifact byte-for-byte as the chain expects.
#[async_trait]
pub trait SigningWallet: Send + Sync {
    /// Canonical primary address for the network.
    async fn address(&self) -> Result<String, SignerError>;

    /// Secondary address material; empty map when none exist.
    async fn additional_addresses(&self) -> Result<AdditionalAddresses, SignerError>;

    /// Sign an opaque encoded transaction, returning the signed artifact
    /// in the same chain-owned encoding. Either every required witness is
    /// present in the output or the call fails; partial signing never
    /// escapes.
    async fn sign_transaction(&self, raw: &str) -> Result<String, SignerError>;

    /// Arbitrary message signing, present only where the network supports
    /// it (EVM family).
    async fn sign_message(&self, raw: &str) -> Result<String, SignerError> {
        let _ = raw;
        Err(SignerError::UnsupportedSigningMode(
            "message signing is not supported on this network".to_string(),
        ))
    }
}
