//! Error types for wallet resolution and signing dispatch.

use thiserror::Error;

use crate::core::network::Network;

/// Crate-wide error type.
///
/// Every failure is terminal for the current call; nothing is retried
/// internally. Retry policy belongs to the caller (sensible for
/// `HardwareTimeout`, pointless for `InvalidMnemonic`).
#[derive(Debug, Error)]
pub enum SignerError {
    /// The mnemonic phrase failed wordlist or checksum validation.
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// No derivation path table entry for this (wallet kind, network) pair.
    #[error("No derivation path for wallet kind {kind} on network {network}")]
    UnsupportedDerivation { kind: &'static str, network: Network },

    /// Seed or path could not be turned into key material.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// The network identifier is not in the registry.
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// The factory could not produce a usable wallet from the options.
    #[error("Wallet not initialised: {0}")]
    WalletNotInitialized(String),

    /// The hardware device or app session is not usable.
    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// A hardware exchange exceeded its bounded timeout.
    #[error("Hardware exchange timed out after {0:?}")]
    HardwareTimeout(std::time::Duration),

    /// The network has no hardware signing path.
    #[error("Ledger mode is not supported for network {0}")]
    LedgerNotSupported(Network),

    /// The chain requires a signing mode this factory does not implement.
    #[error("Unsupported signing mode: {0}")]
    UnsupportedSigningMode(String),

    /// The opaque transaction payload did not match the network's format.
    #[error("Invalid payload for network {network}: {reason}")]
    InvalidPayload { network: Network, reason: String },

    /// Signature primitive failure (distinct from payload problems).
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

impl SignerError {
    /// Convenience constructor for payload errors.
    pub fn payload(network: Network, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            network,
            reason: reason.into(),
        }
    }

    /// Whether a caller-side retry can ever succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SignerError::HardwareTimeout(_) | SignerError::HardwareUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_network() {
        let err = SignerError::LedgerNotSupported(Network::Tron);
        assert!(format!("{}", err).contains("tron"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SignerError::HardwareTimeout(std::time::Duration::from_secs(30)).is_retryable());
        assert!(!SignerError::InvalidMnemonic("bad word".into()).is_retryable());
    }
}
