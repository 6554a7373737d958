//! Transport boundary to a Ledger device.
//!
//! The caller owns session handling (USB/HID enumeration, opening a named
//! app) and hands this crate an object implementing `LedgerTransport`.
//! Every exchange is bounded by a timeout and the transport is locked for
//! the duration of one exchange — sequential use only, never concurrent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::apdu::{ApduCommand, ApduResponse};
use crate::core::errors::SignerError;
use crate::core::options::LedgerApp;

/// Default bound for one APDU round-trip (covers on-device confirmation).
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(90);

/// A framed request/response channel to an open Ledger app session.
#[async_trait]
pub trait LedgerTransport: Send {
    async fn exchange(&mut self, command: &ApduCommand) -> Result<ApduResponse, SignerError>;
}

/// Shared, exclusively-locked transport handle.
pub type SharedTransport = Arc<Mutex<dyn LedgerTransport>>;

/// Wrap any transport into the shared handle form the options take.
pub fn share<T: LedgerTransport + 'static>(transport: T) -> SharedTransport {
    Arc::new(Mutex::new(transport))
}

/// One exchange under the timeout bound. The transport lock is held for
/// the whole round-trip so a second caller can never interleave frames.
pub async fn exchange(
    transport: &SharedTransport,
    command: &ApduCommand,
    timeout: Duration,
) -> Result<ApduResponse, SignerError> {
    let mut guard = transport.lock().await;
    match tokio::time::timeout(timeout, guard.exchange(command)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("ledger exchange timed out after {timeout:?}");
            Err(SignerError::HardwareTimeout(timeout))
        }
    }
}

/// Unwrap a response's payload, mapping status words onto the error
/// taxonomy: wrong-app/locked-device codes are `HardwareUnavailable`,
/// anything else non-successful is `SigningFailed`.
pub fn require_success(response: ApduResponse) -> Result<Vec<u8>, SignerError> {
    if response.is_success() {
        return Ok(response.data);
    }
    let description = response.error_description();
    match response.status_code() {
        0x6D00 | 0x6E00 | 0x6982 => Err(SignerError::HardwareUnavailable(description)),
        _ => Err(SignerError::SigningFailed(format!(
            "ledger returned {:04X}: {description}",
            response.status_code()
        ))),
    }
}

/// Probe whether the expected app is open and answering on the transport.
///
/// Sends the app's cheap configuration/version instruction; any framed
/// answer with a success status counts as alive.
pub async fn is_app_open(transport: &SharedTransport, app: LedgerApp) -> bool {
    let command = match app {
        LedgerApp::Ethereum => ApduCommand::new(0xE0, 0x06, 0x00, 0x00, vec![]),
        LedgerApp::Solana => ApduCommand::new(0xE0, 0x04, 0x00, 0x00, vec![]),
        LedgerApp::Near => ApduCommand::new(0x80, 0x06, 0x00, 0x00, vec![]),
        LedgerApp::Cosmos => ApduCommand::new(0x55, 0x00, 0x00, 0x00, vec![]),
        // No adapter for the remaining apps yet; report not-open rather
        // than send an instruction some other app might act on.
        LedgerApp::Avalanche | LedgerApp::Tezos | LedgerApp::Binance => return false,
    };

    match exchange(transport, &command, DEFAULT_EXCHANGE_TIMEOUT).await {
        Ok(response) => {
            debug!(app = %app, status = response.status_code(), "liveness probe");
            response.is_success()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowTransport;

    #[async_trait]
    impl LedgerTransport for SlowTransport {
        async fn exchange(&mut self, _command: &ApduCommand) -> Result<ApduResponse, SignerError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    struct FixedTransport(Vec<u8>);

    #[async_trait]
    impl LedgerTransport for FixedTransport {
        async fn exchange(&mut self, _command: &ApduCommand) -> Result<ApduResponse, SignerError> {
            ApduResponse::from_bytes(&self.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_surfaces_timeout() {
        let transport = share(SlowTransport);
        let command = ApduCommand::new(0xE0, 0x06, 0, 0, vec![]);
        let err = exchange(&transport, &command, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::HardwareTimeout(_)));
    }

    #[tokio::test]
    async fn test_wrong_app_maps_to_unavailable() {
        let transport = share(FixedTransport(vec![0x6D, 0x00]));
        let command = ApduCommand::new(0xE0, 0x06, 0, 0, vec![]);
        let response = exchange(&transport, &command, Duration::from_secs(5))
            .await
            .unwrap();
        let err = require_success(response).unwrap_err();
        assert!(matches!(err, SignerError::HardwareUnavailable(_)));
    }

    #[tokio::test]
    async fn test_user_rejection_maps_to_signing_failed() {
        let transport = share(FixedTransport(vec![0x69, 0x85]));
        let command = ApduCommand::new(0xE0, 0x04, 0, 0, vec![]);
        let response = exchange(&transport, &command, Duration::from_secs(5))
            .await
            .unwrap();
        let err = require_success(response).unwrap_err();
        assert!(matches!(err, SignerError::SigningFailed(_)));
    }

    #[tokio::test]
    async fn test_liveness_probe_success() {
        let transport = share(FixedTransport(vec![0x01, 0x09, 0x02, 0x90, 0x00]));
        assert!(is_app_open(&transport, LedgerApp::Ethereum).await);
        assert!(!is_app_open(&transport, LedgerApp::Tezos).await);
    }
}
