//! Ledger Solana and NEAR app adapters (ed25519 apps share a shape:
//! 32-byte public keys, 64-byte signatures over an opaque message).

use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use super::apdu::{serialize_path, ApduCommand};
use super::transport::{exchange, require_success, SharedTransport, DEFAULT_EXCHANGE_TIMEOUT};
use crate::core::errors::SignerError;
use crate::crypto::path::DerivationPath;

const SOLANA_CLA: u8 = 0xE0;
const SOLANA_INS_GET_PUBKEY: u8 = 0x05;
const SOLANA_INS_SIGN_MESSAGE: u8 = 0x06;

const NEAR_CLA: u8 = 0x80;
const NEAR_INS_SIGN: u8 = 0x02;
const NEAR_INS_GET_PUBLIC_KEY: u8 = 0x04;

fn parse_pubkey(data: Vec<u8>) -> Result<[u8; 32], SignerError> {
    if data.len() < 32 {
        return Err(SignerError::HardwareUnavailable(format!(
            "short public key response: {} bytes",
            data.len()
        )));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&data[..32]);
    Ok(key)
}

fn parse_signature(data: Vec<u8>) -> Result<[u8; 64], SignerError> {
    if data.len() < 64 {
        return Err(SignerError::SigningFailed(format!(
            "short signature response: {} bytes",
            data.len()
        )));
    }
    let mut sig = [0u8; 64];
    sig.copy_from_slice(&data[..64]);
    Ok(sig)
}

/// Solana app handle.
pub struct LedgerSolanaApp {
    transport: SharedTransport,
    path: DerivationPath,
    timeout: Duration,
}

impl LedgerSolanaApp {
    pub fn new(transport: SharedTransport, path: &str) -> Result<Self, SignerError> {
        Ok(Self {
            transport,
            path: path.parse()?,
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        })
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub async fn get_public_key(&self) -> Result<[u8; 32], SignerError> {
        info!(path = %self.path, "ledger: fetching Solana public key");
        let command = ApduCommand::new(
            SOLANA_CLA,
            SOLANA_INS_GET_PUBKEY,
            0x00,
            0x00,
            serialize_path(&self.path),
        );
        let data = require_success(exchange(&self.transport, &command, self.timeout).await?)?;
        parse_pubkey(data)
    }

    /// Sign a serialized message (the wire message half of a transaction).
    pub async fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SignerError> {
        info!(len = message.len(), "ledger: signing Solana message");
        let mut payload = serialize_path(&self.path);
        payload.extend_from_slice(message);
        let command = ApduCommand::new(SOLANA_CLA, SOLANA_INS_SIGN_MESSAGE, 0x00, 0x00, payload);
        let data = require_success(exchange(&self.transport, &command, self.timeout).await?)?;
        parse_signature(data)
    }
}

/// NEAR app handle. The public key is memoized after the first fetch —
/// the original signer interface asks for it on every signature.
pub struct LedgerNearApp {
    transport: SharedTransport,
    path: DerivationPath,
    timeout: Duration,
    cached_public_key: RwLock<Option<[u8; 32]>>,
}

impl LedgerNearApp {
    pub fn new(transport: SharedTransport, path: &str) -> Result<Self, SignerError> {
        Ok(Self {
            transport,
            path: path.parse()?,
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
            cached_public_key: RwLock::new(None),
        })
    }

    pub async fn get_public_key(&self) -> Result<[u8; 32], SignerError> {
        if let Some(key) = *self.cached_public_key.read().await {
            return Ok(key);
        }

        info!(path = %self.path, "ledger: fetching NEAR public key");
        let command = ApduCommand::new(
            NEAR_CLA,
            NEAR_INS_GET_PUBLIC_KEY,
            0x00,
            0x00,
            serialize_path(&self.path),
        );
        let data = require_success(exchange(&self.transport, &command, self.timeout).await?)?;
        let key = parse_pubkey(data)?;
        *self.cached_public_key.write().await = Some(key);
        Ok(key)
    }

    pub async fn sign(&self, message: &[u8]) -> Result<[u8; 64], SignerError> {
        info!(len = message.len(), "ledger: signing NEAR payload");
        let mut payload = serialize_path(&self.path);
        payload.extend_from_slice(message);
        let command = ApduCommand::new(NEAR_CLA, NEAR_INS_SIGN, 0x00, 0x00, payload);
        let data = require_success(exchange(&self.transport, &command, self.timeout).await?)?;
        parse_signature(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::ledger::apdu::ApduResponse;
    use crate::hardware::ledger::transport::{share, LedgerTransport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTransport {
        response: Vec<u8>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LedgerTransport for CountingTransport {
        async fn exchange(&mut self, _command: &ApduCommand) -> Result<ApduResponse, SignerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ApduResponse::from_bytes(&self.response)
        }
    }

    fn pubkey_response() -> Vec<u8> {
        let mut data = vec![0x07; 32];
        data.extend_from_slice(&[0x90, 0x00]);
        data
    }

    #[tokio::test]
    async fn test_solana_pubkey_roundtrip() {
        let transport = share(CountingTransport {
            response: pubkey_response(),
            calls: Arc::new(AtomicUsize::new(0)),
        });
        let app = LedgerSolanaApp::new(transport, "m/44'/501'/0'").unwrap();
        assert_eq!(app.get_public_key().await.unwrap(), [0x07; 32]);
    }

    #[tokio::test]
    async fn test_near_pubkey_is_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = share(CountingTransport {
            response: pubkey_response(),
            calls: calls.clone(),
        });
        let app = LedgerNearApp::new(transport, "m/44'/397'/0'").unwrap();
        app.get_public_key().await.unwrap();
        app.get_public_key().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_signature_rejected() {
        let mut short = vec![0x01; 10];
        short.extend_from_slice(&[0x90, 0x00]);
        let transport = share(CountingTransport {
            response: short,
            calls: Arc::new(AtomicUsize::new(0)),
        });
        let app = LedgerSolanaApp::new(transport, "m/44'/501'/0'").unwrap();
        let err = app.sign_message(b"msg").await.unwrap_err();
        assert!(matches!(err, SignerError::SigningFailed(_)));
    }
}
