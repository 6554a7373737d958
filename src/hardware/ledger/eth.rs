//! Ledger Ethereum app adapter.
//!
//! Drives the vendor app protocol over a caller-supplied transport: fetch
//! a public key/address at a path, sign an RLP transaction, sign an
//! EIP-191 personal message. The private key never leaves the device.

use std::time::Duration;

use tracing::{debug, info};

use super::apdu::{serialize_path, ApduCommand};
use super::transport::{exchange, require_success, SharedTransport, DEFAULT_EXCHANGE_TIMEOUT};
use crate::core::errors::SignerError;
use crate::crypto::path::DerivationPath;

const CLA: u8 = 0xE0;
const INS_GET_PUBLIC_KEY: u8 = 0x02;
const INS_SIGN_TRANSACTION: u8 = 0x04;
const INS_SIGN_PERSONAL_MESSAGE: u8 = 0x08;

/// First chunk carries the path; later chunks are continuations.
const P1_FIRST_CHUNK: u8 = 0x00;
const P1_MORE: u8 = 0x80;

const MAX_CHUNK: usize = 255;

/// Ethereum app handle bound to one transport and derivation path.
pub struct LedgerEthereumApp {
    transport: SharedTransport,
    path: DerivationPath,
    timeout: Duration,
}

impl LedgerEthereumApp {
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

    /// Uncompressed public key and the checksummed address string the app
    /// reports for the configured path.
    pub async fn get_address(&self) -> Result<(Vec<u8>, String), SignerError> {
        info!(path = %self.path, "ledger: fetching Ethereum address");

        let command = ApduCommand::new(
            CLA,
            INS_GET_PUBLIC_KEY,
            0x00, // no on-device display
            0x00,
            serialize_path(&self.path),
        );
        let data = require_success(exchange(&self.transport, &command, self.timeout).await?)?;

        // [pubkey_len][pubkey][address_len][address ascii]
        if data.is_empty() {
            return Err(SignerError::HardwareUnavailable(
                "empty get-address response".to_string(),
            ));
        }
        let pub_key_len = data[0] as usize;
        if data.len() < 1 + pub_key_len + 1 {
            return Err(SignerError::HardwareUnavailable(
                "truncated get-address response".to_string(),
            ));
        }
        let public_key = data[1..1 + pub_key_len].to_vec();

        let addr_len = data[1 + pub_key_len] as usize;
        let addr_start = 1 + pub_key_len + 1;
        if data.len() < addr_start + addr_len {
            return Err(SignerError::HardwareUnavailable(
                "truncated address in response".to_string(),
            ));
        }
        let address = String::from_utf8_lossy(&data[addr_start..addr_start + addr_len]).to_string();
        let address = if address.starts_with("0x") {
            address
        } else {
            format!("0x{address}")
        };

        debug!(pubkey_len = public_key.len(), %address, "ledger address fetched");
        Ok((public_key, address))
    }

    /// Sign an RLP-encoded transaction; returns (v, r, s).
    pub async fn sign_transaction(&self, rlp: &[u8]) -> Result<(u8, [u8; 32], [u8; 32]), SignerError> {
        info!(path = %self.path, len = rlp.len(), "ledger: signing Ethereum transaction");
        let mut payload = serialize_path(&self.path);
        payload.extend_from_slice(rlp);
        self.sign_chunked(INS_SIGN_TRANSACTION, &payload).await
    }

    /// EIP-191 personal-message signature; returns (v, r, s).
    pub async fn sign_personal_message(
        &self,
        message: &[u8],
    ) -> Result<(u8, [u8; 32], [u8; 32]), SignerError> {
        info!(len = message.len(), "ledger: signing personal message");
        let mut payload = serialize_path(&self.path);
        payload.extend_from_slice(&(message.len() as u32).to_be_bytes());
        payload.extend_from_slice(message);
        self.sign_chunked(INS_SIGN_PERSONAL_MESSAGE, &payload).await
    }

    async fn sign_chunked(
        &self,
        ins: u8,
        payload: &[u8],
    ) -> Result<(u8, [u8; 32], [u8; 32]), SignerError> {
        let mut last = None;
        for (i, chunk) in payload.chunks(MAX_CHUNK).enumerate() {
            let p1 = if i == 0 { P1_FIRST_CHUNK } else { P1_MORE };
            let command = ApduCommand::new(CLA, ins, p1, 0x00, chunk.to_vec());
            let response = exchange(&self.transport, &command, self.timeout).await?;
            last = Some(require_success(response)?);
        }

        let data = last.ok_or_else(|| SignerError::SigningFailed("empty payload".to_string()))?;
        if data.len() < 65 {
            return Err(SignerError::SigningFailed(format!(
                "short signature response: {} bytes",
                data.len()
            )));
        }
        let v = data[0];
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&data[1..33]);
        s.copy_from_slice(&data[33..65]);
        Ok((v, r, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::ledger::apdu::ApduResponse;
    use crate::hardware::ledger::transport::{share, LedgerTransport};
    use async_trait::async_trait;

    /// Replays scripted responses and records each command it saw.
    struct ScriptedTransport {
        responses: Vec<Vec<u8>>,
        seen: Vec<ApduCommand>,
    }

    #[async_trait]
    impl LedgerTransport for ScriptedTransport {
        async fn exchange(&mut self, command: &ApduCommand) -> Result<ApduResponse, SignerError> {
            self.seen.push(command.clone());
            let next = self.responses.remove(0);
            ApduResponse::from_bytes(&next)
        }
    }

    fn address_response() -> Vec<u8> {
        // 65-byte pubkey + 40-char address + status
        let mut data = vec![65u8];
        data.extend_from_slice(&[0x04; 65]);
        let addr = b"9858EfFD232B4033E47d90003D41EC34EcaEda94";
        data.push(addr.len() as u8);
        data.extend_from_slice(addr);
        data.extend_from_slice(&[0x90, 0x00]);
        data
    }

    #[tokio::test]
    async fn test_get_address_parses_pubkey_and_address() {
        let transport = share(ScriptedTransport {
            responses: vec![address_response()],
            seen: vec![],
        });
        let app = LedgerEthereumApp::new(transport, "m/44'/60'/0'/0/0").unwrap();
        let (pubkey, address) = app.get_address().await.unwrap();
        assert_eq!(pubkey.len(), 65);
        assert_eq!(address, "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    }

    #[tokio::test]
    async fn test_sign_transaction_parses_vrs() {
        let mut sig = vec![27u8];
        sig.extend_from_slice(&[0x11; 32]);
        sig.extend_from_slice(&[0x22; 32]);
        sig.extend_from_slice(&[0x90, 0x00]);
        let transport = share(ScriptedTransport {
            responses: vec![sig],
            seen: vec![],
        });
        let app = LedgerEthereumApp::new(transport, "m/44'/60'/0'/0/0").unwrap();
        let (v, r, s) = app.sign_transaction(&[0xEB; 40]).await.unwrap();
        assert_eq!(v, 27);
        assert_eq!(r, [0x11; 32]);
        assert_eq!(s, [0x22; 32]);
    }

    #[tokio::test]
    async fn test_large_transaction_is_chunked() {
        // Two chunks → the device answers 0x9000 (no data) then the signature.
        let mut sig = vec![0u8];
        sig.extend_from_slice(&[0x33; 64]);
        sig.extend_from_slice(&[0x90, 0x00]);
        let transport = share(ScriptedTransport {
            responses: vec![vec![0x90, 0x00], sig],
            seen: vec![],
        });
        let app = LedgerEthereumApp::new(transport.clone(), "m/44'/60'/0'/0/0").unwrap();
        let rlp = vec![0xAB; 300];
        app.sign_transaction(&rlp).await.unwrap();
    }
}
