//! Ledger Cosmos app adapter (secp256k1 over SignDoc bytes).

use std::time::Duration;

use tracing::info;

use super::apdu::{serialize_path, ApduCommand};
use super::transport::{exchange, require_success, SharedTransport, DEFAULT_EXCHANGE_TIMEOUT};
use crate::core::errors::SignerError;
use crate::crypto::path::DerivationPath;

const CLA: u8 = 0x55;
const INS_SIGN_SECP256K1: u8 = 0x02;
const INS_GET_ADDR_SECP256K1: u8 = 0x04;

/// Cosmos app handle bound to one transport, path and bech32 prefix.
pub struct LedgerCosmosApp {
    transport: SharedTransport,
    path: DerivationPath,
    hrp: String,
    timeout: Duration,
}

impl LedgerCosmosApp {
    pub fn new(transport: SharedTransport, path: &str, hrp: &str) -> Result<Self, SignerError> {
        Ok(Self {
            transport,
            path: path.parse()?,
            hrp: hrp.to_string(),
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        })
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Compressed public key and bech32 address for the configured path.
    pub async fn get_address(&self) -> Result<(Vec<u8>, String), SignerError> {
        info!(path = %self.path, hrp = %self.hrp, "ledger: fetching Cosmos address");

        // [hrp_len][hrp][path]
        let mut payload = vec![self.hrp.len() as u8];
        payload.extend_from_slice(self.hrp.as_bytes());
        payload.extend_from_slice(&serialize_path(&self.path));

        let command = ApduCommand::new(CLA, INS_GET_ADDR_SECP256K1, 0x00, 0x00, payload);
        let data = require_success(exchange(&self.transport, &command, self.timeout).await?)?;

        // [33-byte compressed pubkey][bech32 address ascii]
        if data.len() < 34 {
            return Err(SignerError::HardwareUnavailable(
                "truncated get-address response".to_string(),
            ));
        }
        let public_key = data[..33].to_vec();
        let address = String::from_utf8_lossy(&data[33..]).trim_end().to_string();
        Ok((public_key, address))
    }

    /// Sign SignDoc bytes; the app returns DER, normalized here to the
    /// fixed 64-byte r ‖ s the TxRaw signature field wants.
    pub async fn sign(&self, sign_doc: &[u8]) -> Result<[u8; 64], SignerError> {
        info!(len = sign_doc.len(), "ledger: signing Cosmos document");
        let mut payload = serialize_path(&self.path);
        payload.extend_from_slice(sign_doc);
        let command = ApduCommand::new(CLA, INS_SIGN_SECP256K1, 0x00, 0x00, payload);
        let data = require_success(exchange(&self.transport, &command, self.timeout).await?)?;
        der_to_fixed(&data)
    }
}

/// Minimal DER ECDSA-Sig-Value → fixed 64-byte conversion.
fn der_to_fixed(der: &[u8]) -> Result<[u8; 64], SignerError> {
    let err = || SignerError::SigningFailed("malformed DER signature".to_string());

    if der.len() < 8 || der[0] != 0x30 {
        return Err(err());
    }
    let mut cursor = 2; // SEQUENCE header

    let mut read_int = |cursor: &mut usize| -> Result<[u8; 32], SignerError> {
        if der.get(*cursor) != Some(&0x02) {
            return Err(err());
        }
        let len = *der.get(*cursor + 1).ok_or_else(err)? as usize;
        let start = *cursor + 2;
        let bytes = der.get(start..start + len).ok_or_else(err)?;
        // strip leading zero sign byte, left-pad to 32
        let bytes = if bytes.len() == 33 && bytes[0] == 0 {
            &bytes[1..]
        } else {
            bytes
        };
        if bytes.len() > 32 {
            return Err(err());
        }
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(bytes);
        *cursor = start + len;
        Ok(out)
    };

    let r = read_int(&mut cursor)?;
    let s = read_int(&mut cursor)?;

    let mut fixed = [0u8; 64];
    fixed[..32].copy_from_slice(&r);
    fixed[32..].copy_from_slice(&s);
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_der_to_fixed_plain() {
        let mut der = vec![0x30, 68, 0x02, 32];
        der.extend_from_slice(&[0x11; 32]);
        der.extend_from_slice(&[0x02, 32]);
        der.extend_from_slice(&[0x22; 32]);
        let fixed = der_to_fixed(&der).unwrap();
        assert_eq!(&fixed[..32], &[0x11; 32]);
        assert_eq!(&fixed[32..], &[0x22; 32]);
    }

    #[test]
    fn test_der_to_fixed_with_sign_byte() {
        let mut der = vec![0x30, 69, 0x02, 33, 0x00];
        der.extend_from_slice(&[0xFF; 32]);
        der.extend_from_slice(&[0x02, 32]);
        der.extend_from_slice(&[0x22; 32]);
        let fixed = der_to_fixed(&der).unwrap();
        assert_eq!(&fixed[..32], &[0xFF; 32]);
    }

    #[test]
    fn test_der_to_fixed_short_component() {
        // 31-byte r must be left-padded.
        let mut der = vec![0x30, 67, 0x02, 31];
        der.extend_from_slice(&[0x33; 31]);
        der.extend_from_slice(&[0x02, 32]);
        der.extend_from_slice(&[0x44; 32]);
        let fixed = der_to_fixed(&der).unwrap();
        assert_eq!(fixed[0], 0x00);
        assert_eq!(&fixed[1..32], &[0x33; 31]);
    }

    #[test]
    fn test_der_to_fixed_rejects_garbage() {
        assert!(der_to_fixed(&[0x01, 0x02]).is_err());
        assert!(der_to_fixed(&[]).is_err());
    }
}
