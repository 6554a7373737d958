//! sr25519 keyring for Substrate networks.
//!
//! Key material comes from the Substrate mini-secret (see
//! `crypto::mnemonic`), expanded with the ed25519-style expansion the
//! Substrate keyring uses. Addresses are SS58: base58 of
//! `prefix ‖ pubkey ‖ blake2b-512("SS58PRE" ‖ payload)[..2]`.

use blake2::{Blake2b512, Digest};
use schnorrkel::{signing_context, ExpansionMode, Keypair, MiniSecretKey};

use crate::core::errors::SignerError;
use crate::crypto::mnemonic::substrate_mini_secret;

const SS58_PREFIX: &[u8] = b"SS58PRE";
const SIGNING_CTX: &[u8] = b"substrate";

/// An sr25519 keypair bound to a signing context.
pub struct Sr25519Key {
    keypair: Keypair,
}

impl Sr25519Key {
    /// Expand the keyring mini-secret for `phrase`.
    pub fn from_mnemonic(phrase: &str, password: &str) -> Result<Self, SignerError> {
        let mini = substrate_mini_secret(phrase, password)?;
        let mini = MiniSecretKey::from_bytes(&mini[..])
            .map_err(|e| SignerError::KeyDerivation(format!("sr25519 mini secret: {e}")))?;
        Ok(Self {
            keypair: mini.expand_to_keypair(ExpansionMode::Ed25519),
        })
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.keypair.public.to_bytes()
    }

    /// Schnorr signature under the `substrate` signing context.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let context = signing_context(SIGNING_CTX);
        self.keypair.sign(context.bytes(message)).to_bytes()
    }

    /// SS58 address under the given registry format.
    pub fn ss58_address(&self, format: u16) -> Result<String, SignerError> {
        ss58_encode(&self.public_key_bytes(), format)
    }
}

/// SS58-encode a 32-byte public key. Single-byte prefixes only — every
/// format in the supported network set is ≤ 42.
pub fn ss58_encode(public_key: &[u8; 32], format: u16) -> Result<String, SignerError> {
    if format >= 64 {
        return Err(SignerError::KeyDerivation(format!(
            "unsupported ss58 format {format}"
        )));
    }

    let mut payload = Vec::with_capacity(1 + 32 + 2);
    payload.push(format as u8);
    payload.extend_from_slice(public_key);

    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PREFIX);
    hasher.update(&payload);
    let checksum = hasher.finalize();
    payload.extend_from_slice(&checksum[..2]);

    Ok(bs58::encode(payload).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_address_prefix_per_format() {
        let key = Sr25519Key::from_mnemonic(TEST_MNEMONIC, "").unwrap();
        // Polkadot addresses start with '1', generic (42) with '5'.
        assert!(key.ss58_address(0).unwrap().starts_with('1'));
        assert!(key.ss58_address(42).unwrap().starts_with('5'));
    }

    #[test]
    fn test_address_deterministic() {
        let a = Sr25519Key::from_mnemonic(TEST_MNEMONIC, "").unwrap();
        let b = Sr25519Key::from_mnemonic(TEST_MNEMONIC, "").unwrap();
        assert_eq!(a.ss58_address(0).unwrap(), b.ss58_address(0).unwrap());
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn test_formats_yield_distinct_strings() {
        let key = Sr25519Key::from_mnemonic(TEST_MNEMONIC, "").unwrap();
        assert_ne!(
            key.ss58_address(0).unwrap(),
            key.ss58_address(2).unwrap()
        );
    }

    #[test]
    fn test_signature_verifies_under_context() {
        let key = Sr25519Key::from_mnemonic(TEST_MNEMONIC, "").unwrap();
        let message = b"extrinsic payload";
        let signature = key.sign(message);

        let public = schnorrkel::PublicKey::from_bytes(&key.public_key_bytes()).unwrap();
        let signature = schnorrkel::Signature::from_bytes(&signature).unwrap();
        let context = signing_context(SIGNING_CTX);
        assert!(public.verify(context.bytes(message), &signature).is_ok());
    }

    #[test]
    fn test_wide_format_rejected() {
        let key = Sr25519Key::from_mnemonic(TEST_MNEMONIC, "").unwrap();
        assert!(key.ss58_address(64).is_err());
    }
}
