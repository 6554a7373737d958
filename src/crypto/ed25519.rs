//! ed25519 key derivation (SLIP-0010).
//!
//! Used by Solana, NEAR, Stellar, Aptos and Tezos. SLIP-0010 for ed25519
//! supports hardened derivation only; paths with non-hardened segments are
//! rejected up front.

use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use crate::core::errors::SignerError;
use crate::crypto::path::DerivationPath;

type HmacSha512 = Hmac<Sha512>;

const MASTER_SECRET: &[u8] = b"ed25519 seed";

/// A leaf ed25519 keypair.
pub struct Ed25519Key {
    signing_key: SigningKey,
}

impl Ed25519Key {
    /// Derive the leaf key at `path` (all segments hardened) from a
    /// BIP-39 seed.
    pub fn derive(seed: &[u8], path: &str) -> Result<Self, SignerError> {
        let parsed: DerivationPath = path.parse()?;
        if !parsed.all_hardened() {
            return Err(SignerError::KeyDerivation(format!(
                "ed25519 derivation requires every path segment hardened: {path}"
            )));
        }

        let (mut key, mut chain_code) = master_key(seed)?;
        for segment in parsed.segments() {
            let (child_key, child_chain) = derive_child(&key, &chain_code, segment.index)?;
            key.zeroize();
            chain_code.zeroize();
            key = child_key;
            chain_code = child_chain;
        }
        chain_code.zeroize();

        let signing_key = SigningKey::from_bytes(&key);
        key.zeroize();
        Ok(Self { signing_key })
    }

    /// Wrap a raw 32-byte seed (TON and Cardano-adjacent flows).
    pub fn from_seed_bytes(seed: &Zeroizing<[u8; 32]>) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// 64-byte detached signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

fn master_key(seed: &[u8]) -> Result<([u8; 32], [u8; 32]), SignerError> {
    if seed.len() < 16 {
        return Err(SignerError::KeyDerivation(
            "seed must be at least 16 bytes".to_string(),
        ));
    }
    let mut mac = HmacSha512::new_from_slice(MASTER_SECRET)
        .map_err(|e| SignerError::KeyDerivation(format!("HMAC init failed: {e}")))?;
    mac.update(seed);
    split64(mac.finalize().into_bytes().as_slice())
}

fn derive_child(
    parent_key: &[u8; 32],
    parent_chain: &[u8; 32],
    index: u32,
) -> Result<([u8; 32], [u8; 32]), SignerError> {
    let hardened = 0x8000_0000 | index;
    let mut mac = HmacSha512::new_from_slice(parent_chain)
        .map_err(|e| SignerError::KeyDerivation(format!("HMAC init failed: {e}")))?;
    mac.update(&[0x00]);
    mac.update(parent_key);
    mac.update(&hardened.to_be_bytes());
    split64(mac.finalize().into_bytes().as_slice())
}

fn split64(bytes: &[u8]) -> Result<([u8; 32], [u8; 32]), SignerError> {
    let mut buf = Zeroizing::new([0u8; 64]);
    buf.copy_from_slice(bytes);
    let mut key = [0u8; 32];
    let mut chain = [0u8; 32];
    key.copy_from_slice(&buf[..32]);
    chain.copy_from_slice(&buf[32..]);
    Ok((key, chain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    // SLIP-0010 ed25519 test vector 1, seed 000102030405060708090a0b0c0d0e0f.
    const VECTOR_SEED: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn test_slip0010_vector_m_0h() {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let key = Ed25519Key::derive(&seed, "m/0'").unwrap();
        assert_eq!(
            hex::encode(key.public_key_bytes()),
            "8c8a13df77a28f3445213a0f432fde644acaa215fc72dcdf300d5efaa85d350c"
        );
    }

    #[test]
    fn test_slip0010_vector_m_0h_1h() {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let key = Ed25519Key::derive(&seed, "m/0'/1'").unwrap();
        assert_eq!(
            hex::encode(key.public_key_bytes()),
            "1932a5270f335bed617d5b935c80aedb1a35bd9fc1e31acafd5372c30f5c1187"
        );
    }

    #[test]
    fn test_non_hardened_segment_rejected() {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let err = Ed25519Key::derive(&seed, "m/44'/501'/0'/0").err().unwrap();
        assert!(matches!(err, SignerError::KeyDerivation(_)));
    }

    #[test]
    fn test_short_seed_rejected() {
        let err = Ed25519Key::derive(&[0u8; 8], "m/0'").err().unwrap();
        assert!(matches!(err, SignerError::KeyDerivation(_)));
    }

    #[test]
    fn test_signature_verifies() {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let key = Ed25519Key::derive(&seed, "m/44'/501'/0'/0'").unwrap();
        let message = b"uniform signing contract";
        let signature = key.sign(message);

        let verifying =
            ed25519_dalek::VerifyingKey::from_bytes(&key.public_key_bytes()).unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&signature);
        assert!(verifying.verify(message, &signature).is_ok());
    }

    #[test]
    fn test_derivation_deterministic_and_index_sensitive() {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let a = Ed25519Key::derive(&seed, "m/44'/501'/0'/0'").unwrap();
        let b = Ed25519Key::derive(&seed, "m/44'/501'/0'/0'").unwrap();
        let c = Ed25519Key::derive(&seed, "m/44'/501'/1'/0'").unwrap();
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
        assert_ne!(a.public_key_bytes(), c.public_key_bytes());
    }
}
