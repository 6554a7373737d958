//! secp256k1 key derivation (BIP-32 / BIP-44).
//!
//! Used by the EVM, Cosmos, Tron, Avalanche and Binance Beacon families.
//! Extended-key arithmetic comes from the `bip32` crate; this module adds
//! path handling, the public-key digests the bech32 address schemes need,
//! and the two signature shapes (fixed and recoverable) the factories use.

use bip32::{ChildNumber, XPrv};
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::core::errors::SignerError;
use crate::crypto::path::DerivationPath;

/// A leaf secp256k1 private key plus its public counterpart.
///
/// Lifetime is one wallet instance; the inner extended key zeroizes its
/// material on drop.
pub struct Secp256k1Key {
    xprv: XPrv,
}

impl Secp256k1Key {
    /// Derive the leaf key at `path` from a BIP-39 seed.
    pub fn derive(seed: &[u8], path: &str) -> Result<Self, SignerError> {
        let parsed: DerivationPath = path.parse()?;

        let mut xprv = XPrv::new(seed)
            .map_err(|e| SignerError::KeyDerivation(format!("master key from seed: {e}")))?;
        for segment in parsed.segments() {
            let child = ChildNumber::new(segment.index, segment.hardened)
                .map_err(|e| SignerError::KeyDerivation(format!("child number: {e}")))?;
            xprv = xprv
                .derive_child(child)
                .map_err(|e| SignerError::KeyDerivation(format!("derive {path}: {e}")))?;
        }
        Ok(Self { xprv })
    }

    /// Raw 32-byte private key.
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.xprv.private_key().to_bytes().into())
    }

    pub fn signing_key(&self) -> &SigningKey {
        self.xprv.private_key()
    }

    /// 33-byte compressed SEC1 public key.
    pub fn public_key_compressed(&self) -> Vec<u8> {
        self.xprv
            .private_key()
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// 65-byte uncompressed SEC1 public key.
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        self.xprv
            .private_key()
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// SHA-256 then RIPEMD-160 of the compressed public key — the digest
    /// behind the Avalanche/Cosmos/Binance bech32 address schemes.
    pub fn public_key_hash160(&self) -> [u8; 20] {
        hash160(&self.public_key_compressed())
    }

    /// Low-S normalized 64-byte signature over a 32-byte digest.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; 64], SignerError> {
        use k256::ecdsa::signature::hazmat::PrehashSigner;
        let signature: Signature = self
            .signing_key()
            .sign_prehash(digest)
            .map_err(|e| SignerError::SigningFailed(format!("secp256k1: {e}")))?;
        let signature = signature.normalize_s().unwrap_or(signature);
        let mut out = [0u8; 64];
        out.copy_from_slice(&signature.to_bytes());
        Ok(out)
    }

    /// Recoverable signature over a 32-byte digest, as r ‖ s ‖ v (65 bytes).
    pub fn sign_digest_recoverable(&self, digest: &[u8; 32]) -> Result<[u8; 65], SignerError> {
        let (signature, recovery): (Signature, RecoveryId) = self
            .signing_key()
            .sign_prehash_recoverable(digest)
            .map_err(|e| SignerError::SigningFailed(format!("secp256k1: {e}")))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery.to_byte();
        Ok(out)
    }
}

/// SHA-256 → RIPEMD-160.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    ripe.into()
}
