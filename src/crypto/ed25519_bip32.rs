//! Extended ed25519 keys (ed25519-BIP32, V2 scheme) for Cardano.
//!
//! The Icarus master key is PBKDF2-HMAC-SHA512 over the BIP-39 entropy
//! (not the seed), clamped per the V2 scheme. Child derivation supports
//! both hardened and soft indices; signing uses the extended-key form
//! (kL scalar, kR nonce half) and verifies under plain ed25519.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::errors::SignerError;
use crate::crypto::path::DerivationPath;

type HmacSha512 = Hmac<Sha512>;

const ICARUS_ROUNDS: u32 = 4096;

/// Extended private key: 32-byte kL, 32-byte kR, 32-byte chain code.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct XPrv {
    kl: [u8; 32],
    kr: [u8; 32],
    chain_code: [u8; 32],
}

impl XPrv {
    /// Icarus master key from BIP-39 entropy and a spending passphrase
    /// (empty by default).
    pub fn from_entropy(entropy: &[u8], passphrase: &[u8]) -> Result<Self, SignerError> {
        if entropy.is_empty() {
            return Err(SignerError::KeyDerivation("empty entropy".to_string()));
        }

        let mut bytes = [0u8; 96];
        pbkdf2::pbkdf2_hmac::<Sha512>(passphrase, entropy, ICARUS_ROUNDS, &mut bytes);

        // V2 clamping on the scalar half.
        bytes[0] &= 0b1111_1000;
        bytes[31] &= 0b0001_1111;
        bytes[31] |= 0b0100_0000;

        let mut kl = [0u8; 32];
        let mut kr = [0u8; 32];
        let mut chain_code = [0u8; 32];
        kl.copy_from_slice(&bytes[..32]);
        kr.copy_from_slice(&bytes[32..64]);
        chain_code.copy_from_slice(&bytes[64..]);
        bytes.zeroize();

        Ok(Self { kl, kr, chain_code })
    }

    /// Derive one child. `child_number` carries the hardened bit.
    pub fn derive_child(&self, child_number: u32) -> Result<Self, SignerError> {
        let hardened = child_number >= 0x8000_0000;
        let index_bytes = child_number.to_le_bytes();

        let (z, chain_code) = if hardened {
            let z = self.hmac_tagged(0x00, None, &index_bytes)?;
            let cc = self.hmac_tagged(0x01, None, &index_bytes)?;
            (z, cc)
        } else {
            let public = self.public_key();
            let z = self.hmac_tagged(0x02, Some(&public), &index_bytes)?;
            let cc = self.hmac_tagged(0x03, Some(&public), &index_bytes)?;
            (z, cc)
        };

        let mut zl = [0u8; 32];
        let mut zr = [0u8; 32];
        zl.copy_from_slice(&z[..32]);
        zr.copy_from_slice(&z[32..]);

        let kl = add_28_mul8(&self.kl, &zl);
        let kr = add_256(&self.kr, &zr);

        let mut cc = [0u8; 32];
        cc.copy_from_slice(&chain_code[32..]);

        zl.zeroize();
        zr.zeroize();

        Ok(Self {
            kl,
            kr,
            chain_code: cc,
        })
    }

    /// Derive along a full path (soft and hardened segments both allowed).
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, SignerError> {
        let mut current = self.clone();
        for child in path.child_numbers() {
            current = current.derive_child(child)?;
        }
        Ok(current)
    }

    /// Compressed Edwards point for kL.
    pub fn public_key(&self) -> [u8; 32] {
        let scalar = Scalar::from_bytes_mod_order(self.kl);
        EdwardsPoint::mul_base(&scalar).compress().to_bytes()
    }

    /// Extended-key ed25519 signature (verifies with the plain scheme).
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let public = self.public_key();

        let mut wide = [0u8; 64];

        let mut hasher = Sha512::new();
        hasher.update(self.kr);
        hasher.update(message);
        wide.copy_from_slice(&hasher.finalize());
        let r = Scalar::from_bytes_mod_order_wide(&wide);
        let big_r = EdwardsPoint::mul_base(&r).compress().to_bytes();

        let mut hasher = Sha512::new();
        hasher.update(big_r);
        hasher.update(public);
        hasher.update(message);
        wide.copy_from_slice(&hasher.finalize());
        let k = Scalar::from_bytes_mod_order_wide(&wide);

        let s = r + k * Scalar::from_bytes_mod_order(self.kl);

        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&big_r);
        signature[32..].copy_from_slice(&s.to_bytes());
        signature
    }

    fn hmac_tagged(
        &self,
        tag: u8,
        public: Option<&[u8; 32]>,
        index: &[u8; 4],
    ) -> Result<[u8; 64], SignerError> {
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|e| SignerError::KeyDerivation(format!("HMAC init failed: {e}")))?;
        mac.update(&[tag]);
        match public {
            Some(public) => mac.update(public),
            None => {
                mac.update(&self.kl);
                mac.update(&self.kr);
            }
        }
        mac.update(index);
        let mut out = [0u8; 64];
        out.copy_from_slice(&mac.finalize().into_bytes());
        Ok(out)
    }
}

/// x + 8 * y[..28] over 256-bit little-endian integers.
fn add_28_mul8(x: &[u8; 32], y: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..28 {
        let r = x[i] as u16 + ((y[i] as u16) << 3) + carry;
        out[i] = (r & 0xff) as u8;
        carry = r >> 8;
    }
    for i in 28..32 {
        let r = x[i] as u16 + carry;
        out[i] = (r & 0xff) as u8;
        carry = r >> 8;
    }
    out
}

/// x + y over 256-bit little-endian integers (mod 2^256).
fn add_256(x: &[u8; 32], y: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..32 {
        let r = x[i] as u16 + y[i] as u16 + carry;
        out[i] = (r & 0xff) as u8;
        carry = r >> 8;
    }
    out
}
