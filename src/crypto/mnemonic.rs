//! Mnemonic → seed material.
//!
//! BIP-39 for the secp256k1/ed25519 software paths, plus the two
//! non-BIP-39 schemes in the supported set: the Substrate mini-secret
//! (PBKDF2 over the raw entropy) and the TON wallet scheme (HMAC entropy,
//! PBKDF2 with the TON salt). All functions are pure and safe to call
//! repeatedly; outputs are wrapped in `Zeroizing` so key material does not
//! outlive the call chain.

use bip39::{Language, Mnemonic};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::core::errors::SignerError;

type HmacSha512 = Hmac<Sha512>;

const SUBSTRATE_ROUNDS: u32 = 2048;
const TON_SEED_ROUNDS: u32 = 100_000;
const TON_SEED_SALT: &[u8] = b"TON default seed";

fn parse(phrase: &str) -> Result<Mnemonic, SignerError> {
    Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| SignerError::InvalidMnemonic(e.to_string()))
}

/// BIP-39 seed with an empty passphrase.
pub fn seed_from_mnemonic(phrase: &str) -> Result<Zeroizing<[u8; 64]>, SignerError> {
    seed_from_mnemonic_with_passphrase(phrase, "")
}

/// BIP-39 seed; fails `InvalidMnemonic` on wordlist/checksum errors.
pub fn seed_from_mnemonic_with_passphrase(
    phrase: &str,
    passphrase: &str,
) -> Result<Zeroizing<[u8; 64]>, SignerError> {
    let mnemonic = parse(phrase)?;
    Ok(Zeroizing::new(mnemonic.to_seed_normalized(passphrase)))
}

/// Raw BIP-39 entropy bytes (the Substrate and Cardano KDFs start here,
/// not at the 64-byte seed).
pub fn entropy_from_mnemonic(phrase: &str) -> Result<Zeroizing<Vec<u8>>, SignerError> {
    let mnemonic = parse(phrase)?;
    Ok(Zeroizing::new(mnemonic.to_entropy()))
}

/// Substrate keyring mini-secret: PBKDF2-HMAC-SHA512 over the entropy,
/// salted with `"mnemonic" + password`, 2048 rounds, first 32 bytes.
pub fn substrate_mini_secret(
    phrase: &str,
    password: &str,
) -> Result<Zeroizing<[u8; 32]>, SignerError> {
    let entropy = entropy_from_mnemonic(phrase)?;
    let salt = Zeroizing::new(format!("mnemonic{password}"));

    let mut seed = Zeroizing::new([0u8; 64]);
    pbkdf2::pbkdf2_hmac::<Sha512>(&entropy, salt.as_bytes(), SUBSTRATE_ROUNDS, seed.as_mut());

    let mut mini = [0u8; 32];
    mini.copy_from_slice(&seed[..32]);
    Ok(Zeroizing::new(mini))
}

/// TON wallet key seed: entropy = HMAC-SHA512(phrase, password), then
/// PBKDF2-HMAC-SHA512 with the "TON default seed" salt; the first 32
/// bytes are the ed25519 seed. TON phrases use the BIP-39 wordlist but
/// carry no checksum, so no BIP-39 validation applies here.
pub fn ton_key_seed(phrase: &str, password: &str) -> Result<Zeroizing<[u8; 32]>, SignerError> {
    if phrase.trim().is_empty() {
        return Err(SignerError::InvalidMnemonic("empty phrase".to_string()));
    }

    let mut mac = HmacSha512::new_from_slice(phrase.as_bytes())
        .map_err(|e| SignerError::KeyDerivation(format!("HMAC init failed: {e}")))?;
    mac.update(password.as_bytes());
    let entropy = Zeroizing::new(mac.finalize().into_bytes());

    let mut seed = Zeroizing::new([0u8; 64]);
    pbkdf2::pbkdf2_hmac::<Sha512>(&entropy, TON_SEED_SALT, TON_SEED_ROUNDS, seed.as_mut());

    let mut key = [0u8; 32];
    key.copy_from_slice(&seed[..32]);
    Ok(Zeroizing::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_reference_seed_vector() {
        // BIP-39 reference vector for the all-abandon phrase, empty passphrase.
        let seed = seed_from_mnemonic(TEST_MNEMONIC).unwrap();
        assert_eq!(
            hex::encode(&seed[..]),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = seed_from_mnemonic(TEST_MNEMONIC).unwrap();
        let b = seed_from_mnemonic(TEST_MNEMONIC).unwrap();
        assert_eq!(&a[..], &b[..]);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let err = seed_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon",
        )
        .unwrap_err();
        assert!(matches!(err, SignerError::InvalidMnemonic(_)));
    }

    #[test]
    fn test_unknown_word_rejected() {
        let err = seed_from_mnemonic("definitely not a bip39 phrase at all").unwrap_err();
        assert!(matches!(err, SignerError::InvalidMnemonic(_)));
    }

    #[test]
    fn test_entropy_for_reference_phrase() {
        let entropy = entropy_from_mnemonic(TEST_MNEMONIC).unwrap();
        assert_eq!(hex::encode(&entropy[..]), "00000000000000000000000000000000");
    }

    #[test]
    fn test_substrate_mini_secret_deterministic_and_distinct() {
        let a = substrate_mini_secret(TEST_MNEMONIC, "").unwrap();
        let b = substrate_mini_secret(TEST_MNEMONIC, "").unwrap();
        let c = substrate_mini_secret(TEST_MNEMONIC, "pw").unwrap();
        assert_eq!(&a[..], &b[..]);
        assert_ne!(&a[..], &c[..]);
    }

    #[test]
    fn test_ton_key_seed_deterministic() {
        let a = ton_key_seed(TEST_MNEMONIC, "").unwrap();
        let b = ton_key_seed(TEST_MNEMONIC, "").unwrap();
        assert_eq!(&a[..], &b[..]);
    }

    #[test]
    fn test_ton_rejects_empty_phrase() {
        assert!(matches!(
            ton_key_seed("", "").unwrap_err(),
            SignerError::InvalidMnemonic(_)
        ));
    }
}
