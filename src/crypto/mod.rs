//! Seed derivation, path handling and the per-curve key derivers.

pub mod ed25519;
pub mod ed25519_bip32;
pub mod mnemonic;
pub mod path;
pub mod paths;
pub mod secp256k1;
pub mod sr25519;
