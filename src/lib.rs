// src/lib.rs

pub mod blockchain;
pub mod core;
pub mod crypto;

// Hardware wallet support modules
#[cfg(feature = "ledger")]
pub mod hardware;

pub use crate::core::errors::SignerError;
pub use crate::core::network::Network;
pub use crate::core::options::{LedgerApp, LedgerConfig, MnemonicOptions, WalletKind, WalletOptions};
pub use crate::core::registry::get_signing_wallet;
pub use crate::core::wallet::{AdditionalAddresses, SigningWallet};
