//! Ledger hardware wallet integration.
//!
//! This crate never opens devices itself; the caller supplies a transport
//! (see [`transport::LedgerTransport`]) and this module drives the vendor
//! app protocols over it:
//! - Ethereum app (EVM family)
//! - Solana app
//! - NEAR app
//! - Cosmos app

pub mod apdu;
pub mod cosmos;
pub mod ed25519_apps;
pub mod eth;
pub mod transport;

pub use cosmos::LedgerCosmosApp;
pub use ed25519_apps::{LedgerNearApp, LedgerSolanaApp};
pub use eth::LedgerEthereumApp;
pub use transport::{LedgerTransport, SharedTransport};
