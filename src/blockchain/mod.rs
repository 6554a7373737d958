//! Per-network wallet factories.
//!
//! One module per network family. Each exposes a `signing_wallet`
//! constructor the registry dispatches to; everything else is private to
//! its module. Transaction encodings are owned by each chain's own
//! libraries — these factories route key material into them and
//! reassemble the signed artifacts deterministically.

pub mod aptos;
pub mod avalanche;
pub mod binance;
pub mod cardano;
mod codec;
pub mod cosmos;
pub mod evm;
pub mod near;
pub mod solana;
pub mod stellar;
pub mod substrate;
pub mod tezos;
pub mod ton;
pub mod tron;
