//! Hardware wallet integration (transport-agnostic adapters).

#[cfg(feature = "ledger")]
pub mod ledger;
