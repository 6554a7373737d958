//! Per-wallet-kind derivation path table.
//!
//! Total over every (kind, network) pair the crate claims to support; a
//! missing entry is a configuration error (`UnsupportedDerivation`) raised
//! at wallet construction, never a crash deep inside signing.

use crate::core::errors::SignerError;
use crate::core::network::{Network, PathFamily};
use crate::core::options::WalletKind;

fn entry(kind: WalletKind, family: PathFamily, index: u32) -> Option<String> {
    use PathFamily::*;
    use WalletKind::*;

    match (kind, family) {
        // Every supported wallet app derives EVM keys at the standard spot.
        (_, Evm) => Some(format!("m/44'/60'/0'/0/{index}")),

        (Omni | Steakwallet | Phantom, Solana) => Some(format!("m/44'/501'/{index}'/0'")),

        (Omni | Steakwallet, Cosmos) => Some(format!("m/44'/118'/0'/0/{index}")),
        (Omni | Steakwallet, Near) => Some(format!("m/44'/397'/{index}'")),
        (Omni | Steakwallet, Tezos) => Some(format!("m/44'/1729'/{index}'/0'")),
        (Omni | Steakwallet, Tron) => Some(format!("m/44'/195'/0'/0/{index}")),
        (Omni | Steakwallet, Binance) => Some(format!("m/44'/714'/0'/0/{index}")),
        (Omni | Steakwallet, Stellar) => Some(format!("m/44'/148'/{index}'")),
        (Omni | Steakwallet, Cardano) => Some(format!("m/1852'/1815'/{index}'")),
        (Omni | Steakwallet, Aptos) => Some(format!("m/44'/637'/{index}'/0'/0'")),

        // MetaMask imports only cover the EVM family; Phantom adds Solana.
        (MetaMask | Phantom, _) => None,
    }
}

/// Derivation path for (kind, network, index).
///
/// Fails `UnsupportedDerivation` when the wallet app never derives keys
/// for this network, and for networks whose key scheme does not consult
/// the table at all (TON, Substrate).
pub fn path_for(kind: WalletKind, network: Network, index: u32) -> Result<String, SignerError> {
    network
        .path_family()
        .and_then(|family| entry(kind, family, index))
        .ok_or(SignerError::UnsupportedDerivation {
            kind: kind.name(),
            network,
        })
}
