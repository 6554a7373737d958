//! Network → factory resolution and wallet construction.
//!
//! The registry is a single table built once at first use and read-only
//! thereafter. Because `Network` is a closed enum the mapping is total by
//! construction; `UnsupportedNetwork` surfaces at the string boundary
//! (`Network::from_str`) rather than deep inside signing.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::blockchain;
use crate::core::errors::SignerError;
use crate::core::network::Network;
use crate::core::options::WalletOptions;
use crate::core::wallet::SigningWallet;

/// Future returned by a factory invocation.
pub type FactoryFuture =
    Pin<Box<dyn Future<Output = Result<Box<dyn SigningWallet>, SignerError>> + Send>>;

/// One construction strategy per network (family).
pub type WalletFactory = fn(Network, WalletOptions) -> FactoryFuture;

fn factory_for(network: Network) -> WalletFactory {
    match network {
        Network::Ethereum
        | Network::Polygon
        | Network::Optimism
        | Network::Arbitrum
        | Network::Celo
        | Network::Binance
        | Network::AvalancheC => |n, o| Box::pin(blockchain::evm::signing_wallet(n, o)),
        Network::AvalancheCAtomic | Network::AvalancheP => {
            |n, o| Box::pin(blockchain::avalanche::signing_wallet(n, o))
        }
        Network::Cosmos | Network::Osmosis | Network::Juno | Network::Akash | Network::Kava => {
            |n, o| Box::pin(blockchain::cosmos::signing_wallet(n, o))
        }
        Network::Solana => |n, o| Box::pin(blockchain::solana::signing_wallet(n, o)),
        Network::Near => |n, o| Box::pin(blockchain::near::signing_wallet(n, o)),
        Network::Tezos => |n, o| Box::pin(blockchain::tezos::signing_wallet(n, o)),
        Network::Aptos => |n, o| Box::pin(blockchain::aptos::signing_wallet(n, o)),
        Network::Stellar | Network::StellarTestnet => {
            |n, o| Box::pin(blockchain::stellar::signing_wallet(n, o))
        }
        Network::Ton | Network::TonTestnet => {
            |n, o| Box::pin(blockchain::ton::signing_wallet(n, o))
        }
        Network::Tron => |n, o| Box::pin(blockchain::tron::signing_wallet(n, o)),
        Network::BinanceBeacon => |n, o| Box::pin(blockchain::binance::signing_wallet(n, o)),
        Network::Polkadot | Network::Kusama | Network::Westend | Network::Bittensor => {
            |n, o| Box::pin(blockchain::substrate::signing_wallet(n, o))
        }
        Network::Cardano => |n, o| Box::pin(blockchain::cardano::signing_wallet(n, o)),
    }
}

static REGISTRY: Lazy<BTreeMap<Network, WalletFactory>> = Lazy::new(|| {
    Network::ALL
        .iter()
        .map(|n| (*n, factory_for(*n)))
        .collect()
});

/// Look up the factory for a network.
pub fn resolve(network: Network) -> Result<WalletFactory, SignerError> {
    REGISTRY
        .get(&network)
        .copied()
        .ok_or_else(|| SignerError::UnsupportedNetwork(network.id().to_string()))
}

/// Resolve the factory and build a wallet from the supplied options.
pub async fn get_signing_wallet(
    network: Network,
    options: WalletOptions,
) -> Result<Box<dyn SigningWallet>, SignerError> {
    debug!(network = %network, ledger = options.is_ledger(), "resolving signing wallet");
    let factory = resolve(network)?;
    factory(network, options).await
}
