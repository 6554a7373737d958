//! Supported networks and their static properties.
//!
//! `Network` is a closed enum: every per-network branch in the crate is an
//! exhaustive `match`, so adding or removing a network is a compile-time
//! checked change rather than a runtime table edit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::SignerError;

/// Elliptic-curve family a network's keys belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveFamily {
    Secp256k1,
    Ed25519,
    Sr25519,
}

/// Derivation-path family used by the path table.
///
/// Networks sharing a family share path shapes (all EVM chains derive at
/// coin type 60). `None`-family networks (TON, Substrate) derive keys by a
/// scheme that never consults the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathFamily {
    Evm,
    Solana,
    Cosmos,
    Near,
    Tezos,
    Tron,
    Binance,
    Stellar,
    Cardano,
    Aptos,
}

/// Every network the signing registry can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    // EVM family
    Ethereum,
    Polygon,
    Optimism,
    Arbitrum,
    Celo,
    /// BNB Smart Chain (EVM); carries a Beacon address as a secondary.
    Binance,
    AvalancheC,
    // Avalanche atomic/platform chains
    AvalancheCAtomic,
    AvalancheP,
    // Cosmos SDK family
    Cosmos,
    Osmosis,
    Juno,
    Akash,
    Kava,
    // ed25519 singletons
    Solana,
    Near,
    Tezos,
    Aptos,
    Stellar,
    StellarTestnet,
    Ton,
    TonTestnet,
    // secp256k1 singletons
    Tron,
    BinanceBeacon,
    // Substrate family (sr25519)
    Polkadot,
    Kusama,
    Westend,
    Bittensor,
    // multi-witness
    Cardano,
}

impl Network {
    /// Every registered network, in registry order.
    pub const ALL: &'static [Network] = &[
        Network::Ethereum,
        Network::Polygon,
        Network::Optimism,
        Network::Arbitrum,
        Network::Celo,
        Network::Binance,
        Network::AvalancheC,
        Network::AvalancheCAtomic,
        Network::AvalancheP,
        Network::Cosmos,
        Network::Osmosis,
        Network::Juno,
        Network::Akash,
        Network::Kava,
        Network::Solana,
        Network::Near,
        Network::Tezos,
        Network::Aptos,
        Network::Stellar,
        Network::StellarTestnet,
        Network::Ton,
        Network::TonTestnet,
        Network::Tron,
        Network::BinanceBeacon,
        Network::Polkadot,
        Network::Kusama,
        Network::Westend,
        Network::Bittensor,
        Network::Cardano,
    ];

    /// Canonical string identifier (what `FromStr` accepts).
    pub fn id(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Polygon => "polygon",
            Network::Optimism => "optimism",
            Network::Arbitrum => "arbitrum",
            Network::Celo => "celo",
            Network::Binance => "binance",
            Network::AvalancheC => "avalanche-c",
            Network::AvalancheCAtomic => "avalanche-c-atomic",
            Network::AvalancheP => "avalanche-p",
            Network::Cosmos => "cosmos",
            Network::Osmosis => "osmosis",
            Network::Juno => "juno",
            Network::Akash => "akash",
            Network::Kava => "kava",
            Network::Solana => "solana",
            Network::Near => "near",
            Network::Tezos => "tezos",
            Network::Aptos => "aptos",
            Network::Stellar => "stellar",
            Network::StellarTestnet => "stellar-testnet",
            Network::Ton => "ton",
            Network::TonTestnet => "ton-testnet",
            Network::Tron => "tron",
            Network::BinanceBeacon => "binance-beacon",
            Network::Polkadot => "polkadot",
            Network::Kusama => "kusama",
            Network::Westend => "westend",
            Network::Bittensor => "bittensor",
            Network::Cardano => "cardano",
        }
    }

    /// Key family this network signs with.
    pub fn curve_family(&self) -> CurveFamily {
        match self {
            Network::Ethereum
            | Network::Polygon
            | Network::Optimism
            | Network::Arbitrum
            | Network::Celo
            | Network::Binance
            | Network::AvalancheC
            | Network::AvalancheCAtomic
            | Network::AvalancheP
            | Network::Cosmos
            | Network::Osmosis
            | Network::Juno
            | Network::Akash
            | Network::Kava
            | Network::Tron
            | Network::BinanceBeacon => CurveFamily::Secp256k1,
            Network::Solana
            | Network::Near
            | Network::Tezos
            | Network::Aptos
            | Network::Stellar
            | Network::StellarTestnet
            | Network::Ton
            | Network::TonTestnet
            | Network::Cardano => CurveFamily::Ed25519,
            Network::Polkadot | Network::Kusama | Network::Westend | Network::Bittensor => {
                CurveFamily::Sr25519
            }
        }
    }

    /// Derivation-path family, where the path table applies.
    pub fn path_family(&self) -> Option<PathFamily> {
        match self {
            Network::Ethereum
            | Network::Polygon
            | Network::Optimism
            | Network::Arbitrum
            | Network::Celo
            | Network::Binance
            | Network::AvalancheC
            // The atomic chains sign with the EVM-path key; the original
            // wallet derives every Avalanche address from it.
            | Network::AvalancheCAtomic
            | Network::AvalancheP => Some(PathFamily::Evm),
            Network::Cosmos | Network::Osmosis | Network::Juno | Network::Akash | Network::Kava => {
                Some(PathFamily::Cosmos)
            }
            Network::Solana => Some(PathFamily::Solana),
            Network::Near => Some(PathFamily::Near),
            Network::Tezos => Some(PathFamily::Tezos),
            Network::Aptos => Some(PathFamily::Aptos),
            Network::Stellar | Network::StellarTestnet => Some(PathFamily::Stellar),
            Network::Tron => Some(PathFamily::Tron),
            Network::BinanceBeacon => Some(PathFamily::Binance),
            Network::Cardano => Some(PathFamily::Cardano),
            // TON mnemonics and substrate keyrings never consult the table.
            Network::Ton
            | Network::TonTestnet
            | Network::Polkadot
            | Network::Kusama
            | Network::Westend
            | Network::Bittensor => None,
        }
    }

    /// Bech32 account prefix for Cosmos SDK networks.
    pub fn bech32_prefix(&self) -> Option<&'static str> {
        match self {
            Network::Cosmos => Some("cosmos"),
            Network::Osmosis => Some("osmo"),
            Network::Juno => Some("juno"),
            Network::Akash => Some("akash"),
            Network::Kava => Some("kava"),
            _ => None,
        }
    }

    /// SS58 address format for Substrate networks.
    ///
    /// Source: ss58-registry.
    pub fn ss58_format(&self) -> Option<u16> {
        match self {
            Network::Polkadot => Some(0),
            Network::Kusama => Some(2),
            Network::Westend | Network::Bittensor => Some(42),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Network {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .iter()
            .copied()
            .find(|n| n.id() == s)
            .ok_or_else(|| SignerError::UnsupportedNetwork(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip_for_all_networks() {
        for network in Network::ALL {
            let parsed: Network = network.id().parse().unwrap();
            assert_eq!(parsed, *network);
        }
    }

    #[test]
    fn test_unknown_identifier_rejected() {
        let err = "dogecoin".parse::<Network>().unwrap_err();
        assert!(matches!(err, SignerError::UnsupportedNetwork(_)));
    }

    #[test]
    fn test_cosmos_prefixes() {
        assert_eq!(Network::Osmosis.bech32_prefix(), Some("osmo"));
        assert_eq!(Network::Solana.bech32_prefix(), None);
    }

    #[test]
    fn test_curve_families() {
        assert_eq!(Network::Tron.curve_family(), CurveFamily::Secp256k1);
        assert_eq!(Network::Solana.curve_family(), CurveFamily::Ed25519);
        assert_eq!(Network::Kusama.curve_family(), CurveFamily::Sr25519);
    }

    #[test]
    fn test_substrate_ss58_formats() {
        assert_eq!(Network::Polkadot.ss58_format(), Some(0));
        assert_eq!(Network::Kusama.ss58_format(), Some(2));
        assert_eq!(Network::Bittensor.ss58_format(), Some(42));
    }
}
