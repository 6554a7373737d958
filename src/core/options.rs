//! Wallet construction options.
//!
//! The software/hardware choice is a tagged union decided once at
//! construction time; factories branch on the variant and never probe
//! field shapes. A `Ledger` value can never reach a software key deriver
//! and a `Mnemonic` value can never reach a hardware adapter.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::errors::SignerError;
use crate::core::network::Network;

#[cfg(feature = "ledger")]
use crate::hardware::ledger::transport::SharedTransport;

/// Wallet software a mnemonic was imported from.
///
/// The derivation path table is keyed on this; different wallet apps put
/// the same mnemonic at different paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WalletKind {
    Omni,
    Steakwallet,
    MetaMask,
    Phantom,
}

impl WalletKind {
    pub fn name(&self) -> &'static str {
        match self {
            WalletKind::Omni => "Omni",
            WalletKind::Steakwallet => "Steakwallet",
            WalletKind::MetaMask => "MetaMask",
            WalletKind::Phantom => "Phantom",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Software-wallet options: everything needed to re-derive keys from seed.
#[derive(Clone)]
pub struct MnemonicOptions {
    /// Space-separated BIP-39 phrase. Never logged, never serialized.
    pub mnemonic: String,
    pub wallet_kind: WalletKind,
    /// Account index fed to the derivation path table.
    pub index: u32,
    /// Passed through to chain-side providers by the caller; unused here.
    pub api_key: Option<String>,
    /// Replaces the path table lookup wherever a path would be consulted.
    pub derivation_path_override: Option<String>,
}

impl MnemonicOptions {
    pub fn new(mnemonic: impl Into<String>, wallet_kind: WalletKind, index: u32) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            wallet_kind,
            index,
            api_key: None,
            derivation_path_override: None,
        }
    }

    /// Same options pointed at a different derivation path.
    pub fn with_path_override(&self, path: impl Into<String>) -> Self {
        let mut opts = self.clone();
        opts.derivation_path_override = Some(path.into());
        opts
    }
}

impl fmt::Debug for MnemonicOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MnemonicOptions")
            .field("mnemonic", &"<redacted>")
            .field("wallet_kind", &self.wallet_kind)
            .field("index", &self.index)
            .finish()
    }
}

/// Ledger app a derivation path is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LedgerApp {
    Ethereum,
    Avalanche,
    Solana,
    Near,
    Cosmos,
    Tezos,
    Binance,
}

impl LedgerApp {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerApp::Ethereum => "Ethereum",
            LedgerApp::Avalanche => "Avalanche",
            LedgerApp::Solana => "Solana",
            LedgerApp::Near => "NEAR",
            LedgerApp::Cosmos => "Cosmos",
            LedgerApp::Tezos => "Tezos",
            LedgerApp::Binance => "Binance",
        }
    }
}

impl fmt::Display for LedgerApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-app hardware configuration supplied by the caller.
#[derive(Debug, Clone)]
pub struct LedgerAppConfig {
    pub derivation_path: String,
}

/// App-name → configuration mapping for a hardware session.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig(BTreeMap<LedgerApp, LedgerAppConfig>);

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(mut self, app: LedgerApp, derivation_path: impl Into<String>) -> Self {
        self.0.insert(
            app,
            LedgerAppConfig {
                derivation_path: derivation_path.into(),
            },
        );
        self
    }

    pub fn app(&self, app: LedgerApp) -> Option<&LedgerAppConfig> {
        self.0.get(&app)
    }

    /// Derivation path for `app`, or `WalletNotInitialized` if unconfigured.
    pub fn derivation_path(&self, app: LedgerApp) -> Result<&str, SignerError> {
        self.0
            .get(&app)
            .map(|c| c.derivation_path.as_str())
            .ok_or_else(|| {
                SignerError::WalletNotInitialized(format!(
                    "no derivation path configured for Ledger app {app}"
                ))
            })
    }
}

/// Hardware-wallet options: a caller-owned transport plus app config.
#[cfg(feature = "ledger")]
#[derive(Clone)]
pub struct LedgerOptions {
    /// Framed exchange channel to the device. Exclusively locked per
    /// exchange; never driven concurrently.
    pub transport: SharedTransport,
    pub config: LedgerConfig,
}

#[cfg(feature = "ledger")]
impl fmt::Debug for LedgerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerOptions")
            .field("config", &self.config)
            .finish()
    }
}

/// Tagged union of the two construction modes. Exactly one is active per
/// wallet resolution.
#[derive(Debug, Clone)]
pub enum WalletOptions {
    Mnemonic(MnemonicOptions),
    #[cfg(feature = "ledger")]
    Ledger(LedgerOptions),
}

impl WalletOptions {
    pub fn is_ledger(&self) -> bool {
        #[cfg(feature = "ledger")]
        {
            matches!(self, WalletOptions::Ledger(_))
        }
        #[cfg(not(feature = "ledger"))]
        {
            false
        }
    }

    /// Software options, or `LedgerNotSupported` — the guard used by every
    /// factory without a hardware path.
    pub fn require_mnemonic(&self, network: Network) -> Result<&MnemonicOptions, SignerError> {
        match self {
            WalletOptions::Mnemonic(opts) => Ok(opts),
            #[cfg(feature = "ledger")]
            WalletOptions::Ledger(_) => Err(SignerError::LedgerNotSupported(network)),
        }
    }
}
