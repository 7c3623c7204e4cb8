//! Client configuration.

use crate::wallet::NetworkConfig;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the mint client.
///
/// Every field has a default, so an empty `gaia-mint.toml` (or none at all)
/// yields a client for the testnet sale.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::network_id")]
    pub network_id: String,

    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::fallback_rpc_url")]
    pub fallback_rpc_url: String,

    #[serde(default = "defaults::wallet_url")]
    pub wallet_url: String,

    #[serde(default = "defaults::helper_url")]
    pub helper_url: String,

    #[serde(default = "defaults::explorer_url")]
    pub explorer_url: String,

    #[serde(default = "defaults::contract_id")]
    pub contract_id: String,

    #[serde(default = "defaults::credentials_path")]
    pub credentials_path: String,

    /// Base64 AES-256 key. Credentials are stored in plaintext when unset.
    #[serde(default)]
    pub credentials_key: Option<String>,

    #[serde(default)]
    pub success_url: Option<String>,

    #[serde(default)]
    pub failure_url: Option<String>,

    #[serde(default = "defaults::max_gas")]
    pub max_gas: u64,

    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "defaults::free_limit")]
    pub free_limit: u64,

    #[serde(default = "defaults::total_supply")]
    pub total_supply: u64,

    /// Price in NEAR once the free allocation is gone.
    #[serde(default = "defaults::mint_price")]
    pub mint_price: String,

    /// Refuse to mint before the first sale phase opens.
    #[serde(default = "defaults::enforce_schedule")]
    pub enforce_schedule: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_id: defaults::network_id(),
            rpc_url: defaults::rpc_url(),
            fallback_rpc_url: defaults::fallback_rpc_url(),
            wallet_url: defaults::wallet_url(),
            helper_url: defaults::helper_url(),
            explorer_url: defaults::explorer_url(),
            contract_id: defaults::contract_id(),
            credentials_path: defaults::credentials_path(),
            credentials_key: None,
            success_url: None,
            failure_url: None,
            max_gas: defaults::max_gas(),
            poll_interval_ms: defaults::poll_interval_ms(),
            free_limit: defaults::free_limit(),
            total_supply: defaults::total_supply(),
            mint_price: defaults::mint_price(),
            enforce_schedule: defaults::enforce_schedule(),
        }
    }
}

impl Config {
    /// Network part of the configuration, handed to the session manager.
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            network_id: self.network_id.clone(),
            node_url: self.rpc_url.clone(),
            fallback_node_url: self.fallback_rpc_url.clone(),
            wallet_url: self.wallet_url.clone(),
            helper_url: self.helper_url.clone(),
            explorer_url: self.explorer_url.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

mod defaults {
    pub fn network_id() -> String {
        "testnet".into()
    }

    pub fn rpc_url() -> String {
        "https://rpc.testnet.near.org".into()
    }

    pub fn fallback_rpc_url() -> String {
        "https://test.rpc.fastnear.com".into()
    }

    pub fn wallet_url() -> String {
        "https://wallet.testnet.near.org".into()
    }

    pub fn helper_url() -> String {
        "https://helper.testnet.near.org".into()
    }

    pub fn explorer_url() -> String {
        "https://explorer.testnet.near.org".into()
    }

    pub fn contract_id() -> String {
        "gloryfifth.testnet".into()
    }

    pub fn credentials_path() -> String {
        "./credentials/gaia-mint.json".into()
    }

    pub fn max_gas() -> u64 {
        300_000_000_000_000
    }

    pub fn poll_interval_ms() -> u64 {
        2_000
    }

    pub fn free_limit() -> u64 {
        434
    }

    pub fn total_supply() -> u64 {
        538
    }

    pub fn mint_price() -> String {
        "5".into()
    }

    pub fn enforce_schedule() -> bool {
        true
    }
}
