//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! presale client. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the presale client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Application identity and presale metadata.
    pub app: AppSection,

    /// Chain connection settings.
    pub chain: ChainConfig,

    /// Presale contract settings.
    pub contract: ContractConfig,

    /// Wallet connection settings.
    pub wallet: WalletConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Local storage settings.
    pub storage: StorageConfig,
}

/// Application identity section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSection {
    /// Project identifier registered with the relay service.
    /// Required; may also be supplied via `PRESALE_PROJECT_ID`.
    pub project_id: String,

    /// Human-readable application name (shown to wallets during pairing).
    pub name: String,

    /// Presale end as a unix timestamp (seconds). Drives the countdown.
    pub presale_end_unix: Option<u64>,

    /// Optional endpoint returning authoritative server time as JSON.
    pub time_api_url: Option<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            name: "Token Presale".to_string(),
            presale_end_unix: None,
            time_api_url: None,
        }
    }
}

/// Chain connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 56 for BNB Smart Chain, 31337 for local Anvil).
    /// Required: zero is rejected at validation.
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u32,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://bsc-dataseed.binance.org".to_string(),
            failover_urls: Vec::new(),
            chain_id: 0,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
        }
    }
}

/// Presale contract configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Address of the presale contract. Required.
    pub address: String,

    /// Minimum purchase in native currency, as an exact decimal string.
    pub min_purchase: String,

    /// Maximum time to wait for a transaction receipt, in seconds.
    pub receipt_timeout_secs: u64,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            min_purchase: "0.01".to_string(),
            receipt_timeout_secs: 180,
        }
    }
}

/// Which wallet connection path to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WalletMode {
    /// Use an injected signer when one is available, else relay pairing.
    #[default]
    Auto,
    /// Only the locally injected signer; fail if none is present.
    Injected,
    /// Only relay pairing with a remote wallet.
    Relay,
}

/// Wallet connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Connection path selection.
    pub mode: WalletMode,

    /// Relay WebSocket endpoint for remote wallet pairing.
    pub relay_url: String,

    /// How long to wait for pairing approval before giving up, in seconds.
    pub pairing_timeout_secs: u64,

    /// How long to wait for the remote wallet to answer a request
    /// (e.g. transaction signing), in seconds.
    pub request_timeout_secs: u64,

    /// Lifetime requested for an approved session, in seconds.
    pub session_ttl_secs: u64,

    /// Message signed by the wallet to prove account ownership.
    pub verify_message: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            mode: WalletMode::Auto,
            relay_url: "wss://relay.walletconnect.com".to_string(),
            pairing_timeout_secs: 30,
            request_timeout_secs: 120,
            session_ttl_secs: 7 * 24 * 3600,
            verify_message: "Verify presale participation".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Local storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON file holding persisted preferences.
    pub prefs_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefs_path: "presale-prefs.json".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.wallet.pairing_timeout_secs, 30);
        assert_eq!(config.contract.min_purchase, "0.01");
        assert_eq!(config.chain.chain_id, 0);
        assert!(config.app.project_id.is_empty());
    }

    #[test]
    fn test_minimal_toml() {
        let toml = r#"
            [app]
            project_id = "abc123"

            [chain]
            chain_id = 56

            [contract]
            address = "0x42395Db998595DC7256aF2a6f10DC7b2E6006993"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.app.project_id, "abc123");
        assert_eq!(config.chain.chain_id, 56);
        assert_eq!(config.wallet.mode, WalletMode::Auto);
        assert_eq!(config.wallet.request_timeout_secs, 120);
    }

    #[test]
    fn test_wallet_mode_parsing() {
        let toml = r#"
            [wallet]
            mode = "relay"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.wallet.mode, WalletMode::Relay);
    }
}
