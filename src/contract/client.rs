//! Chain RPC client with failover and per-call timeouts.
//!
//! # Responsibilities
//! - Connect to the configured JSON-RPC endpoints
//! - Query chain state (chain id, balances, receipts, gas)
//! - Submit signed transactions
//!
//! Each call is attempted once per provider in order; a provider that
//! errors or times out is skipped for that call, never retried. The
//! caller decides whether to try again.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::ChainConfig;
use crate::observability::metrics;
use crate::wallet::WalletError;

/// Errors from chain interaction.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed on every provider.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The contract address in configuration is unusable.
    #[error("invalid contract address: {0}")]
    InvalidAddress(String),

    /// Transaction was not confirmed within the receipt window.
    /// The chain remains authoritative; the hash may still confirm.
    #[error("no receipt within {0} seconds; the transaction may still confirm")]
    ConfirmationTimeout(u64),

    /// Gas price exceeded the configured ceiling.
    #[error("gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Signing or wallet interaction failed during submission.
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// JSON-RPC client wrapper with failover support.
#[derive(Clone)]
pub struct ChainClient {
    /// Providers in priority order (primary + failovers).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    config: ChainConfig,
    timeout_duration: Duration,
}

impl ChainClient {
    /// Build a client from the chain configuration.
    pub fn new(config: &ChainConfig) -> ChainResult<Self> {
        let mut providers = Vec::new();

        let primary: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e| ChainError::Rpc(format!("invalid RPC URL '{}': {}", config.rpc_url, e)))?;
        providers.push(
            Arc::new(ProviderBuilder::new().connect_http(primary)) as Arc<dyn Provider + Send + Sync>
        );

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url))
                    as Arc<dyn Provider + Send + Sync>);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            failovers = providers.len() - 1,
            chain_id = config.chain_id,
            "Chain client initialized"
        );

        Ok(Self {
            providers,
            config: config.clone(),
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
        })
    }

    /// Run one call against each provider in order until one answers.
    async fn attempt<T, F, Fut>(&self, what: &str, call: F) -> ChainResult<T>
    where
        F: Fn(Arc<dyn Provider + Send + Sync>) -> Fut,
        Fut: std::future::Future<Output = Result<T, alloy::transports::TransportError>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            if i > 0 {
                metrics::record_rpc_failover(i);
            }
            match timeout(self.timeout_duration, call(Arc::clone(provider))).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                }
            }
        }
        Err(ChainError::Rpc(format!("all providers failed: {}", what)))
    }

    /// Get the chain ID reported by the RPC node.
    pub async fn get_chain_id(&self) -> ChainResult<u64> {
        self.attempt("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> ChainResult<u64> {
        self.attempt("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    /// Get the native-currency balance of an address.
    pub async fn get_balance(&self, address: Address) -> ChainResult<U256> {
        self.attempt("eth_getBalance", |p| async move { p.get_balance(address).await })
            .await
    }

    /// Get the transaction count (nonce) for an address.
    pub async fn get_transaction_count(&self, address: Address) -> ChainResult<u64> {
        self.attempt("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(address).await
        })
        .await
    }

    /// Get the current gas price in wei.
    pub async fn get_gas_price(&self) -> ChainResult<u128> {
        self.attempt("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    /// Execute a read-only call against the current chain state.
    pub async fn call(&self, tx: &TransactionRequest) -> ChainResult<Bytes> {
        self.attempt("eth_call", |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    /// Estimate gas for a transaction.
    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> ChainResult<u64> {
        self.attempt("eth_estimateGas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    /// Broadcast a signed transaction, returning its hash.
    pub async fn send_raw_transaction(&self, encoded: &[u8]) -> ChainResult<TxHash> {
        self.attempt("eth_sendRawTransaction", |p| async move {
            let pending = p.send_raw_transaction(encoded).await?;
            Ok(*pending.tx_hash())
        })
        .await
    }

    /// Get a transaction receipt by hash, if one exists yet.
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> ChainResult<Option<TransactionReceipt>> {
        self.attempt("eth_getTransactionReceipt", |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// The chain configuration this client was built from.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Number of confirmation blocks required for finality.
    pub fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("providers", &self.providers.len())
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChainConfig {
        ChainConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 1,
            confirmation_blocks: 1,
            gas_price_multiplier: 1.0,
            max_gas_price_gwei: 500,
        }
    }

    #[test]
    fn test_client_creation() {
        // Construction never dials; unreachable endpoints fail per call.
        let client = ChainClient::new(&test_config()).unwrap();
        assert_eq!(client.confirmation_blocks(), 1);
    }

    #[test]
    fn test_invalid_primary_url_rejected() {
        let mut config = test_config();
        config.rpc_url = "not a url".to_string();
        assert!(matches!(ChainClient::new(&config), Err(ChainError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_all_providers_failing_surface_one_error() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());
        let client = ChainClient::new(&config).unwrap();

        let result = client.get_chain_id().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("all providers failed"));
    }
}
