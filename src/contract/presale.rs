//! The fixed presale contract: balance views and the purchase call.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::contract::client::{ChainClient, ChainError, ChainResult};
use crate::contract::units::format_native;
use crate::session::SessionPeer;
use crate::wallet::{WalletBridge, WalletError};

sol! {
    /// The presale contract surface: one payable entry point and two views.
    function buyTokens() external payable;
    function getTotalBNB() external view returns (uint256);
    function getRemainingTokens() external view returns (uint256);
}

/// Gas limit used when estimation is unavailable.
const FALLBACK_GAS_LIMIT: u64 = 150_000;
/// Receipt poll cadence.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Presale totals, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceInfo {
    /// Native currency raised so far.
    pub total_raised: U256,
    /// Tokens still available.
    pub remaining_tokens: U256,
}

impl BalanceInfo {
    /// Raised total as a display decimal.
    pub fn total_raised_display(&self) -> String {
        format_native(self.total_raised)
    }

    /// Remaining tokens as a display decimal.
    pub fn remaining_tokens_display(&self) -> String {
        format_native(self.remaining_tokens)
    }
}

/// Terminal outcome of a receipt wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptOutcome {
    /// Included and successful at the given block.
    Success { block_number: u64 },
    /// Included but reverted by the contract.
    Reverted,
}

/// Client for the fixed presale contract address.
pub struct PresaleContract {
    address: Address,
    chain: Arc<ChainClient>,
    /// Bound on the receipt poll loop, seconds.
    receipt_timeout_secs: u64,
}

impl PresaleContract {
    pub fn new(
        address: &str,
        chain: Arc<ChainClient>,
        receipt_timeout_secs: u64,
    ) -> ChainResult<Self> {
        let address = address
            .parse()
            .map_err(|_| ChainError::InvalidAddress(address.to_string()))?;
        Ok(Self {
            address,
            chain,
            receipt_timeout_secs,
        })
    }

    /// The contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Read the presale totals. Pure queries; RPC errors surface
    /// unretried.
    pub async fn balance_info(&self) -> ChainResult<BalanceInfo> {
        let total = self.view_u256(getTotalBNBCall {}.abi_encode()).await?;
        let remaining = self
            .view_u256(getRemainingTokensCall {}.abi_encode())
            .await?;
        Ok(BalanceInfo {
            total_raised: total,
            remaining_tokens: remaining,
        })
    }

    /// Both views return a single uint256, so one decoder covers them.
    async fn view_u256(&self, calldata: Vec<u8>) -> ChainResult<U256> {
        let tx = TransactionRequest::default()
            .with_to(self.address)
            .with_input(calldata);
        let data = self.chain.call(&tx).await?;
        getTotalBNBCall::abi_decode_returns(&data)
            .map_err(|e| ChainError::Rpc(format!("view returned malformed data: {}", e)))
    }

    /// Submit the purchase: `buyTokens()` with the amount as value.
    ///
    /// Returns the pending transaction hash immediately; confirmation
    /// is awaited separately via [`wait_for_receipt`](Self::wait_for_receipt).
    pub async fn purchase(&self, bridge: &WalletBridge, amount_wei: U256) -> ChainResult<TxHash> {
        let session = bridge
            .store()
            .current()
            .ok_or(ChainError::Wallet(WalletError::Unsupported(
                "no active session".to_string(),
            )))?;

        let calldata = buyTokensCall {}.abi_encode();
        match &session.peer {
            SessionPeer::Injected => {
                self.submit_local(bridge, session.address, amount_wei, calldata)
                    .await
            }
            SessionPeer::Relay { .. } => {
                self.submit_remote(bridge, session.address, amount_wei, calldata)
                    .await
            }
        }
    }

    /// Injected path: fill, sign locally, broadcast raw.
    async fn submit_local(
        &self,
        bridge: &WalletBridge,
        from: Address,
        amount_wei: U256,
        calldata: Vec<u8>,
    ) -> ChainResult<TxHash> {
        let signer = bridge
            .injected_signer()
            .await
            .ok_or(ChainError::Wallet(WalletError::Unsupported(
                "session has no local signer".to_string(),
            )))?;

        // Sync the nonce with the chain before every submission.
        let chain_nonce = self.chain.get_transaction_count(from).await?;
        signer.set_nonce(chain_nonce);
        let nonce = signer.get_and_increment_nonce();

        let config = self.chain.config();
        let gas_price = self.chain.get_gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;
        if gas_price_gwei > config.max_gas_price_gwei as u128 {
            return Err(ChainError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: config.max_gas_price_gwei,
            });
        }
        let adjusted_gas_price = (gas_price as f64 * config.gas_price_multiplier) as u128;

        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_to(self.address)
            .with_value(amount_wei)
            .with_input(calldata)
            .with_nonce(nonce)
            .with_gas_price(adjusted_gas_price)
            .with_chain_id(signer.chain_id());

        let gas_limit = match self.chain.estimate_gas(&tx).await {
            Ok(estimate) => estimate,
            Err(e) => {
                tracing::warn!(error = %e, fallback = FALLBACK_GAS_LIMIT, "Gas estimation failed");
                FALLBACK_GAS_LIMIT
            }
        };
        tx = tx.with_gas_limit(gas_limit);

        let wallet = EthereumWallet::from(signer.signer().clone());
        let envelope = tx
            .build(&wallet)
            .await
            .map_err(|e| ChainError::Wallet(WalletError::Verification(e.to_string())))?;

        let hash = self
            .chain
            .send_raw_transaction(&envelope.encoded_2718())
            .await?;
        tracing::info!(tx_hash = %hash, value = %amount_wei, "Purchase submitted (local signer)");
        Ok(hash)
    }

    /// Relay path: hand the transaction to the remote wallet for
    /// signing and broadcast.
    async fn submit_remote(
        &self,
        bridge: &WalletBridge,
        from: Address,
        amount_wei: U256,
        calldata: Vec<u8>,
    ) -> ChainResult<TxHash> {
        let params = json!([{
            "from": from.to_string(),
            "to": self.address.to_string(),
            "value": format!("0x{:x}", amount_wei),
            "data": format!("0x{}", alloy::hex::encode(&calldata)),
        }]);

        let result = bridge.request("eth_sendTransaction", params).await?;
        let hash: TxHash = result
            .as_str()
            .ok_or_else(|| ChainError::Rpc("wallet returned a non-string hash".to_string()))?
            .parse()
            .map_err(|e| ChainError::Rpc(format!("wallet returned malformed hash: {}", e)))?;

        tracing::info!(tx_hash = %hash, value = %amount_wei, "Purchase submitted (remote wallet)");
        Ok(hash)
    }

    /// Poll for the receipt until it has enough confirmations, the
    /// contract reverts, or the window closes.
    ///
    /// A timeout does not mean failure: the chain stays authoritative
    /// and the hash may still confirm later.
    pub async fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainResult<ReceiptOutcome> {
        let required = self.chain.confirmation_blocks() as u64;
        let window = Duration::from_secs(self.receipt_timeout_secs);

        let outcome = timeout(window, async {
            let mut ticker = interval(RECEIPT_POLL_INTERVAL);
            loop {
                ticker.tick().await;

                let receipt = match self.chain.get_transaction_receipt(tx_hash).await? {
                    Some(receipt) => receipt,
                    None => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                };

                if !receipt.status() {
                    return Ok(ReceiptOutcome::Reverted);
                }

                let current_block = self.chain.get_block_number().await?;
                let tx_block = receipt.block_number.unwrap_or(current_block);
                let confirmations = current_block.saturating_sub(tx_block) + 1;
                if confirmations >= required {
                    return Ok(ReceiptOutcome::Success {
                        block_number: tx_block,
                    });
                }

                tracing::debug!(
                    tx_hash = %tx_hash,
                    confirmations = confirmations,
                    required = required,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ChainError::ConfirmationTimeout(self.receipt_timeout_secs)),
        }
    }
}

impl std::fmt::Debug for PresaleContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresaleContract")
            .field("address", &self.address)
            .field("receipt_timeout_secs", &self.receipt_timeout_secs)
            .finish()
    }
}
