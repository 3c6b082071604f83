//! The purchase flow controller.
//!
//! # Responsibilities
//! - Validate input and session before anything touches the chain
//! - Drive the state machine through submission and confirmation
//! - Keep the transaction record log
//! - Map every failure to the purchase error taxonomy
//!
//! # State machine
//! ```text
//! Idle → Validating → AwaitingSignature → Submitted → Confirmed
//!                 ↘──────────────┴────────────┴─────→ Failed
//! ```
//! Terminal states release the guard; a fresh user action starts the
//! next flow. Nothing is retried automatically.

use alloy::primitives::{TxHash, U256};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::contract::presale::ReceiptOutcome;
use crate::contract::PresaleContract;
use crate::observability::metrics;
use crate::purchase::types::{
    PurchaseError, PurchaseIntent, PurchaseState, TransactionRecord, TxStatus,
};
use crate::session::SessionStore;
use crate::wallet::pairing::unix_now;
use crate::wallet::WalletBridge;

/// Orchestrates a single purchase at a time.
pub struct PurchaseController {
    store: Arc<SessionStore>,
    contract: Arc<PresaleContract>,
    bridge: Arc<WalletBridge>,
    /// Minimum purchase in base units.
    min_purchase_wei: U256,
    /// Concurrency guard; holds the current state.
    state: AtomicU8,
    /// Observable state trajectory.
    state_tx: watch::Sender<PurchaseState>,
    /// Log of submitted transactions by hash.
    records: DashMap<TxHash, TransactionRecord>,
}

impl PurchaseController {
    pub fn new(
        store: Arc<SessionStore>,
        contract: Arc<PresaleContract>,
        bridge: Arc<WalletBridge>,
        min_purchase_wei: U256,
    ) -> Self {
        let (state_tx, _) = watch::channel(PurchaseState::Idle);
        Self {
            store,
            contract,
            bridge,
            min_purchase_wei,
            state: AtomicU8::new(PurchaseState::Idle.as_u8()),
            state_tx,
            records: DashMap::new(),
        }
    }

    /// Current flow state.
    pub fn state(&self) -> PurchaseState {
        PurchaseState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Watch the state trajectory.
    pub fn watch(&self) -> watch::Receiver<PurchaseState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the transaction record log.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    /// Look up one record by hash.
    pub fn record(&self, hash: TxHash) -> Option<TransactionRecord> {
        self.records.get(&hash).map(|r| r.value().clone())
    }

    /// Run the full purchase flow for a user-supplied decimal amount.
    ///
    /// Refuses with [`PurchaseError::Busy`] if a flow is already past
    /// `Idle`; that refusal has no side effect on the running flow.
    pub async fn purchase(&self, amount: &str) -> Result<TransactionRecord, PurchaseError> {
        self.state
            .compare_exchange(
                PurchaseState::Idle.as_u8(),
                PurchaseState::Validating.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| PurchaseError::Busy)?;
        self.state_tx.send_replace(PurchaseState::Validating);

        let result = self.run_flow(amount).await;

        let terminal = match &result {
            Ok(_) => PurchaseState::Confirmed,
            // Rejected input never left Validating: back to Idle, no
            // side effect.
            Err(PurchaseError::Validation(_)) => PurchaseState::Idle,
            Err(_) => PurchaseState::Failed,
        };
        self.state_tx.send_replace(terminal);
        // Release the guard: terminal states return the flow to Idle.
        self.state
            .store(PurchaseState::Idle.as_u8(), Ordering::SeqCst);

        result
    }

    async fn run_flow(&self, amount: &str) -> Result<TransactionRecord, PurchaseError> {
        let intent = self.validate(amount)?;

        self.advance(PurchaseState::AwaitingSignature);
        let hash = self
            .contract
            .purchase(&self.bridge, intent.amount_wei)
            .await?;

        let record = TransactionRecord {
            hash,
            intent_id: intent.id,
            status: TxStatus::Pending,
            submitted_at: unix_now(),
        };
        self.records.insert(hash, record.clone());
        metrics::record_purchase_submitted();
        self.advance(PurchaseState::Submitted);

        match self.contract.wait_for_receipt(hash).await {
            Ok(ReceiptOutcome::Success { block_number }) => {
                let record = self.update_status(hash, TxStatus::Confirmed { block_number });
                metrics::record_purchase_outcome("confirmed");
                tracing::info!(tx_hash = %hash, block = block_number, "Purchase confirmed");
                Ok(record)
            }
            Ok(ReceiptOutcome::Reverted) => {
                self.update_status(hash, TxStatus::Failed);
                metrics::record_purchase_outcome("failed");
                tracing::warn!(tx_hash = %hash, "Purchase reverted by the contract");
                Err(PurchaseError::ChainRejected { hash })
            }
            Err(crate::contract::ChainError::ConfirmationTimeout(secs)) => {
                // The record stays Pending: only the chain can decide.
                metrics::record_purchase_outcome("pending");
                tracing::warn!(tx_hash = %hash, "Receipt wait timed out; transaction still pending");
                Err(PurchaseError::ReceiptTimeout { hash, secs })
            }
            Err(e) => {
                metrics::record_purchase_outcome("pending");
                Err(e.into())
            }
        }
    }

    /// Validation stage: session connected, amount well-formed and
    /// above the minimum. Failures here have no side effect.
    fn validate(&self, amount: &str) -> Result<PurchaseIntent, PurchaseError> {
        let session = self
            .store
            .current()
            .ok_or_else(|| PurchaseError::Validation("connect a wallet first".to_string()))?;

        let amount_wei = crate::contract::parse_native(amount)
            .map_err(|e| PurchaseError::Validation(e.to_string()))?;

        if amount_wei < self.min_purchase_wei {
            return Err(PurchaseError::Validation(format!(
                "minimum purchase is {}",
                crate::contract::format_native(self.min_purchase_wei)
            )));
        }

        Ok(PurchaseIntent::new(amount_wei, session.address))
    }

    fn advance(&self, state: PurchaseState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
        self.state_tx.send_replace(state);
        tracing::debug!(state = %state, "Purchase flow advanced");
    }

    fn update_status(&self, hash: TxHash, status: TxStatus) -> TransactionRecord {
        let mut entry = self
            .records
            .entry(hash)
            .or_insert_with(|| TransactionRecord {
                hash,
                intent_id: uuid::Uuid::nil(),
                status: TxStatus::Pending,
                submitted_at: unix_now(),
            });
        entry.status = status;
        entry.value().clone()
    }
}

impl std::fmt::Debug for PurchaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchaseController")
            .field("state", &self.state())
            .field("records", &self.records.len())
            .finish()
    }
}
