//! Purchase flow types: states, intents, records, errors.

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::contract::ChainError;
use crate::wallet::WalletError;

/// States of the purchase flow.
///
/// Stored in an atomic so the guard can refuse re-entry without a
/// lock; mirrored through a watch channel for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PurchaseState {
    Idle = 0,
    Validating = 1,
    AwaitingSignature = 2,
    Submitted = 3,
    Confirmed = 4,
    Failed = 5,
}

impl PurchaseState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PurchaseState::Validating,
            2 => PurchaseState::AwaitingSignature,
            3 => PurchaseState::Submitted,
            4 => PurchaseState::Confirmed,
            5 => PurchaseState::Failed,
            _ => PurchaseState::Idle,
        }
    }
}

impl std::fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PurchaseState::Idle => "idle",
            PurchaseState::Validating => "validating",
            PurchaseState::AwaitingSignature => "awaiting-signature",
            PurchaseState::Submitted => "submitted",
            PurchaseState::Confirmed => "confirmed",
            PurchaseState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A validated request to purchase, bound to the session's account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseIntent {
    pub id: Uuid,
    pub amount_wei: U256,
    pub account: Address,
}

impl PurchaseIntent {
    pub fn new(amount_wei: U256, account: Address) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount_wei,
            account,
        }
    }
}

/// Status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Broadcast, no conclusive receipt yet.
    Pending,
    /// Receipt with success status and enough confirmations.
    Confirmed { block_number: u64 },
    /// Receipt with revert status.
    Failed,
}

/// Local record of a submitted purchase transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: TxHash,
    /// The intent that produced this transaction.
    pub intent_id: Uuid,
    pub status: TxStatus,
    /// Unix second of broadcast.
    pub submitted_at: u64,
}

/// Errors surfaced by the purchase flow. All are user-facing messages.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// A purchase is already in flight; wait for its terminal state.
    #[error("a purchase is already in progress")]
    Busy,

    /// Input or session validation failed; nothing was submitted.
    #[error("{0}")]
    Validation(String),

    /// The wallet declined or failed during signing.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Chain interaction failed before or after submission.
    #[error(transparent)]
    Chain(ChainError),

    /// The contract reverted the purchase. The session stays connected.
    #[error("transaction {hash} was reverted by the contract")]
    ChainRejected { hash: TxHash },

    /// No receipt within the window; the chain stays authoritative.
    #[error("no receipt for {hash} within {secs} seconds; it may still confirm")]
    ReceiptTimeout { hash: TxHash, secs: u64 },
}

impl From<ChainError> for PurchaseError {
    fn from(e: ChainError) -> Self {
        // Wallet failures keep their taxonomy even when they surface
        // through the contract client.
        match e {
            ChainError::Wallet(wallet) => PurchaseError::Wallet(wallet),
            other => PurchaseError::Chain(other),
        }
    }
}
