//! Purchase flow subsystem.
//!
//! # Data Flow
//! ```text
//! amount string
//!     → controller.rs   Idle → Validating → AwaitingSignature
//!                            → Submitted → Confirmed | Failed
//!     → contract client (submission + receipt)
//!     → transaction record log
//! ```
//!
//! # Design Decisions
//! - One flow at a time: an atomic guard refuses re-entry while a
//!   purchase is anywhere between Validating and a terminal state
//! - Failures are terminal for the intent; the controller resets to
//!   Idle and a fresh user action is required, never an automatic retry

pub mod controller;
pub mod types;

pub use controller::PurchaseController;
pub use types::{PurchaseError, PurchaseState, TransactionRecord, TxStatus};
