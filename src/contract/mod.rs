//! Presale contract subsystem.
//!
//! # Data Flow
//! ```text
//! units.rs    decimal string ⇄ base units (exact, no floats)
//! client.rs   JSON-RPC with failover and per-call timeout
//! presale.rs  fixed ABI surface: balance views + purchase call
//! ```
//!
//! # Design Decisions
//! - Read calls surface RPC errors without retry; the caller owns
//!   retry policy
//! - `purchase` returns the pending hash immediately; the receipt is
//!   awaited separately

pub mod client;
pub mod presale;
pub mod units;

pub use client::{ChainClient, ChainError, ChainResult};
pub use presale::{BalanceInfo, PresaleContract, ReceiptOutcome};
pub use units::{format_native, parse_native, AmountError};
