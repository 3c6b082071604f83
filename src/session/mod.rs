//! Wallet session state.
//!
//! # Data Flow
//! ```text
//! WalletBridge (sole writer)
//!     → store.rs (ArcSwap cell + broadcast of SessionEvent)
//!     → readers (purchase controller, contract client, CLI)
//! ```
//!
//! # Design Decisions
//! - One process-wide session cell, owned by the application root and
//!   passed by reference; no module-level singleton
//! - Mutation is crate-private so only the wallet subsystem can write
//! - Changes fan out through a typed event channel, not callbacks

pub mod store;

pub use store::{Session, SessionEvent, SessionPeer, SessionStore};
