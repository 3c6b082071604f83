//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast → relay pump / dispatcher tasks exit
//!
//! Signals (signals.rs):
//!     ctrl-c → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-lived task subscribes
//! - Submitted transactions are never cancelled: shutdown abandons
//!   only the local wait, the chain stays authoritative

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
