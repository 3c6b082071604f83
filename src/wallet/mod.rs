//! Wallet connection subsystem.
//!
//! # Data Flow
//! ```text
//! connect()
//!     → bridge.rs (path selection, stale-state teardown)
//!         → injected.rs (local signer, chain check, ownership proof)
//!         → relay.rs + pairing.rs + protocol.rs
//!           (pairing URI → remote approval → settled session)
//!     → session store (written only here)
//! ```
//!
//! # Design Decisions
//! - Two connection paths normalized into one `Session` shape
//! - At most one active pairing; a new connect tears the old one down
//! - Wallet events arrive as a tagged enum consumed by one dispatcher
//!   task, never as ad-hoc callbacks
//! - All failures map to the `WalletError` taxonomy; every variant is
//!   recoverable by re-initiating from a clean state

pub mod bridge;
pub mod injected;
pub mod pairing;
pub mod protocol;
pub mod relay;
pub mod types;

pub use bridge::WalletBridge;
pub use injected::InjectedSigner;
pub use pairing::Pairing;
pub use relay::RelayConnection;
pub use types::{WalletError, WalletResult};
