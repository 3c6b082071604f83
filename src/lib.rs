//! Token-presale client: wallet sessions and the purchase flow.
//!
//! The library is organized leaf to root:
//! - [`session`]: the single session cell and its change events
//! - [`wallet`]: injected and relay connection paths, normalized into
//!   one session shape
//! - [`contract`]: the fixed presale contract (views, purchase call,
//!   receipt wait) and exact unit conversion
//! - [`purchase`]: the one-at-a-time purchase state machine
//!
//! Cross-cutting: [`config`], [`observability`], [`lifecycle`],
//! [`storage`]. The application root in `main.rs` wires everything
//! together and passes references down; there are no globals.

pub mod config;
pub mod contract;
pub mod lifecycle;
pub mod observability;
pub mod purchase;
pub mod session;
pub mod storage;
pub mod wallet;

pub use config::AppConfig;
pub use contract::{ChainClient, PresaleContract};
pub use lifecycle::Shutdown;
pub use purchase::PurchaseController;
pub use session::SessionStore;
pub use wallet::WalletBridge;
