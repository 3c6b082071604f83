//! Local persisted state.
//!
//! The only durable client state is a small preferences file: the
//! accepted-disclaimer flag (load-bearing, gates purchases) and the
//! reconnect convenience flag. Everything else lives on the chain or
//! in the wallet.

pub mod prefs;

pub use prefs::{DisclaimerRequired, Preferences};
