//! OS signal handling.
//!
//! # Responsibilities
//! - Translate ctrl-c into the internal shutdown signal
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Abandoning a receipt wait leaves the record pending; the chain
//!   remains authoritative and the hash is reported to the user

/// Resolve when the user asks the process to stop.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
    }
}
