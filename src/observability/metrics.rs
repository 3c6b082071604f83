//! Metrics collection.
//!
//! # Responsibilities
//! - Define presale-flow metrics (connects, purchases, RPC failovers)
//! - Keep metric updates cheap (atomic counter increments)
//!
//! # Metrics
//! - `presale_connect_attempts_total` (counter): by connection path
//! - `presale_connect_outcomes_total` (counter): by path and outcome
//! - `presale_purchases_submitted_total` (counter)
//! - `presale_purchase_outcomes_total` (counter): by terminal status
//! - `presale_rpc_failovers_total` (counter): by provider index
//!
//! # Design Decisions
//! - No exporter endpoint is started; recorders are installed by the
//!   embedding environment (or nowhere, in which case these are no-ops)

use metrics::counter;

/// A wallet connect attempt started on the given path.
pub fn record_connect_attempt(path: &'static str) {
    counter!("presale_connect_attempts_total", "path" => path).increment(1);
}

/// A wallet connect attempt finished.
pub fn record_connect_outcome(path: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("presale_connect_outcomes_total", "path" => path, "outcome" => outcome).increment(1);
}

/// A purchase transaction was broadcast.
pub fn record_purchase_submitted() {
    counter!("presale_purchases_submitted_total").increment(1);
}

/// A purchase reached a terminal state (`confirmed`, `failed`, `pending`).
pub fn record_purchase_outcome(status: &'static str) {
    counter!("presale_purchase_outcomes_total", "status" => status).increment(1);
}

/// An RPC call fell through to a failover provider.
pub fn record_rpc_failover(provider_idx: usize) {
    counter!("presale_rpc_failovers_total", "provider" => provider_idx.to_string()).increment(1);
}
