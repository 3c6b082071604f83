//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Whatever metrics recorder the embedding environment installs
//! ```
//!
//! # Design Decisions
//! - Structured logging via tracing, one init at the application root
//! - Metrics are cheap (atomic increments) and optional: without a
//!   recorder they are no-ops

pub mod logging;
pub mod metrics;
