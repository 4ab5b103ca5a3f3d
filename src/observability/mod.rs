//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (backend, attempt, error) on every event
//! - Request ID carried on the per-request span
//! - Metrics are cheap (atomic increments) and no-ops when no recorder is installed

pub mod logging;
pub mod metrics;
