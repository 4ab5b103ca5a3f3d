//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend (concurrently, bounded by timeout)
//!     → Registry::mark_healthy
//! ```
//!
//! # Design Decisions
//! - The prober is the only writer of liveness flags
//! - A flag flips on a single probe result; staleness is bounded by the interval
//! - The loop has no error surface; it stops only on shutdown

pub mod active;

pub use active::HealthMonitor;
