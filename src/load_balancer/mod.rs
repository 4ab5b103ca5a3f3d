//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → round_robin.rs (RotationScan starts at the shared cursor)
//!     → registry.rs (next_candidate: read-and-advance cursor, is_healthy)
//!     → backend.rs (target URI for the chosen backend)
//!     → dispatcher forwards, or moves on to the next candidate
//! ```
//!
//! # Design Decisions
//! - The backend list is fixed at startup; only liveness flags change
//! - Liveness flags and cursor share one lock in the registry
//! - Unhealthy backends are skipped, never removed
//! - Forward failures do not touch liveness; only the prober does

pub mod backend;
pub mod registry;
pub mod round_robin;

pub use backend::Backend;
pub use registry::{Candidate, Registry};
pub use round_robin::RotationScan;
