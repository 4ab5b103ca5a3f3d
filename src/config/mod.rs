//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → cloned into the server, prober and transport at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend pool is fixed for the process lifetime
//! - All fields have defaults so an empty file is a valid config
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    DemoConfig, HealthCheckConfig, LimitsConfig, ListenerConfig, ObservabilityConfig,
    ProxyConfig, RetryConfig, TimeoutConfig, TransportConfig,
};
