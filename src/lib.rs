//! Health-aware round-robin HTTP load balancer.
//!
//! ```text
//!     Client ──▶ http::server ──▶ http::dispatcher ──▶ http::transport ──▶ Backend
//!                                    │        ▲
//!                    next_candidate  │        │ is_healthy
//!                                    ▼        │
//!                              load_balancer::Registry ◀── health::HealthMonitor
//!                              (flags + cursor, 1 lock)     (periodic probes)
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::ProxyConfig;
pub use error::{ForwardError, ProxyError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::Registry;
