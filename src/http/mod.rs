//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, every path → dispatcher)
//!     → request.rs (request ID, buffer body)
//!     → dispatcher.rs (round-robin over healthy backends, retry)
//!     → transport.rs (one pooled outbound call)
//!     → response.rs (stream upstream response back, or 503)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;
pub mod transport;

pub use dispatcher::{DispatchPolicy, Dispatcher};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
pub use transport::{HttpTransport, Transport};
