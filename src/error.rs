//! Error types shared across subsystems.

use thiserror::Error;

use crate::config::loader::ConfigError;

/// Boxed error used for upstream failures whose concrete type is not interesting.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a single candidate could not serve a request.
///
/// None of these are surfaced to the caller; the dispatcher logs them and moves
/// on to the next candidate.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream call failed: {0}")]
    Upstream(#[source] BoxError),

    #[error("upstream call timed out")]
    Timeout,
}

/// Errors that stop the proxy from starting or serving.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid backend address {address:?}: {source}")]
    InvalidBackend {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("backend pool is empty")]
    EmptyPool,

    #[error("backend {0:?} is listed more than once")]
    DuplicateBackend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
