//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Backend URLs are absolute, `http`, unique
//! - Value ranges (intervals, timeouts and attempts > 0, port != 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::new("backends", "at least one backend is required"));
    }

    let mut seen = HashSet::new();
    for (i, address) in config.backends.iter().enumerate() {
        let field = format!("backends[{i}]");
        match Url::parse(address) {
            Ok(url) => {
                if url.scheme() != "http" {
                    errors.push(ValidationError::new(&field, format!("unsupported scheme {:?}", url.scheme())));
                }
                if url.host_str().is_none() {
                    errors.push(ValidationError::new(&field, "missing host"));
                }
            }
            Err(e) => errors.push(ValidationError::new(&field, format!("invalid URL {address:?}: {e}"))),
        }
        if !seen.insert(address.trim_end_matches('/')) {
            errors.push(ValidationError::new(&field, format!("duplicate backend {address:?}")));
        }
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::new("health_check.interval_secs", "must be > 0"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::new("health_check.timeout_secs", "must be > 0"));
    }
    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::new("health_check.path", "must start with '/'"));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be > 0"));
    }
    if config.timeouts.forward_secs == 0 {
        errors.push(ValidationError::new("timeouts.forward_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
