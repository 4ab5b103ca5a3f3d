//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server by its parsed base URL
//! - Build outbound and probe URIs against that base
//!
//! Liveness is not stored here; it lives in the [`Registry`](super::registry::Registry)
//! alongside the rotation cursor so both are guarded by the same lock.

use std::fmt;

use axum::http::Uri;
use url::Url;

use crate::error::ProxyError;

/// A single backend server. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// Address exactly as configured; the registry key.
    address: String,
    /// Parsed base URL.
    base_url: Url,
}

impl Backend {
    /// Parse a backend from its configured address.
    pub fn parse(address: &str) -> Result<Self, ProxyError> {
        let base_url = Url::parse(address).map_err(|source| ProxyError::InvalidBackend {
            address: address.to_string(),
            source,
        })?;
        Ok(Self {
            address: address.to_string(),
            base_url,
        })
    }

    /// The configured address string.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Target URI for a proxied request: base URL with `path_and_query` appended.
    pub fn target_uri(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let suffix = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{path_and_query}")
        };
        Ok(format!("{base}{suffix}").parse::<Uri>()?)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
