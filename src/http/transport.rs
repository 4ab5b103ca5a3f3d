//! Outbound HTTP transport.
//!
//! # Responsibilities
//! - Own the upstream client configuration (pool size, idle timeout, connect timeout)
//! - Execute exactly one outbound call per `send`
//!
//! Retry and failover policy live in the dispatcher, never here.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::TransportConfig;
use crate::error::ForwardError;

/// A single-shot outbound HTTP call.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send;
}

/// Pooled hyper client used for both proxied requests and liveness probes.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .build(connector);

        Self { client }
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send {
        let call = self.client.request(request);
        async move {
            let response = call
                .await
                .map_err(|e| ForwardError::Upstream(Box::new(e)))?;
            Ok(response.map(Body::new))
        }
    }
}
