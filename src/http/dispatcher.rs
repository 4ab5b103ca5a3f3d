//! Request dispatch: health-aware round-robin with bounded retry.
//!
//! # Per-request state machine
//! ```text
//! SELECTING → FORWARDING → SUCCEEDED
//!     ↑            │
//!     └── failed ──┘   (next candidate in the same rotation)
//!
//! max_attempts rotations without success → UNAVAILABLE (503)
//! ```
//!
//! # Design Decisions
//! - The registry lock is never held across an outbound call
//! - A failed forward skips the candidate but leaves its liveness flag alone;
//!   only the health prober marks backends down
//! - Every attempt is one rotation of the pool, so a request inspects at most
//!   `max_attempts * pool size` candidates
//! - A candidate that does not produce a response head within the forward
//!   timeout counts as failed; the client never sees a timeout status
//! - A body too large to buffer goes to the first healthy candidate only. If
//!   that candidate fails the body is gone and the request ends in 503

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::Request;
use axum::response::Response;
use tokio::time;

use crate::error::ForwardError;
use crate::http::request::{prepare_body, upstream_request};
use crate::http::response;
use crate::http::transport::{HttpTransport, Transport};
use crate::load_balancer::{Backend, Registry, RotationScan};
use crate::observability::metrics;

/// Knobs for the dispatch loop.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// Full rotations to try before answering 503.
    pub max_attempts: u32,
    /// Largest inbound body buffered for replay across candidates.
    pub max_body_bytes: usize,
    /// Time one candidate gets to return a response head.
    pub forward_timeout: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_body_bytes: 2 * 1024 * 1024,
            forward_timeout: Duration::from_secs(30),
        }
    }
}

/// Handles one inbound request end to end.
pub struct Dispatcher<T = HttpTransport> {
    registry: Arc<Registry>,
    transport: T,
    policy: DispatchPolicy,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(registry: Arc<Registry>, transport: T, policy: DispatchPolicy) -> Self {
        Self {
            registry,
            transport,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Forward `request` to the next usable backend, or answer 503.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let started = Instant::now();
        let (parts, body) = request.into_parts();

        let mut body = match prepare_body(body, self.policy.max_body_bytes).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                return response::bad_request("Failed to read request body\n");
            }
        };
        if !body.is_replayable() {
            tracing::debug!(limit = self.policy.max_body_bytes, "Streaming large request body to a single candidate");
        }

        'attempts: for attempt in 1..=self.policy.max_attempts {
            let mut scan = RotationScan::begin(&self.registry);

            loop {
                let candidate = self.registry.next_candidate();
                let backend = candidate.backend;

                if self.registry.is_healthy(backend.address()) {
                    let Some(outbound) = body.take() else {
                        tracing::warn!(backend = %backend, "Streamed request body already spent on a failed candidate");
                        break 'attempts;
                    };
                    match self.forward(&parts, outbound, backend).await {
                        Ok(response) => {
                            metrics::record_request(
                                parts.method.as_str(),
                                response.status().as_u16(),
                                backend.address(),
                                started,
                            );
                            return response;
                        }
                        Err(e) => {
                            tracing::warn!(
                                backend = %backend,
                                attempt,
                                error = %e,
                                "Failed to proxy request to backend"
                            );
                            metrics::record_forward_failure(backend.address());
                        }
                    }
                }

                if scan.complete_after(candidate.index) {
                    break;
                }
            }

            tracing::debug!(attempt, start = scan.start(), inspected = scan.inspected(), "Rotation exhausted");
        }

        tracing::warn!(
            attempts = self.policy.max_attempts,
            healthy = self.registry.healthy_count(),
            "No healthy backend could serve the request"
        );
        metrics::record_pool_exhausted();
        metrics::record_request(parts.method.as_str(), 503, "none", started);
        response::unavailable()
    }

    async fn forward(
        &self,
        parts: &Parts,
        body: Body,
        backend: &Backend,
    ) -> Result<Response, ForwardError> {
        let request = upstream_request(parts, body, backend)?;
        tracing::debug!(backend = %backend, uri = %request.uri(), "Forwarding request");
        let upstream = time::timeout(self.policy.forward_timeout, self.transport.send(request))
            .await
            .map_err(|_| ForwardError::Timeout)??;
        Ok(response::stream_back(upstream, backend.address()))
    }
}
