//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend
//! - Write the classification into the registry
//!
//! A probe is healthy when the backend answers with any non-5xx status within
//! the probe timeout. Connection errors, timeouts, 5xx and panicking probes all
//! count as unhealthy. One backend's failure never affects the others or the loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::error::ForwardError;
use crate::http::transport::{HttpTransport, Transport};
use crate::load_balancer::{Backend, Registry};
use crate::observability::metrics;

const PROBE_USER_AGENT: &str = concat!("rotor-lb-health-check/", env!("CARGO_PKG_VERSION"));

pub struct HealthMonitor<T = HttpTransport> {
    registry: Arc<Registry>,
    transport: Arc<T>,
    config: HealthCheckConfig,
}

impl<T: Transport> HealthMonitor<T> {
    pub fn new(registry: Arc<Registry>, transport: Arc<T>, config: HealthCheckConfig) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    /// Probe forever on a fixed interval until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        tokio::select! {
            _ = time::sleep(Duration::from_secs(self.config.initial_delay_secs)) => {}
            _ = shutdown.recv() => {
                tracing::info!("Health monitor received shutdown signal before first probe");
                return;
            }
        }

        // `interval` panics on a zero period.
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend concurrently and record the results.
    ///
    /// Returns `(address, healthy)` in registry order.
    pub async fn probe_once(&self) -> Vec<(String, bool)> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut probes = JoinSet::new();
        let mut owners = HashMap::new();

        for (index, backend) in self.registry.backends().iter().enumerate() {
            let transport = self.transport.clone();
            let backend = backend.clone();
            let path = self.config.path.clone();
            let handle = probes.spawn(async move {
                let outcome = probe(transport.as_ref(), &backend, &path, timeout).await;
                (index, outcome)
            });
            owners.insert(handle.id(), index);
        }

        let mut results = vec![false; self.registry.len()];
        while let Some(joined) = probes.join_next().await {
            let (index, healthy) = match joined {
                Ok((index, outcome)) => (index, self.record(index, outcome)),
                Err(e) => {
                    let Some(&index) = owners.get(&e.id()) else {
                        tracing::error!(error = %e, "Health probe task failed");
                        continue;
                    };
                    tracing::error!(backend = %self.registry.backends()[index], error = %e, "Health probe task failed");
                    (index, self.apply(index, false))
                }
            };
            results[index] = healthy;
        }

        self.registry
            .backends()
            .iter()
            .zip(results)
            .map(|(b, healthy)| (b.address().to_string(), healthy))
            .collect()
    }

    fn record(&self, index: usize, outcome: Result<StatusCode, ForwardError>) -> bool {
        let backend = &self.registry.backends()[index];
        let healthy = match &outcome {
            Ok(status) if status.is_server_error() => {
                tracing::warn!(backend = %backend, status = %status, "Server down");
                false
            }
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(backend = %backend, error = %e, "Server down");
                false
            }
        };
        self.apply(index, healthy)
    }

    fn apply(&self, index: usize, healthy: bool) -> bool {
        let backend = &self.registry.backends()[index];
        match self.registry.mark_healthy(backend.address(), healthy) {
            Some(false) if healthy => tracing::info!(backend = %backend, "Backend recovered"),
            Some(true) if !healthy => tracing::warn!(backend = %backend, "Backend marked unhealthy"),
            _ => {}
        }
        metrics::record_backend_health(backend.address(), healthy);
        healthy
    }
}

/// Issue one liveness probe against `backend`.
async fn probe<T: Transport>(
    transport: &T,
    backend: &Backend,
    path: &str,
    timeout: Duration,
) -> Result<StatusCode, ForwardError> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(backend.target_uri(path)?)
        .header(header::USER_AGENT, PROBE_USER_AGENT)
        .body(Body::empty())?;

    match time::timeout(timeout, transport.send(request)).await {
        Ok(response) => response.map(|r| r.status()),
        Err(_) => Err(ForwardError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transport::testing::{Behavior, FakeTransport};

    fn monitor(transport: FakeTransport) -> HealthMonitor<FakeTransport> {
        let registry = Arc::new(
            Registry::from_addresses(&["http://a:1", "http://b:1", "http://c:1", "http://d:1"]).unwrap(),
        );
        let config = HealthCheckConfig {
            interval_secs: 1,
            timeout_secs: 1,
            path: "/".into(),
            initial_delay_secs: 0,
        };
        HealthMonitor::new(registry, Arc::new(transport), config)
    }

    #[tokio::test]
    async fn classifies_each_backend_independently() {
        let transport = FakeTransport::new();
        transport.set("b:1", Behavior::Fail);
        transport.set("c:1", Behavior::Respond(StatusCode::SERVICE_UNAVAILABLE, ""));
        transport.set("d:1", Behavior::Respond(StatusCode::NOT_FOUND, ""));
        let m = monitor(transport);

        let results = m.probe_once().await;
        assert_eq!(
            results,
            vec![
                ("http://a:1".to_string(), true),
                ("http://b:1".to_string(), false),
                ("http://c:1".to_string(), false),
                ("http://d:1".to_string(), true),
            ]
        );
        assert_eq!(m.registry.snapshot(), results);
    }

    #[tokio::test]
    async fn recovered_backend_is_marked_healthy_again() {
        let transport = FakeTransport::new();
        transport.set("a:1", Behavior::Fail);
        let m = monitor(transport);

        m.probe_once().await;
        assert!(!m.registry.is_healthy("http://a:1"));

        m.transport.set("a:1", Behavior::Respond(StatusCode::OK, "up"));
        m.probe_once().await;
        assert!(m.registry.is_healthy("http://a:1"));
    }

    #[tokio::test]
    async fn panicking_check_marks_only_its_backend_down() {
        let transport = FakeTransport::new();
        transport.set("c:1", Behavior::Panic);
        let m = monitor(transport);

        let results = m.probe_once().await;
        assert_eq!(results[2], ("http://c:1".to_string(), false));
        assert_eq!(m.registry.healthy_count(), 3);
    }

    #[tokio::test]
    async fn checks_every_backend_each_cycle() {
        let m = monitor(FakeTransport::new());
        m.probe_once().await;
        let mut calls = m.transport.calls();
        calls.sort();
        assert_eq!(calls, vec!["a:1", "b:1", "c:1", "d:1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_checks_on_interval_and_stops_on_shutdown() {
        let transport = FakeTransport::new();
        transport.set("a:1", Behavior::Fail);
        let m = monitor(transport);
        let registry = m.registry.clone();
        let (tx, rx) = broadcast::channel(1);

        let task = tokio::spawn(m.run(rx));
        time::sleep(Duration::from_millis(1500)).await;
        assert!(!registry.is_healthy("http://a:1"));

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_runs_at_one_second_instead_of_panicking() {
        let mut m = monitor(FakeTransport::new());
        m.config.interval_secs = 0;
        let transport = m.transport.clone();
        let (tx, rx) = broadcast::channel(1);

        let task = tokio::spawn(m.run(rx));
        time::sleep(Duration::from_millis(2500)).await;
        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

        // Cycles at 0s, 1s and 2s, four backends each.
        assert_eq!(transport.calls().len(), 12);
    }
}
