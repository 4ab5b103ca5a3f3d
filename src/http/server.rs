//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router; every method and path goes to the dispatcher
//! - Wire up middleware (request ID, tracing)
//! - Spawn the health monitor next to the serve loop
//! - Serve until the shutdown signal, then stop the monitor

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, extract::State, http::Request, response::Response, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::loader::ConfigError;
use crate::config::validation::validate_config;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::health::active::HealthMonitor;
use crate::http::dispatcher::{DispatchPolicy, Dispatcher};
use crate::http::request::{propagate_request_id_layer, request_span, set_request_id_layer};
use crate::http::transport::HttpTransport;
use crate::load_balancer::Registry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    registry: Arc<Registry>,
    transport: HttpTransport,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// The config is validated here as well, so callers that build one in
    /// code get the same checks as a loaded file.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let registry = Arc::new(Registry::from_addresses(&config.backends)?);
        let transport = HttpTransport::new(&config.transport);

        let policy = DispatchPolicy {
            max_attempts: config.retries.max_attempts,
            max_body_bytes: config.limits.max_body_bytes,
            forward_timeout: Duration::from_secs(config.timeouts.forward_secs),
        };
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), transport.clone(), policy));

        let router = Self::build_router(AppState { dispatcher });
        Ok(Self {
            router,
            config,
            registry,
            transport,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(request_span))
                    .layer(propagate_request_id_layer()),
            )
    }

    /// Shared backend registry (liveness flags and cursor).
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ProxyError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.registry.len(),
            "Load balancer running"
        );

        let monitor = HealthMonitor::new(
            self.registry.clone(),
            Arc::new(self.transport.clone()),
            self.config.health_check.clone(),
        );
        let monitor_task = tokio::spawn(monitor.run(shutdown.resubscribe()));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Err(e) = monitor_task.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every inbound request, whatever its method or path.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.dispatcher.dispatch(request).await
}
