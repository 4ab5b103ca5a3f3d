//! Startup helpers.
//!
//! # Responsibilities
//! - Optionally serve demo backends from this process for every loopback
//!   address in the pool, so the balancer can be tried out standalone
//!
//! # Design Decisions
//! - Fail fast: a demo backend that cannot bind is a startup error
//! - Demo backends stop on the same shutdown signal as the balancer

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{extract::State, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Host;

use crate::error::ProxyError;
use crate::lifecycle::Shutdown;
use crate::load_balancer::Backend;

/// Loopback socket address a backend would be served on, if it is local.
pub fn local_bind_address(backend: &Backend) -> Option<SocketAddr> {
    let url = backend.base_url();
    let ip = match url.host()? {
        Host::Domain(domain) if domain.eq_ignore_ascii_case("localhost") => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Host::Domain(_) => return None,
        Host::Ipv4(ip) if ip.is_loopback() => IpAddr::V4(ip),
        Host::Ipv6(ip) if ip.is_loopback() => IpAddr::V6(ip),
        _ => return None,
    };
    Some(SocketAddr::new(ip, url.port_or_known_default()?))
}

/// Bind and serve one demo backend per local backend in `backends`.
pub async fn seed_demo_backends(
    backends: &[Backend],
    shutdown: &Shutdown,
) -> Result<Vec<JoinHandle<()>>, ProxyError> {
    let mut handles = Vec::new();

    for backend in backends {
        let Some(addr) = local_bind_address(backend) else {
            tracing::debug!(backend = %backend, "Not a local backend, not seeding");
            continue;
        };

        let listener = TcpListener::bind(addr).await?;
        let port = addr.port();
        let app = Router::new().fallback(demo_handler).with_state(port);
        let mut stop = shutdown.subscribe();

        tracing::info!(backend = %backend, address = %addr, "Starting demo backend");
        handles.push(tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(port, error = %e, "Demo backend stopped with error");
            }
        }));
    }

    Ok(handles)
}

async fn demo_handler(State(port): State<u16>) -> String {
    tracing::info!(port, "Request received at demo backend");
    format!("Response from server on port: {port}\n")
}
