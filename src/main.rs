//! rotor-lb: health-aware round-robin HTTP load balancer.
//!
//! ```text
//!     Client Request ──▶ listener ──▶ dispatcher ──▶ healthy backend (round-robin)
//!                                        │  ▲
//!                                        ▼  │ liveness flags
//!                                      registry ◀── health monitor (every interval)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rotor_lb::config::loader::load_config;
use rotor_lb::config::validation::validate_config;
use rotor_lb::config::{loader::ConfigError, ProxyConfig};
use rotor_lb::lifecycle::{signals, startup, Shutdown};
use rotor_lb::observability::{logging, metrics};
use rotor_lb::HttpServer;

#[derive(Parser)]
#[command(name = "rotor-lb")]
#[command(about = "Round-robin HTTP load balancer with active health checks", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Serve demo backends in-process for every localhost backend.
    #[arg(long)]
    seed_backends: bool,
}

fn resolve_config(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if cli.seed_backends {
        config.demo.seed_backends = true;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rotor-lb: {e}");
            return Err(e.into());
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!("rotor-lb v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port = config.listener.port,
        backends = ?config.backends,
        probe_interval_secs = config.health_check.interval_secs,
        max_attempts = config.retries.max_attempts,
        pool_max_idle_per_host = config.transport.pool_max_idle_per_host,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config.clone())?;
    let registry = server.registry();

    let demo_backends = if config.demo.seed_backends {
        startup::seed_demo_backends(registry.backends(), &shutdown).await?
    } else {
        Vec::new()
    };

    let bind_address = config.listener.bind_address();
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_address, error = %e, "Server failed to start");
            return Err(e.into());
        }
    };

    server.run(listener, shutdown.subscribe()).await?;

    for handle in demo_backends {
        let _ = handle.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
