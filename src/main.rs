//! powerscope Binary Entry Point
//!
//! Runs the powermetrics sampler and serves its readings for Prometheus.
//! Core functionality is provided by the `powerscope` library crate.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use powerscope::{
    config::AppConfig,
    sampler::{ReadingSet, SamplerTask, default_readings},
    server::{AppState, create_router},
};
use prometheus_client::registry::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// powerscope - powermetrics Prometheus exporter
#[derive(Parser, Debug)]
#[command(name = "powerscope", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "POWERSCOPE_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, env = "POWERSCOPE_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "POWERSCOPE_SERVER_PORT")]
    server_port: Option<u16>,

    /// Run powermetrics directly instead of through sudo
    #[arg(long, env = "POWERSCOPE_NO_SUDO")]
    no_sudo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,powerscope=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("powerscope - powermetrics exporter");

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load_or_default(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.server_bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.server_port {
        config.server.port = port;
    }
    if cli.no_sudo {
        config.sampler.sudo = false;
    }
    config.validate()?;

    tracing::info!(
        "Server: {}:{}, Facility: {} (sudo: {})",
        config.server.bind,
        config.server.port,
        config.sampler.program,
        config.sampler.sudo,
    );

    let mut registry = Registry::default();
    let sampler = if config.sampler.enabled {
        let readings = ReadingSet::new(default_readings(&config.sampler.namespace))?;
        let task = SamplerTask::start(&config.sampler, readings);
        registry.register_collector(Box::new(task.publisher()));
        Some(task)
    } else {
        tracing::info!("Sampler disabled, serving an empty registry");
        None
    };

    let app_state = AppState {
        registry: std::sync::Arc::new(registry),
        sampler: sampler.as_ref().map(SamplerTask::handle),
    };
    let app = create_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Metrics endpoint: http://{}/metrics", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sampler, config.shutdown_timeout))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(sampler: Option<SamplerTask>, timeout: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    if let Some(sampler) = sampler {
        tracing::info!("Shutting down sampler...");
        if let Err(e) = sampler.shutdown_with_timeout(timeout).await {
            tracing::error!("Failed to shutdown sampler: {}", e);
        }
    }
}
