//! silta - transparent mTLS gRPC proxy
//!
//! Startup sequence: parse flags, initialize tracing, load credentials and
//! build the director, then serve until SIGINT/SIGTERM. Any startup error
//! is fatal; everything after the listener is up is scoped to one call.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use silta::config::ProxyConfig;
use silta::director::Director;
use silta::error::Result;
use silta::metrics::Metrics;
use silta::metrics_server::MetricsServer;
use silta::server;

#[tokio::main]
async fn main() {
    let config = ProxyConfig::parse();
    init_tracing(config.verbose);

    if let Err(e) = run(config).await {
        error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "silta=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

async fn run(config: ProxyConfig) -> Result<()> {
    let director = Arc::new(Director::from_config(&config)?);

    if let Some(port) = config.metrics_port {
        Metrics::init()?;
        // Detached; the metrics server lives for the rest of the process.
        let _ = MetricsServer::start(port);
    }

    info!(
        listen = %config.listen,
        backend = %config.backend,
        reuse_connection = config.reuse_connection,
        "starting proxy"
    );

    server::serve(&config, director, shutdown_signal()).await
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
