use std::path::PathBuf;
use std::time::Duration;

use rally::config::Configuration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // read configuration file.
    let path = std::env::var("CONFIG_PATH").map(PathBuf::from).unwrap_or_default();
    let config = Configuration::default().path(path).read();

    let state = rally::initialize_state(config.clone()).await?;

    if let Some(interval) = config.reconcile.as_ref().map(|r| r.interval_secs).filter(|s| *s > 0) {
        tokio::spawn(state.reconciler.clone().every(Duration::from_secs(interval)));
        tracing::info!(interval_secs = interval, "follow counter reconciliation scheduled");
    }

    let listener = TcpListener::bind(("0.0.0.0", config.port())).await?;
    tracing::info!(port = config.port(), version = env!("CARGO_PKG_VERSION"), "server started");

    axum::serve(listener, rally::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
