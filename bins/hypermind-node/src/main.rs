//! Hypermind node daemon.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use hypermind_node::{NodeConfig, NodeService};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "hypermind=debug,info".to_string()),
        )
        .init();

    info!("Starting hypermind node...");

    let config = NodeConfig::from_env();
    let service = match NodeService::new(config).await {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to start node: {e:#}");
            return Err(e);
        }
    };

    let run_handle = tokio::spawn({
        let service = service.clone();
        async move { service.run().await }
    });

    tokio::select! {
        result = run_handle => {
            match result {
                Ok(Ok(())) => info!("Service completed normally"),
                Ok(Err(e)) => {
                    error!("Service error: {e:#}");
                    return Err(e);
                }
                Err(e) => {
                    error!("Service task panicked: {e}");
                    return Err(e.into());
                }
            }
        }
        _ = shutdown_signal() => {
            info!("Initiating graceful shutdown...");
            service.shutdown().await;
        }
    }

    info!("Node stopped gracefully");
    Ok(())
}
