//! Pod Logging Controller binary.
//!
//! Logs pod lifecycle events until interrupted.

use kube::Client;
use pod_logging_controller::{Config, ControllerError, InformerFactory, PodLoggingController, stop_channel};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls-tls needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting Pod Logging Controller");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    match config.resync_period {
        Some(period) => info!("  Resync period: {}s", period.as_secs()),
        None => info!("  Resync period: disabled"),
    }

    let client = Client::try_default().await?;
    let informer_factory = Arc::new(InformerFactory::new(client, config.namespace, config.resync_period));
    let controller = PodLoggingController::new(informer_factory)?;

    let (stop_handle, stop) = stop_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received interrupt, shutting down"),
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
        stop_handle.stop();
    });

    controller.run(stop.clone()).await?;
    info!("Pod Logging Controller running");

    controller.wait(&stop).await?;
    info!("Pod Logging Controller stopped");
    Ok(())
}
