#![deny(clippy::all)]

mod camera;
mod config;
mod error;
mod inference;
mod presentation;
mod sampler;
mod session;

use anyhow::Context;
use inference::HttpInferenceClient;
use session::{SessionConfig, SessionController};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so the terminal view on stdout stays readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config().context("Failed to load configuration")?;
    info!(
        backend = %config.backend.url,
        camera = ?config.camera.backend,
        interval_ms = config.sampling.interval_ms,
        "Configuration loaded"
    );

    let source = camera::from_config(&config.camera).context("Failed to set up camera")?;
    let client = Arc::new(
        HttpInferenceClient::new(&config.backend.url)
            .context("Failed to create inference client")?,
    );

    // The backend may come up after us; a failed probe is not fatal
    let probe = client.clone();
    tokio::spawn(async move {
        match probe.health().await {
            Ok(health) => info!(
                status = %health.status,
                model = %health.model,
                version = %health.version,
                "Inference backend reachable"
            ),
            Err(e) => warn!(error = %e, "Inference backend health check failed"),
        }
    });

    let controller = Arc::new(SessionController::new(
        source,
        client,
        SessionConfig::from(&config),
    ));
    info!("Type 's' to start, 'x' to stop, 'd' to dismiss errors, 'q' to quit");

    presentation::run(controller)
        .await
        .context("Terminal front-end failed")?;

    info!("Exiting");
    Ok(())
}
