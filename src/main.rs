//! `rehabd`: runs the journal worker and the search indexer.
//!
//! Usage: `rehabd [CONFIG]`. The configuration path defaults to the
//! `REHAB_CONFIG` environment variable, then `rehab.json`.

use anyhow::Context;
use core_runtime::{logging::init_logging, ServiceConfig};
use core_service::CoreService;
use tracing::info;

const CONFIG_ENV: &str = "REHAB_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "rehab.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = ServiceConfig::from_file(&path)
        .with_context(|| format!("failed to load configuration from {}", path))?;

    init_logging(config.logging.clone()).context("failed to initialize logging")?;
    info!(config = %path, "Starting rehabd");

    let service = CoreService::bootstrap(config)
        .await
        .context("failed to start rehab core")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    service.shutdown().await;
    info!("rehabd stopped");
    Ok(())
}
