use std::sync::Arc;

use anyhow::Context;

use polydict::config::AppConfig;
use polydict::core::dictionary::{server, DictionaryService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    let _log_guard = polydict::core::logging::init(&config.logging.level, &config.log_dir());
    log::info!("{} v{} starting", polydict::NAME, polydict::VERSION);

    let service = Arc::new(
        DictionaryService::from_config(&config)
            .await
            .context("Failed to build dictionary service")?,
    );

    let result = server::serve(service.clone(), &config.bind_address(), shutdown_signal()).await;

    service.shutdown().await;
    result.with_context(|| format!("Server on {} failed", config.bind_address()))?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
