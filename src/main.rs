use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rocm_exporter::{source_for, Exporter, FieldCatalog, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load().context("failed to read environment configuration")?;
    info!(dev = settings.dev, port = settings.port, "starting rocm-exporter");

    let source = source_for(&settings);
    let exporter = Exporter::initialize(&settings, FieldCatalog::rocm_smi(), source)
        .await
        .context("exporter initialization failed")?;

    exporter.run().await?;
    Ok(())
}
