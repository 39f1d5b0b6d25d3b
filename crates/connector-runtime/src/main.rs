//! # Connector Hub Runtime
//!
//! Entry point: telemetry, configuration, providers, then wait for Ctrl+C.

use anyhow::{Context, Result};
use connector_runtime::config::RuntimeConfig;
use connector_runtime::ConnectorRuntime;
use connector_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env().context("failed to load runtime configuration")?;
    let runtime = ConnectorRuntime::new(config, telemetry.recorder())?;
    runtime.start().await?;

    info!("Runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    runtime.shutdown().await?;

    if telemetry.metrics_enabled() {
        info!(
            "Final metrics:\n{}",
            telemetry.render_metrics().unwrap_or_default()
        );
    }
    Ok(())
}
