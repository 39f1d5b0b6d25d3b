//! # Connector Telemetry
//!
//! Observability for the connector host.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter` and a pretty or
//!   JSON formatting layer
//! - **Metrics**: Prometheus collectors fed through the core's
//!   `MetricsRecorder` port
//!
//! ## Usage
//!
//! ```rust,ignore
//! use connector_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let telemetry = init_telemetry(TelemetryConfig::from_env())?;
//! let directory = ProviderDirectory::with_metrics(telemetry.recorder());
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CH_SERVICE_NAME` | `connector-hub` | Service name in logs |
//! | `CH_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `CH_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `CH_JSON_LOGS` | `false` | JSON log lines |
//! | `CH_METRICS_ENABLED` | `true` | Register Prometheus collectors |

mod config;
mod logging;
pub mod metrics;

use std::sync::Arc;

use connector_core::{MetricsRecorder, NoOpMetrics};
use thiserror::Error;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{encode_metrics, register_metrics, PrometheusRecorder, REGISTRY};

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, when enabled, the Prometheus collectors.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    if config.metrics_enabled {
        register_metrics()?;
    }
    init_logging(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        metrics_enabled: config.metrics_enabled,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    metrics_enabled: bool,
}

impl TelemetryGuard {
    /// Recorder to hand to providers and the directory.
    pub fn recorder(&self) -> Arc<dyn MetricsRecorder> {
        recorder_for(self.metrics_enabled)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_enabled
    }

    /// Current metrics in Prometheus text format; empty when disabled.
    pub fn render_metrics(&self) -> Result<String, TelemetryError> {
        if !self.metrics_enabled {
            return Ok(String::new());
        }
        encode_metrics()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

fn recorder_for(metrics_enabled: bool) -> Arc<dyn MetricsRecorder> {
    if metrics_enabled {
        Arc::new(PrometheusRecorder)
    } else {
        Arc::new(NoOpMetrics)
    }
}
