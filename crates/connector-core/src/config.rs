//! # Provider Configuration
//!
//! Per-provider tunables with sane defaults and environment overrides.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CH_READ_TIMEOUT_MS` | `5000` | Upper bound for `read` and `read_async` |
//! | `CH_CATCH_OBSERVER_PANICS` | `true` | Isolate panicking callbacks |

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Configuration shared by every [`Provider`](crate::service::Provider).
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Root item name. Defaults to the provider name.
    pub root_name: Option<String>,
    /// Upper bound for a source read, on both read paths.
    pub read_timeout: Duration,
    /// Convert panicking observers into reported failures.
    pub catch_observer_panics: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            root_name: None,
            read_timeout: Duration::from_millis(5000),
            catch_observer_panics: true,
        }
    }
}

impl ProviderConfig {
    /// Defaults overridden by `CH_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root_name: None,
            read_timeout: env::var("CH_READ_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.read_timeout),
            catch_observer_panics: env::var("CH_CATCH_OBSERVER_PANICS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.catch_observer_panics),
        }
    }

    pub fn with_root_name(mut self, root_name: impl Into<String>) -> Self {
        self.root_name = Some(root_name.into());
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Reject settings that would make the provider unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroReadTimeout);
        }
        if let Some(root) = &self.root_name {
            if crate::domain::fqn::validate_name(root).is_err() {
                return Err(ConfigError::InvalidRootName(root.clone()));
            }
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A zero read timeout would fail every async read.
    #[error("read timeout must be greater than zero")]
    ZeroReadTimeout,
    /// Root name is empty or contains the FQN delimiter.
    #[error("invalid root item name {0:?}")]
    InvalidRootName(String),
}
