//! # Runtime Configuration
//!
//! Which connectors to host and how to drive them.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CH_PROVIDERS` | `plc1:Line1.Temperature,Line1.Pressure,Line2.Speed` | Simulated connectors and their tags |
//! | `CH_POLL_INTERVAL_MS` | `1000` | Change-detection period |
//! | `CH_SHUTDOWN_TIMEOUT_MS` | `5000` | Grace period for background tasks |
//! | `CH_LOG_CHANGES` | `true` | Log every published change |
//!
//! `CH_PROVIDERS` is a `;`-separated list of `name:tag,tag,...` entries.
//! Tags are root-relative item paths.

use std::env;
use std::time::Duration;

use connector_core::domain::fqn;
use connector_core::ProviderConfig;

/// One simulated connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: String,
    pub tags: Vec<String>,
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub providers: Vec<ProviderSpec>,
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
    pub log_changes: bool,
    /// Settings applied to every hosted provider.
    pub provider: ProviderConfig,
}

const DEFAULT_PROVIDERS: &str = "plc1:Line1.Temperature,Line1.Pressure,Line2.Speed";

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            providers: parse_providers(DEFAULT_PROVIDERS).unwrap_or_default(),
            poll_interval: Duration::from_millis(1000),
            shutdown_timeout: Duration::from_millis(5000),
            log_changes: true,
            provider: ProviderConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `CH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let providers = match env::var("CH_PROVIDERS") {
            Ok(raw) => parse_providers(&raw)?,
            Err(_) => defaults.providers,
        };

        let config = Self {
            providers,
            poll_interval: millis_from_env("CH_POLL_INTERVAL_MS").unwrap_or(defaults.poll_interval),
            shutdown_timeout: millis_from_env("CH_SHUTDOWN_TIMEOUT_MS")
                .unwrap_or(defaults.shutdown_timeout),
            log_changes: env::var("CH_LOG_CHANGES")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.log_changes),
            provider: ProviderConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        self.provider.validate().map_err(ConfigError::Provider)
    }
}

fn millis_from_env(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

/// Parse `name:tag,tag;name:tag`.
pub fn parse_providers(raw: &str) -> Result<Vec<ProviderSpec>, ConfigError> {
    let mut specs: Vec<ProviderSpec> = Vec::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, tags) = entry
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidProviders(format!("missing ':' in {:?}", entry)))?;
        let name = name.trim();
        if fqn::validate_name(name).is_err() {
            return Err(ConfigError::InvalidProviders(format!(
                "bad provider name {:?}",
                name
            )));
        }
        if specs.iter().any(|s| s.name == name) {
            return Err(ConfigError::DuplicateProvider(name.to_string()));
        }

        let tags: Vec<String> = tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(bad) = tags.iter().find(|t| fqn::segments(t).is_none()) {
            return Err(ConfigError::InvalidProviders(format!("bad tag path {:?}", bad)));
        }

        specs.push(ProviderSpec {
            name: name.to_string(),
            tags,
        });
    }
    Ok(specs)
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidProviders(String),
    DuplicateProvider(String),
    NoProviders,
    ZeroPollInterval,
    Provider(connector_core::ConfigError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidProviders(msg) => write!(f, "invalid CH_PROVIDERS: {}", msg),
            ConfigError::DuplicateProvider(name) => {
                write!(f, "provider {:?} listed more than once", name)
            }
            ConfigError::NoProviders => write!(f, "no providers configured"),
            ConfigError::ZeroPollInterval => write!(f, "poll interval must be greater than zero"),
            ConfigError::Provider(e) => write!(f, "provider settings: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
