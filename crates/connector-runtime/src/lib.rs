//! # Connector Runtime
//!
//! Hosts simulated connectors behind a [`ProviderDirectory`].
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Create one provider per configured connector and register it
//! 3. Start every provider (registration order)
//! 4. Spawn one poller per provider, plus change loggers if enabled
//!
//! ## Shutdown Sequence
//!
//! 1. Signal shutdown to all background tasks
//! 2. Wait for them, bounded by the shutdown timeout
//! 3. Stop every provider (reverse registration order)

pub mod config;
pub mod poller;
pub mod simulated;

use std::sync::Arc;

use anyhow::{Context, Result};
use connector_core::{
    ChangeFeed, MetricsRecorder, Provider, ProviderDirectory, StopType, DEFAULT_FEED_CAPACITY,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::RuntimeConfig;
use crate::simulated::SimulatedSource;

/// The hosting process: providers, their directory and background tasks.
pub struct ConnectorRuntime {
    config: RuntimeConfig,
    directory: Arc<ProviderDirectory>,
    providers: Vec<Arc<Provider<SimulatedSource>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectorRuntime {
    /// Create the providers described by `config` and register them.
    pub fn new(config: RuntimeConfig, metrics: Arc<dyn MetricsRecorder>) -> Result<Self> {
        config.validate().context("invalid runtime configuration")?;

        let directory = Arc::new(ProviderDirectory::with_metrics(metrics.clone()));
        let mut providers = Vec::with_capacity(config.providers.len());
        for spec in &config.providers {
            let provider = Arc::new(
                Provider::with_metrics(
                    spec.name.clone(),
                    SimulatedSource::new(spec.tags.clone()),
                    config.provider.clone(),
                    metrics.clone(),
                )
                .with_context(|| format!("failed to create provider '{}'", spec.name))?,
            );
            directory
                .register(provider.clone())
                .with_context(|| format!("failed to register provider '{}'", spec.name))?;
            providers.push(provider);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            directory,
            providers,
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn directory(&self) -> Arc<ProviderDirectory> {
        Arc::clone(&self.directory)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Start every provider and the background tasks.
    ///
    /// Providers that fail to start are reported but do not stop the others
    /// from being polled; they can be restarted later through the directory.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Connector Hub Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("  Providers: {}", self.directory.provider_names().join(", "));
        info!("===========================================");

        if let Err(e) = self.directory.start_all().await {
            warn!(error = %e, "Some providers failed to start");
        }

        let mut tasks = Vec::new();
        for provider in &self.providers {
            tasks.push(tokio::spawn(poller::run_poller(
                provider.clone(),
                self.config.poll_interval,
                self.shutdown_rx.clone(),
            )));
            if self.config.log_changes {
                tasks.extend(self.spawn_change_loggers(provider));
            }
        }
        self.tasks.lock().extend(tasks);

        info!("Runtime started");
        Ok(())
    }

    /// One change feed per leaf, logged until shutdown.
    fn spawn_change_loggers(&self, provider: &Arc<Provider<SimulatedSource>>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        for leaf in provider.leaves() {
            let mut feed =
                match ChangeFeed::attach(provider.clone(), leaf.guid, DEFAULT_FEED_CAPACITY) {
                    Ok(feed) => feed,
                    Err(e) => {
                        warn!(fqn = %leaf.fqn, error = %e, "Cannot attach change feed");
                        continue;
                    }
                };
            let mut shutdown = self.shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        change = feed.recv() => match change {
                            Some(change) => info!(fqn = %change.fqn, value = %change.value, "Item changed"),
                            None => break,
                        },
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }
        tasks
    }

    /// Stop background tasks, then every provider.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        let mut tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        let drain = async {
            for task in tasks.iter_mut() {
                if let Err(e) = task.await {
                    warn!(error = %e, "Background task ended abnormally");
                }
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain)
            .await
            .is_err()
        {
            let pending = tasks.iter().filter(|t| !t.is_finished()).count();
            warn!(
                timeout = ?self.config.shutdown_timeout,
                pending,
                "Background tasks did not stop in time, aborting"
            );
            for task in &tasks {
                task.abort();
            }
        }

        self.directory
            .stop_all(StopType::Shutdown)
            .await
            .context("failed to stop providers")?;

        info!("Shutdown complete");
        Ok(())
    }
}
