//! # Provider Directory - Cross-Provider Addressing and Lifecycle
//!
//! Hosts every connector of the process under a unique name and resolves
//! fully-qualified paths whose first segment selects the owning provider.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let directory = ProviderDirectory::new();
//! directory.register(Arc::new(Provider::new("plc1", source, config)?))?;
//!
//! directory.start_all().await?;
//! let temp = directory.resolve("plc1.Line1.Temperature");
//!
//! // Later: graceful shutdown, reverse registration order
//! directory.stop_all(StopType::Shutdown).await?;
//! ```
//!
//! Lifecycle calls never run under the directory lock: the provider list is
//! snapshotted first, so providers can be looked up while others start.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::domain::fqn;
use crate::domain::{
    DirectoryError, InstallGuard, Item, LifecycleError, LifecycleOp, ProviderError, State,
    StopType, Transition,
};
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::ItemProvider;

/// Shared handle to a hosted provider.
pub type DynProvider = Arc<dyn ItemProvider>;

/// Registry of hosted providers, in registration order.
pub struct ProviderDirectory {
    providers: RwLock<Vec<DynProvider>>,
    install: InstallGuard,
}

impl ProviderDirectory {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(NoOpMetrics))
    }

    pub fn with_metrics(metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            install: InstallGuard::with_metrics(metrics),
        }
    }

    /// Register a provider under its own name.
    pub fn register(&self, provider: DynProvider) -> Result<(), DirectoryError> {
        let mut providers = self.providers.write();
        let name = provider.name().to_string();
        if providers.iter().any(|p| p.name() == name) {
            warn!(provider = %name, "Provider already registered");
            return Err(DirectoryError::DuplicateProvider(name));
        }
        providers.push(provider);
        info!(provider = %name, total = providers.len(), "Provider registered");
        Ok(())
    }

    /// Remove a provider from the directory without stopping it.
    pub fn unregister(&self, name: &str) -> Option<DynProvider> {
        let mut providers = self.providers.write();
        let index = providers.iter().position(|p| p.name() == name)?;
        let removed = providers.remove(index);
        info!(provider = %name, "Provider unregistered");
        Some(removed)
    }

    pub fn get(&self, name: &str) -> Option<DynProvider> {
        self.providers
            .read()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    /// The guard serializing install/reload operations.
    pub fn install_guard(&self) -> &InstallGuard {
        &self.install
    }

    /// Resolve `provider.path.to.item`. The provider segment alone resolves
    /// to that provider's root. Unknown providers and paths are `None`.
    pub fn resolve(&self, path: &str) -> Option<Item> {
        let (provider, rest) = self.locate(path)?;
        match rest {
            None => Some(provider.root()),
            Some(rest) => provider.find(rest),
        }
    }

    /// Same as [`resolve`](Self::resolve), without blocking the caller.
    pub async fn resolve_async(&self, path: &str) -> Result<Option<Item>, ProviderError> {
        let Some((provider, rest)) = self.locate(path) else {
            return Ok(None);
        };
        match rest {
            None => Ok(Some(provider.root())),
            Some(rest) => provider.find_async(rest).await,
        }
    }

    /// Children of the item at `path`; the provider roots when `None`.
    pub fn browse(&self, path: Option<&str>) -> Vec<Item> {
        let Some(path) = path else {
            return self.snapshot().iter().map(|p| p.root()).collect();
        };
        let Some((provider, rest)) = self.locate(path) else {
            return Vec::new();
        };
        match rest {
            None => provider.browse(None),
            Some(rest) => match provider.find(rest) {
                Some(item) => provider.browse(Some(item.guid)),
                None => Vec::new(),
            },
        }
    }

    /// Start every provider in registration order.
    ///
    /// A failing provider does not prevent the others from starting; all
    /// failures are returned together. A provider that is still not
    /// `Running` afterwards, e.g. because another call owns its lifecycle,
    /// counts as a failure.
    pub async fn start_all(&self) -> Result<(), DirectoryError> {
        let providers = self.snapshot();
        info!(count = providers.len(), "Starting providers");

        let mut failures = Vec::new();
        for provider in &providers {
            match provider.start().await {
                Ok(_) => {
                    let state = provider.state();
                    if state != State::Running {
                        warn!(provider = %provider.name(), %state, "Provider not running after start");
                        failures.push((
                            provider.name().to_string(),
                            LifecycleError::Unsettled {
                                component: provider.name().to_string(),
                                operation: LifecycleOp::Start,
                                state,
                            },
                        ));
                    }
                }
                Err(e) => {
                    error!(provider = %provider.name(), error = %e, "Provider failed to start");
                    failures.push((provider.name().to_string(), e));
                }
            }
        }
        Self::collect(failures)
    }

    /// Stop every provider in reverse registration order.
    pub async fn stop_all(&self, stop_type: StopType) -> Result<(), DirectoryError> {
        let providers = self.snapshot();
        info!(count = providers.len(), stop_type = ?stop_type, "Stopping providers");

        let mut failures = Vec::new();
        for provider in providers.iter().rev() {
            if let Err(e) = provider.stop(stop_type).await {
                error!(provider = %provider.name(), error = %e, "Provider failed to stop cleanly");
                failures.push((provider.name().to_string(), e));
            }
        }
        Self::collect(failures)
    }

    /// Swap the provider registered as `name` for `replacement`.
    ///
    /// Runs under the install guard: a concurrent reload is rejected with
    /// [`DirectoryError::Install`]. The old provider is stopped before the
    /// replacement takes its slot and is started. The guard is released on
    /// every exit path.
    pub async fn reload(
        &self,
        name: &str,
        replacement: DynProvider,
        archive: &str,
    ) -> Result<Transition, DirectoryError> {
        let permit = self.install.try_begin_install(archive)?;

        if replacement.name() != name {
            return Err(DirectoryError::NameMismatch {
                expected: name.to_string(),
                actual: replacement.name().to_string(),
            });
        }
        let current = self
            .get(name)
            .ok_or_else(|| DirectoryError::UnknownProvider(name.to_string()))?;

        info!(provider = %name, archive = %permit.archive(), "Reloading provider");
        match current.stop(StopType::Normal).await {
            Ok(_) => {}
            Err(e @ LifecycleError::Hook { .. }) => {
                return Err(DirectoryError::Lifecycle {
                    provider: name.to_string(),
                    source: e,
                });
            }
            Err(e) => warn!(provider = %name, error = %e, "Old provider stopped with observer failures"),
        }

        {
            let mut providers = self.providers.write();
            match providers.iter_mut().find(|p| p.name() == name) {
                Some(slot) => *slot = Arc::clone(&replacement),
                None => return Err(DirectoryError::UnknownProvider(name.to_string())),
            }
        }

        let transition = replacement
            .start()
            .await
            .map_err(|source| DirectoryError::Lifecycle {
                provider: name.to_string(),
                source,
            })?;

        self.install.end_install(permit);
        info!(provider = %name, "Provider reloaded");
        Ok(transition)
    }

    fn locate<'p>(&self, path: &'p str) -> Option<(DynProvider, Option<&'p str>)> {
        let (head, rest) = fqn::split_first(path)?;
        Some((self.get(head)?, rest))
    }

    fn snapshot(&self) -> Vec<DynProvider> {
        self.providers.read().clone()
    }

    fn collect(failures: Vec<(String, LifecycleError)>) -> Result<(), DirectoryError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DirectoryError::Many(failures))
        }
    }
}

impl Default for ProviderDirectory {
    fn default() -> Self {
        Self::new()
    }
}
