//! Shared fixtures: a gated source for race tests and provider builders.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use connector_core::{
    discover_paths, DataSource, Item, ItemProvider, ItemTree, Payload, Provider, ProviderConfig,
    ReadError, SourceError, StopType,
};
use connector_runtime::simulated::SimulatedSource;
use parking_lot::Mutex;
use serde_json::json;

/// Source whose `connect` takes a configurable amount of time.
pub struct SlowSource {
    paths: Vec<String>,
    connect_delay: Mutex<Duration>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl SlowSource {
    pub fn new(paths: &[&str], connect_delay: Duration) -> Self {
        Self {
            paths: paths.iter().map(|p| p.to_string()).collect(),
            connect_delay: Mutex::new(connect_delay),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }
}

#[async_trait]
impl DataSource for SlowSource {
    async fn connect(&self) -> Result<(), SourceError> {
        let delay = *self.connect_delay.lock();
        tokio::time::sleep(delay).await;
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self, _stop_type: StopType) -> Result<(), SourceError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn discover(&self, tree: &mut ItemTree) -> Result<(), SourceError> {
        discover_paths(tree, &self.paths)
    }

    fn read(&self, item: &Item) -> Result<Payload, ReadError> {
        Ok(json!(item.fqn))
    }
}

pub fn slow_provider(name: &str, paths: &[&str], delay: Duration) -> Arc<Provider<SlowSource>> {
    Arc::new(
        Provider::new(name, SlowSource::new(paths, delay), ProviderConfig::default())
            .expect("valid provider"),
    )
}

/// A running simulated provider with `count` leaves spread over lines.
pub async fn simulated_provider(name: &str, count: usize) -> Arc<Provider<SimulatedSource>> {
    let tags = (0..count)
        .map(|i| format!("Line{}.Tag{}", i % 4, i))
        .collect();
    let provider = Arc::new(
        Provider::new(name, SimulatedSource::seeded(tags, 42), ProviderConfig::default())
            .expect("valid provider"),
    );
    provider.start().await.expect("simulated provider starts");
    provider
}
