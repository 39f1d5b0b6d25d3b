//! Simulated connector: a fixed namespace whose leaf values random-walk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use connector_core::{DataSource, Item, ItemTree, Payload, ReadError, SourceError, StopType};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::debug;

/// Largest step a value moves per read.
const MAX_STEP: f64 = 0.5;

/// Random-walk data source over a list of root-relative tag paths.
pub struct SimulatedSource {
    tags: Vec<String>,
    connected: AtomicBool,
    values: Mutex<HashMap<String, f64>>,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    pub fn new(tags: Vec<String>) -> Self {
        Self::with_rng(tags, StdRng::from_entropy())
    }

    /// Deterministic walk, for tests.
    pub fn seeded(tags: Vec<String>, seed: u64) -> Self {
        Self::with_rng(tags, StdRng::seed_from_u64(seed))
    }

    fn with_rng(tags: Vec<String>, rng: StdRng) -> Self {
        Self {
            tags,
            connected: AtomicBool::new(false),
            values: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Force the source offline without a lifecycle transition.
    pub fn set_reachable(&self, reachable: bool) {
        self.connected.store(reachable, Ordering::Release);
    }
}

#[async_trait]
impl DataSource for SimulatedSource {
    async fn connect(&self) -> Result<(), SourceError> {
        self.connected.store(true, Ordering::Release);
        debug!(tags = self.tags.len(), "Simulated source connected");
        Ok(())
    }

    async fn disconnect(&self, stop_type: StopType) -> Result<(), SourceError> {
        self.connected.store(false, Ordering::Release);
        self.values.lock().clear();
        debug!(?stop_type, "Simulated source disconnected");
        Ok(())
    }

    fn discover(&self, tree: &mut ItemTree) -> Result<(), SourceError> {
        let mut values = self.values.lock();
        let mut rng = self.rng.lock();
        for tag in &self.tags {
            let id = tree.ensure_path(tag)?;
            if let Some(fqn) = tree.fqn(id) {
                values.entry(fqn).or_insert_with(|| rng.gen_range(0.0..100.0));
            }
        }
        Ok(())
    }

    fn read(&self, item: &Item) -> Result<Payload, ReadError> {
        if !self.is_connected() {
            return Err(ReadError::Unreachable("simulated source offline".into()));
        }
        let mut values = self.values.lock();
        let value = values
            .get_mut(&item.fqn)
            .ok_or_else(|| ReadError::UnknownItem {
                fqn: item.fqn.clone(),
            })?;
        *value += self.rng.lock().gen_range(-MAX_STEP..=MAX_STEP);
        Ok(json!(*value))
    }
}
