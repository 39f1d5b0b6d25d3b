//! # Connector Core
//!
//! Lifecycle, item addressing and subscription engine shared by every
//! connector hosted in the process.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `StateMachine`: Start/stop/restart with ordered `StateChanged` events
//!   - `ItemTree`: Arena-backed namespace with FQN resolution
//!   - `SubscriptionRegistry`: Per-item callbacks, fan-out with fault isolation
//!   - `InstallGuard`: Single-flight install/reload gate
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `ItemProvider`: Driving port (what the host and HTTP layer call)
//!   - `DataSource`: Driven port (what a connector implements)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `Provider`: Implements `ItemProvider` over any `DataSource`
//!   - `ProviderDirectory`: Cross-provider resolution and bulk lifecycle
//!
//! - **Adapters Layer** (`adapters/`)
//!   - `ChangeFeed`: Item subscription exposed as a `Stream`
//!
//! ## Invariants
//!
//! - A lifecycle call either changes state with one event per step, or is a
//!   `Transition::NoOp` with no event at all.
//! - `find(item.fqn)` returns the item with the same guid.
//! - At most one callback instance per item; callbacks never run under a lock.
//! - At most one install in flight.
//!
//! ## Usage Example
//!
//! ```ignore
//! use connector_core::{ChangeFeed, ItemProvider, Provider, ProviderConfig};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(Provider::new("plc1", source, ProviderConfig::from_env())?);
//! provider.start().await?;
//!
//! let temp = provider.find("Line1.Temperature").expect("discovered");
//! let mut feed = ChangeFeed::attach(provider.clone(), temp.guid, DEFAULT_FEED_CAPACITY)?;
//! let value = provider.read_async(temp.guid).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::ChangeFeed;
pub use config::{ConfigError, ProviderConfig};
pub use domain::*;
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics, SubscriptionEvent};
pub use ports::{DataSource, ItemProvider};
pub use service::{discover_paths, DynProvider, Provider, ProviderDirectory};

/// Default number of buffered changes per [`ChangeFeed`].
pub const DEFAULT_FEED_CAPACITY: usize = 64;
