//! Domain layer: pure state, namespace and subscription logic, no I/O.

pub mod errors;
pub mod fqn;
pub mod install_guard;
pub mod item;
pub mod observers;
pub mod state;
pub mod state_machine;
pub mod subscriptions;
pub mod tree;

pub use errors::*;
pub use install_guard::{InstallGuard, InstallPermit};
pub use item::{Item, ItemChange, ItemId, Payload};
pub use observers::{Observer, ObserverList};
pub use state::{LifecycleOp, State, StateChange, StopType, Transition};
pub use state_machine::StateMachine;
pub use subscriptions::{NotifyReport, Subscriber, SubscriptionRegistry};
pub use tree::ItemTree;
