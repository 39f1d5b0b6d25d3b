//! # Error Types
//!
//! Every failure the core can report is an explicit value. Resolution misses
//! are `Option::None` or empty collections and never show up here; the types
//! below cover conflicts, source failures, state violations, guard
//! rejections and the rare internal fault.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::item::ItemId;
use super::state::{LifecycleOp, State};

/// Structural errors raised by [`ItemTree`](super::tree::ItemTree) mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Names must be non-empty and must not contain the FQN delimiter.
    #[error("Invalid item name: {name:?}")]
    InvalidName { name: String },

    /// A sibling with the same name already exists under the parent.
    #[error("Duplicate item name '{name}' under '{parent}'")]
    DuplicateName { parent: String, name: String },

    /// The parent handle does not belong to this tree.
    #[error("Unknown parent item: {0}")]
    UnknownParent(ItemId),

    /// The root anchors the namespace and cannot be pruned.
    #[error("The root item cannot be removed")]
    CannotRemoveRoot,
}

/// Failures of a data source's lifecycle hooks or namespace discovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Disconnect failed: {0}")]
    Disconnect(String),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Typed failure of a single read against the underlying source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The source could not be reached.
    #[error("Source unreachable: {0}")]
    Unreachable(String),

    /// The source does not know the requested item.
    #[error("Item unknown to source: {fqn}")]
    UnknownItem { fqn: String },

    /// The read did not complete in time.
    #[error("Read timed out after {0:?}")]
    Timeout(Duration),
}

/// Error returned by an observer callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserverError {
    /// The callback returned an error.
    #[error("observer failed: {0}")]
    Failed(String),

    /// The callback panicked; the payload message is preserved.
    #[error("observer panicked: {0}")]
    Panicked(String),
}

impl ObserverError {
    /// Convenience constructor for callback implementations.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// One faulting observer, identified by its position in the fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverFailure {
    /// Zero-based position in registration order.
    pub position: usize,
    pub error: ObserverError,
}

impl fmt::Display for ObserverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}: {}", self.position, self.error)
    }
}

/// Aggregate of every observer that faulted during one notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObserverFailures(pub Vec<ObserverFailure>);

impl ObserverFailures {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObserverFailure> {
        self.0.iter()
    }
}

impl fmt::Display for ObserverFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{}", single.error),
            failures => {
                write!(f, "{} observers failed:", failures.len())?;
                for failure in failures {
                    write!(f, " [{}]", failure)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ObserverFailures {}

/// Failure of a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The start or stop hook failed. `state` is where the component was left.
    #[error("{operation} of '{component}' failed, now {state}: {source}")]
    Hook {
        component: String,
        operation: LifecycleOp,
        state: State,
        #[source]
        source: SourceError,
        /// Observer faults raised during the same call.
        observers: ObserverFailures,
    },

    /// The transition completed but one or more state observers faulted.
    #[error("{operation} of '{component}' notified with failures: {failures}")]
    Observers {
        component: String,
        operation: LifecycleOp,
        failures: ObserverFailures,
    },

    /// The call returned without the component reaching the expected state,
    /// typically because another lifecycle call still owns it.
    #[error("'{component}' is {state} after {operation}")]
    Unsettled {
        component: String,
        operation: LifecycleOp,
        state: State,
    },
}

impl LifecycleError {
    /// State the component was left in, when the error carries it.
    pub fn state(&self) -> Option<State> {
        match self {
            Self::Hook { state, .. } | Self::Unsettled { state, .. } => Some(*state),
            Self::Observers { .. } => None,
        }
    }
}

/// Rejection from the single-flight install guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("Install already in progress for '{archive}'")]
    InProgress { archive: String },
}

/// Errors surfaced at the provider boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The item handle is not (or no longer) part of the provider's tree.
    #[error("Item {item} not found in provider '{provider}'")]
    ItemNotFound { provider: String, item: ItemId },

    /// The operation needs a running provider.
    #[error("Provider '{provider}' is {state}, not Running")]
    NotRunning { provider: String, state: State },

    /// The underlying source failed the read.
    #[error("Read of '{fqn}' on provider '{provider}' failed: {source}")]
    Read {
        provider: String,
        fqn: String,
        #[source]
        source: ReadError,
    },

    #[error("Provider '{provider}': {source}")]
    Tree {
        provider: String,
        #[source]
        source: TreeError,
    },

    /// Unexpected internal failure, tagged with the failing operation.
    #[error("Internal error in {operation} on provider '{provider}': {message}")]
    Internal {
        provider: String,
        operation: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// The read failure carried by this error, if any.
    pub fn read_error(&self) -> Option<&ReadError> {
        match self {
            Self::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised by the provider directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    #[error("Provider '{0}' is not registered")]
    UnknownProvider(String),

    #[error("Replacement provider is named '{actual}', expected '{expected}'")]
    NameMismatch { expected: String, actual: String },

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error("Lifecycle failure on provider '{provider}': {source}")]
    Lifecycle {
        provider: String,
        #[source]
        source: LifecycleError,
    },

    /// Several providers failed during a bulk start or stop.
    #[error("{} provider(s) failed: {}", .0.len(), summarize(.0))]
    Many(Vec<(String, LifecycleError)>),
}

fn summarize(failures: &[(String, LifecycleError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{}: {}", name, err))
        .collect::<Vec<_>>()
        .join("; ")
}
