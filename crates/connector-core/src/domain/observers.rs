//! # Observer Handles
//!
//! Callbacks are held behind `Arc` and compared by allocation, so the same
//! handle (or a clone of it) is recognised as the same observer while two
//! separately created closures with identical code are not.
//!
//! Fan-out always runs on a snapshot of the list: no lock is held while a
//! callback executes, so callbacks may subscribe, unsubscribe or read the
//! tree without deadlocking.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use super::errors::{ObserverError, ObserverFailure};

type Callback<E> = dyn Fn(&E) -> Result<(), ObserverError> + Send + Sync;

/// A shareable callback handle with identity semantics.
pub struct Observer<E> {
    callback: Arc<Callback<E>>,
}

impl<E> Observer<E> {
    /// Wrap a fallible callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&E) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Wrap a callback that cannot fail.
    pub fn infallible<F>(callback: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self::new(move |event| {
            callback(event);
            Ok(())
        })
    }

    /// True if both handles refer to the same callback instance.
    pub fn same_as(&self, other: &Self) -> bool {
        self.address() == other.address()
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.callback) as *const ()
    }

    /// Invoke the callback, converting a panic into an error when asked to.
    pub(crate) fn invoke(&self, event: &E, catch_panics: bool) -> Result<(), ObserverError> {
        if !catch_panics {
            return (self.callback)(event);
        }
        match catch_unwind(AssertUnwindSafe(|| (self.callback)(event))) {
            Ok(result) => result,
            Err(payload) => Err(ObserverError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl<E> Clone for Observer<E> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<E> fmt::Debug for Observer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Observer({:p})", self.address())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Invoke every observer in order; a failure never stops the fan-out.
pub(crate) fn fan_out<E>(
    observers: &[Observer<E>],
    event: &E,
    catch_panics: bool,
) -> Vec<ObserverFailure> {
    observers
        .iter()
        .enumerate()
        .filter_map(|(position, observer)| {
            observer
                .invoke(event, catch_panics)
                .err()
                .map(|error| ObserverFailure { position, error })
        })
        .collect()
}

/// Ordered, duplicate-free list of observers.
pub struct ObserverList<E> {
    observers: RwLock<Vec<Observer<E>>>,
}

impl<E> ObserverList<E> {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Append an observer. Returns `false` if the same handle is already present.
    pub fn add(&self, observer: Observer<E>) -> bool {
        let mut observers = self.observers.write();
        if observers.iter().any(|o| o.same_as(&observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn remove(&self, observer: &Observer<E>) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|o| !o.same_as(observer));
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Notify a snapshot of the current observers, outside the lock.
    pub fn notify(&self, event: &E, catch_panics: bool) -> Vec<ObserverFailure> {
        let snapshot = self.observers.read().clone();
        fan_out(&snapshot, event, catch_panics)
    }
}

impl<E> Default for ObserverList<E> {
    fn default() -> Self {
        Self::new()
    }
}
