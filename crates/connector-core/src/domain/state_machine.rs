//! # Lifecycle State Machine
//!
//! Holds the current [`State`] of a component in an atomic so it can be read
//! without blocking, and drives start/stop/restart through caller-supplied
//! hooks.
//!
//! A lifecycle call first *claims* the component with a compare-and-swap
//! into a transient state (`Starting`, `Stopping`, `Restarting`). Losing the
//! race, or finding the component already in a transient state, is a benign
//! [`Transition::NoOp`]. Once claimed, the caller owns the component until
//! it commits a terminal state, so transitions of one component never
//! interleave and their notifications are delivered in order.
//!
//! If a lifecycle future is dropped while its hook is pending (a timeout,
//! an aborted task), the claimed transient state is committed to `Faulted`
//! so the component can be started again.
//!
//! Every transition notifies all state observers synchronously before the
//! lifecycle call returns. Observer failures never abort the sequence; they
//! are aggregated into the call's error once the sequence is complete.
//!
//! ```text
//! start:    Initialized|Stopped|Faulted → Starting → Running | Faulted
//! stop:     Running|Faulted → Stopping → Stopped | Faulted
//! restart:  Running|Faulted → Restarting → Stopping → Stopped → Starting → Running
//!           Initialized|Stopped → (same as start)
//! ```

use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::errors::{LifecycleError, ObserverFailure, ObserverFailures, SourceError};
use super::observers::{Observer, ObserverList};
use super::state::{LifecycleOp, State, StateChange, StopType, Transition};
use crate::metrics::{MetricsRecorder, NoOpMetrics};

/// Per-component lifecycle state with change notification.
pub struct StateMachine {
    name: String,
    state: AtomicU8,
    observers: ObserverList<StateChange>,
    catch_panics: bool,
    metrics: Arc<dyn MetricsRecorder>,
}

impl StateMachine {
    /// A machine in `Initialized` with no observers.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_metrics(name, Arc::new(NoOpMetrics), true)
    }

    pub fn with_metrics(
        name: impl Into<String>,
        metrics: Arc<dyn MetricsRecorder>,
        catch_panics: bool,
    ) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(State::Initialized.as_u8()),
            observers: ObserverList::new(),
            catch_panics,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. Never blocks.
    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Register a `StateChanged` observer. `false` if already registered.
    pub fn on_state_changed(&self, observer: Observer<StateChange>) -> bool {
        self.observers.add(observer)
    }

    /// Remove a `StateChanged` observer. `false` if it was not registered.
    pub fn remove_state_observer(&self, observer: &Observer<StateChange>) -> bool {
        self.observers.remove(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Start the component, running `on_start` while in `Starting`.
    ///
    /// `Running` and transient states are a no-op.
    pub async fn start<F, Fut>(&self, on_start: F) -> Result<Transition, LifecycleError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), SourceError>>,
    {
        let from = self.state();
        if !matches!(from, State::Initialized | State::Stopped | State::Faulted) {
            debug!(component = %self.name, state = %from, "Start ignored");
            return Ok(Transition::NoOp { state: from });
        }

        let mut failures = Vec::new();
        if !self.claim(from, State::Starting, &mut failures) {
            return Ok(Transition::NoOp {
                state: self.state(),
            });
        }
        self.run_start(LifecycleOp::Start, from, on_start, failures)
            .await
    }

    /// Stop the component, running `on_stop` while in `Stopping`.
    ///
    /// Only `Running` and `Faulted` components are stopped; anything else is
    /// a no-op. A failing hook leaves the component `Faulted`.
    pub async fn stop<F, Fut>(
        &self,
        stop_type: StopType,
        on_stop: F,
    ) -> Result<Transition, LifecycleError>
    where
        F: FnOnce(StopType) -> Fut,
        Fut: Future<Output = Result<(), SourceError>>,
    {
        let from = self.state();
        if !matches!(from, State::Running | State::Faulted) {
            debug!(component = %self.name, state = %from, "Stop ignored");
            return Ok(Transition::NoOp { state: from });
        }

        let mut failures = Vec::new();
        if !self.claim(from, State::Stopping, &mut failures) {
            return Ok(Transition::NoOp {
                state: self.state(),
            });
        }
        self.run_stop(LifecycleOp::Stop, stop_type, on_stop, &mut failures)
            .await?;
        self.finish(
            LifecycleOp::Stop,
            Transition::Changed {
                from,
                to: State::Stopped,
            },
            failures,
        )
    }

    /// Stop then start as one operation.
    ///
    /// If the stop hook fails the start hook is never invoked and the
    /// component stays where the failed stop left it.
    pub async fn restart<FS, FutS, FT, FutT>(
        &self,
        stop_type: StopType,
        on_stop: FS,
        on_start: FT,
    ) -> Result<Transition, LifecycleError>
    where
        FS: FnOnce(StopType) -> FutS,
        FutS: Future<Output = Result<(), SourceError>>,
        FT: FnOnce() -> FutT,
        FutT: Future<Output = Result<(), SourceError>>,
    {
        let from = self.state();
        let mut failures = Vec::new();

        match from {
            State::Initialized | State::Stopped => {
                if !self.claim(from, State::Starting, &mut failures) {
                    return Ok(Transition::NoOp {
                        state: self.state(),
                    });
                }
            }
            State::Running | State::Faulted => {
                if !self.claim(from, State::Restarting, &mut failures) {
                    return Ok(Transition::NoOp {
                        state: self.state(),
                    });
                }
                self.commit(State::Restarting, State::Stopping, &mut failures);
                self.run_stop(LifecycleOp::Restart, stop_type, on_stop, &mut failures)
                    .await?;
                self.commit(State::Stopped, State::Starting, &mut failures);
            }
            _ => {
                debug!(component = %self.name, state = %from, "Restart ignored");
                return Ok(Transition::NoOp { state: from });
            }
        }

        self.run_start(LifecycleOp::Restart, from, on_start, failures)
            .await
    }

    async fn run_start<F, Fut>(
        &self,
        operation: LifecycleOp,
        from: State,
        on_start: F,
        mut failures: Vec<ObserverFailure>,
    ) -> Result<Transition, LifecycleError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), SourceError>>,
    {
        let pending = PendingHook::arm(self, State::Starting);
        let outcome = on_start().await;
        pending.disarm();
        match outcome {
            Ok(()) => {
                self.commit(State::Starting, State::Running, &mut failures);
                self.finish(
                    operation,
                    Transition::Changed {
                        from,
                        to: State::Running,
                    },
                    failures,
                )
            }
            Err(source) => {
                warn!(component = %self.name, error = %source, "Start hook failed");
                self.commit(State::Starting, State::Faulted, &mut failures);
                Err(LifecycleError::Hook {
                    component: self.name.clone(),
                    operation,
                    state: State::Faulted,
                    source,
                    observers: ObserverFailures(failures),
                })
            }
        }
    }

    async fn run_stop<F, Fut>(
        &self,
        operation: LifecycleOp,
        stop_type: StopType,
        on_stop: F,
        failures: &mut Vec<ObserverFailure>,
    ) -> Result<(), LifecycleError>
    where
        F: FnOnce(StopType) -> Fut,
        Fut: Future<Output = Result<(), SourceError>>,
    {
        let pending = PendingHook::arm(self, State::Stopping);
        let outcome = on_stop(stop_type).await;
        pending.disarm();
        match outcome {
            Ok(()) => {
                self.commit(State::Stopping, State::Stopped, failures);
                Ok(())
            }
            Err(source) => {
                warn!(component = %self.name, error = %source, ?stop_type, "Stop hook failed");
                self.commit(State::Stopping, State::Faulted, failures);
                Err(LifecycleError::Hook {
                    component: self.name.clone(),
                    operation,
                    state: State::Faulted,
                    source,
                    observers: ObserverFailures(mem::take(failures)),
                })
            }
        }
    }

    /// Compare-and-swap `from → to`; notify on success.
    fn claim(&self, from: State, to: State, failures: &mut Vec<ObserverFailure>) -> bool {
        let swapped = self
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped {
            self.notify(from, to, failures);
        } else {
            debug!(component = %self.name, expected = %from, "Lost lifecycle race");
        }
        swapped
    }

    /// Unconditional `from → to` while the caller owns the component.
    fn commit(&self, from: State, to: State, failures: &mut Vec<ObserverFailure>) {
        self.state.store(to.as_u8(), Ordering::Release);
        self.notify(from, to, failures);
    }

    fn notify(&self, previous: State, current: State, failures: &mut Vec<ObserverFailure>) {
        info!(component = %self.name, from = %previous, to = %current, "State changed");
        self.metrics
            .record_transition(&self.name, previous, current);
        let change = StateChange { previous, current };
        failures.extend(self.observers.notify(&change, self.catch_panics));
    }

    fn finish(
        &self,
        operation: LifecycleOp,
        transition: Transition,
        failures: Vec<ObserverFailure>,
    ) -> Result<Transition, LifecycleError> {
        if failures.is_empty() {
            return Ok(transition);
        }
        warn!(
            component = %self.name,
            %operation,
            failed = failures.len(),
            "State observers failed"
        );
        Err(LifecycleError::Observers {
            component: self.name.clone(),
            operation,
            failures: ObserverFailures(failures),
        })
    }
}

/// Faults the component if a hook future is dropped before it completes.
struct PendingHook<'a> {
    machine: &'a StateMachine,
    transient: State,
    armed: bool,
}

impl<'a> PendingHook<'a> {
    fn arm(machine: &'a StateMachine, transient: State) -> Self {
        Self {
            machine,
            transient,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingHook<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let machine = self.machine;
        let abandoned = machine
            .state
            .compare_exchange(
                self.transient.as_u8(),
                State::Faulted.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !abandoned {
            return;
        }
        warn!(component = %machine.name, state = %self.transient, "Lifecycle call cancelled mid-hook");
        let mut failures = Vec::new();
        machine.notify(self.transient, State::Faulted, &mut failures);
        if !failures.is_empty() {
            warn!(component = %machine.name, failed = failures.len(), "State observers failed");
        }
    }
}
