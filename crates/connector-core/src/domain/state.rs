//! Lifecycle states and transition records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a stateful component.
///
/// ```text
/// Initialized ──start──→ Starting ──ok──→ Running ──stop──→ Stopping ──→ Stopped
///                           │                │                  │
///                           └──err──→ Faulted ←──────err────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum State {
    Initialized = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
    Restarting = 5,
    Faulted = 6,
}

impl State {
    /// Decode the atomic representation. Unknown values map to `Faulted`.
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initialized,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            4 => Self::Stopped,
            5 => Self::Restarting,
            _ => Self::Faulted,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    /// True while a start, stop or restart is in flight.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping | Self::Restarting)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "Initialized",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Restarting => "Restarting",
            Self::Faulted => "Faulted",
        };
        f.write_str(name)
    }
}

/// Qualifier passed to stop hooks.
///
/// The state machine only forwards it; sources decide what it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StopType {
    /// Graceful stop requested by an operator or a reload.
    #[default]
    Normal,
    /// Process shutdown; sources may skip lengthy cleanup.
    Shutdown,
}

/// The lifecycle operation a result or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleOp {
    Start,
    Stop,
    Restart,
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("Start"),
            Self::Stop => f.write_str("Stop"),
            Self::Restart => f.write_str("Restart"),
        }
    }
}

/// Payload of a `StateChanged` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub previous: State,
    pub current: State,
}

/// Successful result of a lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// The component moved from `from` to `to` (possibly via transient states).
    Changed { from: State, to: State },
    /// Nothing to do in `state`; tolerated for racing or repeated callers.
    NoOp { state: State },
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp { .. })
    }

    /// The state the call left the component in.
    pub fn state(&self) -> State {
        match self {
            Self::Changed { to, .. } => *to,
            Self::NoOp { state } => *state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_u8_roundtrip() {
        for state in [
            State::Initialized,
            State::Starting,
            State::Running,
            State::Stopping,
            State::Stopped,
            State::Restarting,
            State::Faulted,
        ] {
            assert_eq!(State::from_u8(state.as_u8()), state);
        }
        assert_eq!(State::from_u8(200), State::Faulted);
    }

    #[test]
    fn test_transient_states() {
        assert!(State::Starting.is_transient());
        assert!(State::Restarting.is_transient());
        assert!(!State::Running.is_transient());
        assert!(!State::Faulted.is_transient());
    }

    #[test]
    fn test_transition_state() {
        let changed = Transition::Changed {
            from: State::Stopped,
            to: State::Running,
        };
        assert_eq!(changed.state(), State::Running);
        assert!(!changed.is_noop());
        assert!(Transition::NoOp {
            state: State::Running
        }
        .is_noop());
    }
}
