//! Service lifecycle state machine.
//!
//! # States
//!
//! - `Uninitialized`: process started, nothing probed yet
//! - `Detecting`: enumerating and opening a reader
//! - `Connected`: a reader is open and idle
//! - `Capturing`: a capture is in flight
//! - `Disconnected`: no reader held
//! - `Failed`: the reader was lost mid-capture
//!
//! # Valid Transitions
//!
//! - Uninitialized / Disconnected / Failed → Detecting → Connected | Disconnected
//! - Connected → Capturing → Connected | Failed
//! - Connected → Detecting (re-initialize) | Disconnected (unplug, shutdown)
//! - Uninitialized / Failed → Disconnected (shutdown)
//!
//! ```
//! use bioscan_biometric::{ServiceState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! machine.transition_to(ServiceState::Detecting).unwrap();
//! machine.transition_to(ServiceState::Connected).unwrap();
//! assert!(machine.transition_to(ServiceState::Failed).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Transitions kept for diagnostics.
const MAX_HISTORY_SIZE: usize = 100;

/// Lifecycle state of the biometric service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Detecting,
    Connected,
    Capturing,
    Disconnected,
    Failed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Uninitialized => "Uninitialized",
            ServiceState::Detecting => "Detecting",
            ServiceState::Connected => "Connected",
            ServiceState::Capturing => "Capturing",
            ServiceState::Disconnected => "Disconnected",
            ServiceState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

impl ServiceState {
    /// Check if transition to target state is valid from this state.
    pub fn can_transition_to(&self, target: &ServiceState) -> bool {
        use ServiceState::*;

        matches!(
            (self, target),
            (Uninitialized | Disconnected | Failed, Detecting)
                | (Detecting, Connected | Disconnected)
                | (Connected, Capturing | Detecting | Disconnected)
                | (Capturing, Connected | Failed)
                | (Uninitialized | Failed, Disconnected)
        )
    }

    /// Whether a device handle is held in this state.
    pub fn holds_device(&self) -> bool {
        matches!(self, ServiceState::Connected | ServiceState::Capturing)
    }
}

/// A single recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ServiceState,
    pub to: ServiceState,
    pub at: DateTime<Utc>,
}

impl StateTransition {
    pub fn new(from: ServiceState, to: ServiceState) -> Self {
        Self {
            from,
            to,
            at: Utc::now(),
        }
    }
}

/// Validated state holder with bounded history.
///
/// Not synchronized; the service keeps it behind a mutex and performs each
/// check-and-transition under a single lock acquisition.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: ServiceState,
    entered_at: DateTime<Utc>,
    history: VecDeque<StateTransition>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a machine in `Uninitialized`.
    pub fn new() -> Self {
        Self::starting_at(ServiceState::Uninitialized)
    }

    /// Create a machine in an arbitrary state with empty history.
    pub fn starting_at(state: ServiceState) -> Self {
        Self {
            current: state,
            entered_at: Utc::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current(&self) -> ServiceState {
        self.current
    }

    pub fn entered_at(&self) -> DateTime<Utc> {
        self.entered_at
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Move to `target` if the rules allow it.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidTransition`] and leaves the state
    /// untouched when the transition is not allowed.
    pub fn transition_to(&mut self, target: ServiceState) -> Result<StateTransition> {
        if !self.current.can_transition_to(&target) {
            return Err(ServiceError::InvalidTransition {
                from: self.current,
                to: target,
            });
        }
        Ok(self.record(target))
    }

    /// Move to `target` without validation.
    ///
    /// Used for shutdown, which must end in `Disconnected` from anywhere.
    /// Returns `None` if already in `target`.
    pub fn reset_to(&mut self, target: ServiceState) -> Option<StateTransition> {
        (self.current != target).then(|| self.record(target))
    }

    fn record(&mut self, target: ServiceState) -> StateTransition {
        let transition = StateTransition::new(self.current, target);
        self.current = target;
        self.entered_at = transition.at;

        if self.history.len() == MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition.clone());
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ServiceState::*;

    #[rstest]
    #[case(Uninitialized, Detecting, true)]
    #[case(Disconnected, Detecting, true)]
    #[case(Failed, Detecting, true)]
    #[case(Detecting, Connected, true)]
    #[case(Detecting, Disconnected, true)]
    #[case(Connected, Capturing, true)]
    #[case(Connected, Detecting, true)]
    #[case(Connected, Disconnected, true)]
    #[case(Capturing, Connected, true)]
    #[case(Capturing, Failed, true)]
    #[case(Failed, Disconnected, true)]
    #[case(Uninitialized, Connected, false)]
    #[case(Uninitialized, Capturing, false)]
    #[case(Disconnected, Capturing, false)]
    #[case(Capturing, Capturing, false)]
    #[case(Capturing, Disconnected, false)]
    #[case(Capturing, Detecting, false)]
    #[case(Connected, Failed, false)]
    #[case(Detecting, Capturing, false)]
    fn test_transition_rules(#[case] from: ServiceState, #[case] to: ServiceState, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut machine = StateMachine::new();
        let error = machine.transition_to(Capturing).unwrap_err();

        assert!(matches!(
            error,
            ServiceError::InvalidTransition {
                from: Uninitialized,
                to: Capturing
            }
        ));
        assert_eq!(machine.current(), Uninitialized);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_capture_cycle_records_history() {
        let mut machine = StateMachine::new();
        for state in [Detecting, Connected, Capturing, Connected] {
            machine.transition_to(state).unwrap();
        }

        assert_eq!(machine.current(), Connected);
        assert_eq!(machine.history().len(), 4);
        assert_eq!(machine.history()[2].from, Connected);
        assert_eq!(machine.history()[2].to, Capturing);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = StateMachine::starting_at(Connected);
        for _ in 0..200 {
            machine.transition_to(Capturing).unwrap();
            machine.transition_to(Connected).unwrap();
        }
        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut machine = StateMachine::starting_at(Detecting);
        assert!(machine.reset_to(Disconnected).is_some());
        assert!(machine.reset_to(Disconnected).is_none());
        assert_eq!(machine.current(), Disconnected);
    }

    #[test]
    fn test_holds_device() {
        assert!(Connected.holds_device());
        assert!(Capturing.holds_device());
        assert!(!Failed.holds_device());
        assert!(!Detecting.holds_device());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Uninitialized).unwrap(), "\"uninitialized\"");
        assert_eq!(Capturing.to_string(), "Capturing");
    }
}
