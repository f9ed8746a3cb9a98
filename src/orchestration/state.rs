use crate::error::{TektonError, TektonResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Run lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Creating the root object
    Submitting,
    /// Waiting for TaskRuns and Pods to appear
    ResolvingChildren,
    /// Waiting for containers to start
    WaitingForReady,
    /// At least one log stream is open
    Streaming,
    /// Every stream closed and every tracked container succeeded
    Completed,
    /// A stage failed
    Failed,
    /// The surrounding job cancelled the run
    Aborted,
}

impl RunState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if this is an active state (the run is in flight)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitting => write!(f, "submitting"),
            Self::ResolvingChildren => write!(f, "resolving_children"),
            Self::WaitingForReady => write!(f, "waiting_for_ready"),
            Self::Streaming => write!(f, "streaming"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitting" => Ok(Self::Submitting),
            "resolving_children" => Ok(Self::ResolvingChildren),
            "waiting_for_ready" => Ok(Self::WaitingForReady),
            "streaming" => Ok(Self::Streaming),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("Invalid run state: {s}")),
        }
    }
}

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTransition {
    pub from: RunState,
    pub to: RunState,
    pub at: DateTime<Utc>,
}

/// Forward-only state tracker for one run.
///
/// Per-task pipelines call [`advance`](Self::advance) concurrently, so the run
/// state is the furthest stage reached by any of them. The terminal state is set
/// exactly once through [`finish`](Self::finish).
#[derive(Debug)]
pub struct RunStateMachine {
    inner: Mutex<MachineInner>,
}

#[derive(Debug)]
struct MachineInner {
    current: RunState,
    transitions: Vec<RunTransition>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MachineInner {
                current: RunState::Submitting,
                transitions: Vec::new(),
            }),
        }
    }

    pub fn current(&self) -> RunState {
        self.inner.lock().current
    }

    /// Move to a later non-terminal stage. Returns whether the state changed;
    /// requests for the current or an earlier stage are ignored.
    pub fn advance(&self, to: RunState) -> bool {
        if to.is_terminal() {
            return false;
        }
        let mut inner = self.inner.lock();
        if inner.current.is_terminal() || to <= inner.current {
            return false;
        }
        let from = inner.current;
        inner.current = to;
        inner.transitions.push(RunTransition {
            from,
            to,
            at: Utc::now(),
        });
        debug!(from = %from, to = %to, "Run state advanced");
        true
    }

    /// Set the terminal state. Fails if the run already finished.
    pub fn finish(&self, to: RunState) -> TektonResult<()> {
        if !to.is_terminal() {
            return Err(TektonError::InvalidState(format!(
                "{to} is not a terminal run state"
            )));
        }
        let mut inner = self.inner.lock();
        if inner.current.is_terminal() {
            return Err(TektonError::InvalidState(format!(
                "run already finished as {}",
                inner.current
            )));
        }
        let from = inner.current;
        inner.current = to;
        inner.transitions.push(RunTransition {
            from,
            to,
            at: Utc::now(),
        });
        debug!(from = %from, to = %to, "Run finished");
        Ok(())
    }

    pub fn transitions(&self) -> Vec<RunTransition> {
        self.inner.lock().transitions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_string_round_trip() {
        for state in [
            RunState::Submitting,
            RunState::ResolvingChildren,
            RunState::WaitingForReady,
            RunState::Streaming,
            RunState::Completed,
            RunState::Failed,
            RunState::Aborted,
        ] {
            assert_eq!(state.to_string().parse::<RunState>().unwrap(), state);
        }
        assert!("running".parse::<RunState>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Aborted.is_terminal());
        assert!(!RunState::Streaming.is_terminal());
        assert!(RunState::Completed.is_success());
        assert!(!RunState::Aborted.is_success());
    }

    #[test]
    fn test_advance_is_forward_only() {
        let machine = RunStateMachine::new();
        assert!(machine.advance(RunState::ResolvingChildren));
        assert!(machine.advance(RunState::Streaming));
        assert!(!machine.advance(RunState::WaitingForReady));
        assert!(!machine.advance(RunState::Streaming));
        assert_eq!(machine.current(), RunState::Streaming);
        assert_eq!(machine.transitions().len(), 2);
    }

    #[test]
    fn test_finish_happens_once() {
        let machine = RunStateMachine::new();
        machine.advance(RunState::ResolvingChildren);
        machine.finish(RunState::Completed).unwrap();

        assert!(machine.finish(RunState::Failed).is_err());
        assert!(!machine.advance(RunState::Streaming));
        assert_eq!(machine.current(), RunState::Completed);
    }

    #[test]
    fn test_finish_rejects_non_terminal_target() {
        let machine = RunStateMachine::new();
        assert!(matches!(
            machine.finish(RunState::Streaming),
            Err(TektonError::InvalidState(_))
        ));
    }
}
