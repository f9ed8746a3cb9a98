//! Proptest strategies for Kubernetes names and run-state sequences.
#![allow(dead_code)]

use proptest::prelude::*;
use tekton_run::RunState;

/// Valid label value: alphanumeric ends, `-`, `_` and `.` inside
pub fn label_value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]([A-Za-z0-9._-]{0,30}[A-Za-z0-9])?"
}

/// DNS-1123 object name
pub fn object_name_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]([a-z0-9-]{0,40}[a-z0-9])?"
}

pub fn run_state_strategy() -> impl Strategy<Value = RunState> {
    prop_oneof![
        Just(RunState::Submitting),
        Just(RunState::ResolvingChildren),
        Just(RunState::WaitingForReady),
        Just(RunState::Streaming),
        Just(RunState::Completed),
        Just(RunState::Failed),
        Just(RunState::Aborted),
    ]
}

/// Arbitrary request sequence as concurrent per-task pipelines would issue it
pub fn run_state_sequence_strategy() -> impl Strategy<Value = Vec<RunState>> {
    prop::collection::vec(run_state_strategy(), 0..24)
}
