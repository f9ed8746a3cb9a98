//! # Run Graph
//!
//! Tree of everything one run has observed: root → TaskRuns → Pods → containers.
//! Built incrementally as each level becomes visible and never assumed complete at
//! submission time. Each per-task pipeline owns its [`TaskRunNode`] exclusively and
//! hands it back to the orchestrator when it finishes.

use crate::constants::pod_phase as phases;
use crate::error::{TektonError, TektonResult};
use crate::resources::ResourceRef;
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Log-relevant container phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerPhase {
    /// Never started; the log endpoint would reject a follow request
    Waiting,
    /// Running; the log endpoint accepts a follow request
    Ready,
    /// Exited; the log holds every byte the container will produce
    Terminated,
}

impl ContainerPhase {
    pub fn from_status(status: &ContainerStatus) -> Self {
        match status.state.as_ref() {
            Some(state) if state.terminated.is_some() => Self::Terminated,
            Some(state) if state.running.is_some() => Self::Ready,
            _ => Self::Waiting,
        }
    }

    /// Streaming may start from here
    pub fn is_streamable(&self) -> bool {
        matches!(self, Self::Ready | Self::Terminated)
    }
}

/// Status entry for `container` in a Pod snapshot
pub fn container_status<'a>(pod: &'a Pod, container: &str) -> Option<&'a ContainerStatus> {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|statuses| statuses.iter().find(|s| s.name == container))
}

/// Phase of `container` in a Pod snapshot; an unreported container is Waiting
pub fn container_phase(pod: &Pod, container: &str) -> ContainerPhase {
    container_status(pod, container)
        .map(ContainerPhase::from_status)
        .unwrap_or(ContainerPhase::Waiting)
}

/// `status.phase`, if reported
pub fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|s| s.phase.as_deref())
}

/// The kubelet has reported on this Pod: container statuses exist or it already finished
pub fn pod_reported(pod: &Pod) -> bool {
    let has_statuses = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .is_some_and(|statuses| !statuses.is_empty());
    has_statuses || pod_phase(pod).is_some_and(phases::is_terminal)
}

/// Container names in spec order
pub fn container_names(pod: &Pod) -> Vec<String> {
    pod.spec
        .as_ref()
        .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default()
}

/// Per-container log bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLogState {
    pub container_name: String,
    pub phase: ContainerPhase,
    /// Set once the log stream was opened; never reset within a run
    pub streamed: bool,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
    /// The log transport dropped before the server closed it
    pub stream_interrupted: bool,
}

impl ContainerLogState {
    pub fn new(container_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            phase: ContainerPhase::Waiting,
            streamed: false,
            exit_code: None,
            reason: None,
            stream_interrupted: false,
        }
    }

    /// Fold a fresh Pod snapshot into this state. Phases only move forward.
    pub fn observe(&mut self, pod: &Pod) {
        let Some(status) = container_status(pod, &self.container_name) else {
            return;
        };
        let phase = ContainerPhase::from_status(status);
        if phase == ContainerPhase::Terminated
            || (phase == ContainerPhase::Ready && self.phase == ContainerPhase::Waiting)
        {
            self.phase = phase;
        }
        if let Some(terminated) = status.state.as_ref().and_then(|s| s.terminated.as_ref()) {
            self.exit_code = Some(terminated.exit_code);
            self.reason = terminated.reason.clone();
        }
    }

    /// Claim the single stream allowed for this container
    pub fn begin_stream(&mut self) -> TektonResult<()> {
        if !self.phase.is_streamable() {
            return Err(TektonError::InvalidState(format!(
                "container {} is still waiting",
                self.container_name
            )));
        }
        if self.streamed {
            return Err(TektonError::InvalidState(format!(
                "container {} was already streamed",
                self.container_name
            )));
        }
        self.streamed = true;
        Ok(())
    }

    pub fn succeeded(&self) -> bool {
        self.phase == ContainerPhase::Terminated && self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodNode {
    pub pod: ResourceRef,
    pub containers: Vec<ContainerLogState>,
    pub phase: Option<String>,
}

impl PodNode {
    pub fn new(pod: ResourceRef) -> Self {
        Self {
            pod,
            containers: Vec::new(),
            phase: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.phase.as_deref() == Some(phases::SUCCEEDED)
            && self.containers.iter().all(ContainerLogState::succeeded)
    }
}

/// One per expected task. `task_run` stays empty until resolution succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRunNode {
    /// Pipeline task name; `None` for a directly submitted TaskRun
    pub task_name: Option<String>,
    pub task_run: Option<ResourceRef>,
    pub pods: Vec<PodNode>,
    /// Not created by Tekton because a task it runs after failed
    #[serde(default)]
    pub skipped: bool,
    #[serde(skip)]
    pub error: Option<TektonError>,
}

impl TaskRunNode {
    pub fn new(task_name: Option<String>) -> Self {
        Self {
            task_name,
            task_run: None,
            pods: Vec::new(),
            skipped: false,
            error: None,
        }
    }

    pub fn skipped(task_name: String) -> Self {
        Self {
            skipped: true,
            ..Self::new(Some(task_name))
        }
    }

    /// Label used in logs and status lines
    pub fn label(&self) -> String {
        match (&self.task_name, &self.task_run) {
            (Some(task), _) => task.clone(),
            (None, Some(run)) => run.name.clone(),
            (None, None) => "<unresolved>".to_string(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && !self.pods.is_empty() && self.pods.iter().all(PodNode::succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunGraph {
    pub run_id: Uuid,
    pub root: ResourceRef,
    pub task_runs: Vec<TaskRunNode>,
}

impl RunGraph {
    pub fn new(root: ResourceRef) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            root,
            task_runs: Vec::new(),
        }
    }

    pub fn containers(&self) -> impl Iterator<Item = (&PodNode, &ContainerLogState)> {
        self.task_runs
            .iter()
            .flat_map(|node| node.pods.iter())
            .flat_map(|pod| pod.containers.iter().map(move |c| (pod, c)))
    }

    pub fn pod_count(&self) -> usize {
        self.task_runs.iter().map(|node| node.pods.len()).sum()
    }
}
