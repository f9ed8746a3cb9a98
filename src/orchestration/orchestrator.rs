//! # Run Orchestrator
//!
//! Composes submission, owner-chain resolution, readiness polling and log
//! streaming into one run:
//!
//! ```text
//! submit ─► resolve TaskRun ─► resolve Pod ─► pod reported ─► per container:
//!                                                  wait ready ─► stream ─► wait terminated
//!                                             ─► pod phase terminal
//! ```
//!
//! A PipelineRun fans out into one such pipeline per expected task. Pipelines run
//! concurrently, except that a task starts only once the tasks it runs after have
//! finished, and `finally` tasks start once every main task has. The orchestrator is the only place that decides the outcome of a
//! run; lower layers report errors and never suppress them.

use super::log_streamer::{LogStreamer, StreamError};
use super::poller::{Observation, PollError, PollPolicy, ReadinessPoller};
use super::resolver::OwnerChainResolver;
use super::run_graph::{
    container_names, container_phase, pod_phase, pod_reported, ContainerLogState,
    ContainerPhase, PodNode, RunGraph, TaskRunNode,
};
use super::sink::{JobOutputSink, TeeSink};
use super::state::{RunState, RunStateMachine, RunTransition};
use super::submitter::ResourceSubmitter;
use crate::cluster::{ClusterClient, ClusterError, ClusterResult, LogRequest};
use crate::config::TektonRunConfig;
use crate::constants::pod_phase as phases;
use crate::error::{TektonError, TektonResult};
use crate::resources::{ExpectedTask, ManifestInput, Resource, ResourceKind, ResourceRef};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use k8s_openapi::api::core::v1::Pod;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Root object as returned by the server
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedResource {
    pub reference: ResourceRef,
    pub object: Resource,
}

/// Job-level result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Succeeded,
    Failed,
    Aborted,
}

impl RunOutcome {
    fn from_state(state: RunState) -> Self {
        match state {
            RunState::Completed => Self::Succeeded,
            RunState::Aborted => Self::Aborted,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Everything the surrounding job needs once a run has finished
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub root: ResourceRef,
    pub outcome: RunOutcome,
    pub final_state: RunState,
    /// Every error observed, in the order the per-task pipelines were declared
    pub errors: Vec<TektonError>,
    /// Streamed logs plus the engine's own status lines, as written to the job output
    pub captured_logs: String,
    pub graph: RunGraph,
    pub transitions: Vec<RunTransition>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Aborts the runs in flight on one orchestrator.
///
/// Every run follows a child of the current generation token. Cancelling replaces
/// the generation, so runs started afterwards are unaffected. Cancelling the
/// job-level token given to [`RunOrchestrator::with_cancellation`] aborts every
/// run, present and future.
#[derive(Debug, Clone)]
pub struct RunCancellation {
    shutdown: CancellationToken,
    in_flight: Arc<Mutex<CancellationToken>>,
}

impl RunCancellation {
    fn new(shutdown: CancellationToken) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(shutdown.child_token())),
            shutdown,
        }
    }

    /// Abort every run currently in flight
    pub fn cancel(&self) {
        let mut in_flight = self.in_flight.lock();
        in_flight.cancel();
        *in_flight = self.shutdown.child_token();
    }

    /// Token for a run starting now
    fn run_token(&self) -> CancellationToken {
        self.in_flight.lock().child_token()
    }
}

/// Per-task pipeline that dependants can await alongside the final join
type TaskPipeline<'a> = Shared<BoxFuture<'a, TaskRunNode>>;

/// Per-run collaborators shared by all per-task pipelines
struct RunContext {
    root: ResourceRef,
    cancel: CancellationToken,
    machine: RunStateMachine,
    output: Arc<TeeSink>,
    streamer: LogStreamer,
    resolution: ReadinessPoller,
    readiness: ReadinessPoller,
    termination: ReadinessPoller,
    started_at: DateTime<Utc>,
}

pub struct RunOrchestrator {
    client: Arc<dyn ClusterClient>,
    config: Arc<TektonRunConfig>,
    cancellation: RunCancellation,
    submitter: ResourceSubmitter,
    resolver: OwnerChainResolver,
}

impl fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("config", &self.config.sanitized())
            .field("shutdown", &self.cancellation.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl RunOrchestrator {
    pub fn new(client: Arc<dyn ClusterClient>, config: TektonRunConfig) -> Self {
        Self {
            submitter: ResourceSubmitter::new(client.clone()),
            resolver: OwnerChainResolver::new(client.clone()),
            client,
            config: Arc::new(config),
            cancellation: RunCancellation::new(CancellationToken::new()),
        }
    }

    /// Derive every run's token from a job-level token owned by the caller
    pub fn with_cancellation(mut self, shutdown: CancellationToken) -> Self {
        self.cancellation = RunCancellation::new(shutdown);
        self
    }

    /// Handle the surrounding job raises to abort the runs in flight
    pub fn cancellation_handle(&self) -> RunCancellation {
        self.cancellation.clone()
    }

    pub fn config(&self) -> &TektonRunConfig {
        &self.config
    }

    /// Create `body` in the cluster.
    ///
    /// The namespace is `namespace` if given, then the manifest's own, then the
    /// configured default.
    #[instrument(skip(self, kind, body), fields(kind = %kind, name = %body.name()))]
    pub async fn submit_manifest(
        &self,
        kind: ResourceKind,
        body: &Resource,
        namespace: Option<&str>,
    ) -> TektonResult<SubmittedResource> {
        if body.kind() != kind {
            return Err(TektonError::ManifestError(format!(
                "expected a {kind} manifest, got a {}",
                body.kind()
            )));
        }
        let namespace = namespace
            .or(body.namespace())
            .unwrap_or(&self.config.cluster.namespace)
            .to_string();

        let object = self.submitter.submit(body, &namespace).await?;
        let reference = object.to_ref(&namespace);
        info!(root = %reference, uid = %reference.uid, "🚀 ORCHESTRATOR: Root object submitted");
        Ok(SubmittedResource { reference, object })
    }

    /// Follow a submitted object to completion, streaming container logs into `sink`
    #[instrument(skip(self, submitted, sink), fields(root = %submitted.reference))]
    pub async fn run_and_stream(
        &self,
        submitted: &SubmittedResource,
        sink: Arc<dyn JobOutputSink>,
    ) -> RunReport {
        let context = self.context(submitted.reference.clone(), sink, RunStateMachine::new(), Utc::now());
        self.follow(submitted, context).await
    }

    /// Follow an object that already exists in the cluster
    pub async fn attach_and_stream(
        &self,
        root: &ResourceRef,
        sink: Arc<dyn JobOutputSink>,
    ) -> TektonResult<RunReport> {
        let object = self
            .client
            .get(root.kind, &root.namespace, &root.name)
            .await
            .map_err(|err| lookup_error(err, root))?;
        let submitted = SubmittedResource {
            reference: object.to_ref(&root.namespace),
            object,
        };
        Ok(self.run_and_stream(&submitted, sink).await)
    }

    /// Load a manifest, submit it and follow it.
    ///
    /// Only an unreadable manifest is returned as an error; a rejected submission
    /// produces a failed report like any other run failure.
    pub async fn submit_and_run(
        &self,
        input: &ManifestInput,
        namespace: Option<&str>,
        sink: Arc<dyn JobOutputSink>,
    ) -> TektonResult<RunReport> {
        let started_at = Utc::now();
        let resource = input.load()?;
        let requested_root = resource.to_ref(
            namespace
                .or(resource.namespace())
                .unwrap_or(&self.config.cluster.namespace),
        );

        match self.submit_manifest(resource.kind(), &resource, namespace).await {
            Ok(submitted) => {
                let context = self.context(
                    submitted.reference.clone(),
                    sink,
                    RunStateMachine::new(),
                    started_at,
                );
                Ok(self.follow(&submitted, context).await)
            }
            Err(err) => {
                error!(root = %requested_root, error = %err, "❌ ORCHESTRATOR: Submission failed");
                let context = self.context(requested_root.clone(), sink, RunStateMachine::new(), started_at);
                Ok(self.conclude(context, RunGraph::new(requested_root), vec![err]))
            }
        }
    }

    fn context(
        &self,
        root: ResourceRef,
        sink: Arc<dyn JobOutputSink>,
        machine: RunStateMachine,
        started_at: DateTime<Utc>,
    ) -> RunContext {
        let cancel = self.cancellation.run_token();
        let output = Arc::new(TeeSink::new(sink));
        let poller = |policy: &crate::config::PollPolicyConfig, cancel: &CancellationToken| {
            ReadinessPoller::new(PollPolicy::from(policy), cancel.clone())
        };
        RunContext {
            root,
            machine,
            streamer: LogStreamer::new(self.client.clone(), output.clone(), cancel.clone()),
            output,
            resolution: poller(&self.config.polling.resolution, &cancel),
            readiness: poller(&self.config.polling.readiness, &cancel),
            termination: poller(&self.config.polling.termination, &cancel),
            cancel,
            started_at,
        }
    }

    async fn follow(&self, submitted: &SubmittedResource, context: RunContext) -> RunReport {
        let root = &submitted.reference;
        let mut graph = RunGraph::new(root.clone());
        let mut errors = Vec::new();

        match root.kind {
            ResourceKind::Task | ResourceKind::Pipeline => {
                info!(root = %root, "🚀 ORCHESTRATOR: Template submitted, nothing to follow");
            }
            ResourceKind::TaskRun => {
                context.machine.advance(RunState::ResolvingChildren);
                let node = self.follow_task(&context, None, Some(root.clone())).await;
                graph.task_runs.push(node);
            }
            ResourceKind::PipelineRun => {
                context.machine.advance(RunState::ResolvingChildren);
                let expected = match submitted.object.as_pipeline_run() {
                    Some(run) => self.resolver.expected_tasks(run, &root.namespace).await,
                    None => Err(TektonError::InvalidState(format!(
                        "{root} carries no PipelineRun body"
                    ))),
                };
                match expected {
                    Ok(tasks) => {
                        if tasks.is_empty() {
                            warn!(root = %root, "⚠️ ORCHESTRATOR: PipelineRun declares no tasks");
                        }
                        info!(
                            root = %root,
                            tasks = ?tasks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
                            "🚀 ORCHESTRATOR: Following pipeline tasks"
                        );
                        match self.schedule_tasks(&context, &tasks) {
                            Ok(pipelines) => graph.task_runs = join_all(pipelines).await,
                            Err(err) => errors.push(err),
                        }
                    }
                    Err(err) => errors.push(err),
                }
            }
            ResourceKind::Pod => errors.push(TektonError::InvalidState(format!(
                "{root} is followed through its TaskRun"
            ))),
        }

        errors.extend(graph.task_runs.iter().filter_map(|node| node.error.clone()));
        self.conclude(context, graph, errors)
    }

    /// Settle the terminal state exactly once and write the final status line
    fn conclude(&self, context: RunContext, graph: RunGraph, mut errors: Vec<TektonError>) -> RunReport {
        let root = context.root.clone();
        let cancelled =
            context.cancel.is_cancelled() || errors.iter().any(TektonError::is_cancellation);
        let mut final_state = if cancelled {
            RunState::Aborted
        } else if errors.is_empty() {
            RunState::Completed
        } else {
            RunState::Failed
        };

        let prefix = &self.config.streaming.status_line_prefix;
        let status_line = match (final_state, errors.iter().find(|e| !e.is_cancellation())) {
            (RunState::Completed, _) => format!("{prefix} {root} succeeded"),
            (RunState::Aborted, _) => format!("{prefix} {root} aborted"),
            (_, Some(err)) => format!("{prefix} {root} failed: {err}"),
            (_, None) => format!("{prefix} {root} failed"),
        };
        if let Err(err) = context.output.write_line(&status_line) {
            warn!(error = %err, "⚠️ ORCHESTRATOR: Could not write final status line");
            errors.push(TektonError::OutputError(err.to_string()));
            if final_state == RunState::Completed {
                final_state = RunState::Failed;
            }
        }

        if let Err(err) = context.machine.finish(final_state) {
            warn!(error = %err, "⚠️ ORCHESTRATOR: Terminal state already set");
        }
        let final_state = context.machine.current();
        let outcome = RunOutcome::from_state(final_state);

        match outcome {
            RunOutcome::Succeeded => info!(root = %root, pods = graph.pod_count(), "✅ ORCHESTRATOR: Run succeeded"),
            RunOutcome::Aborted => warn!(root = %root, "🛑 ORCHESTRATOR: Run aborted"),
            RunOutcome::Failed => error!(
                root = %root,
                error_count = errors.len(),
                first_error = errors.first().map(|e| e.error_code()).unwrap_or_default(),
                "❌ ORCHESTRATOR: Run failed"
            ),
        }

        RunReport {
            run_id: graph.run_id,
            root,
            outcome,
            final_state,
            errors,
            captured_logs: context.output.captured(),
            transitions: context.machine.transitions(),
            graph,
            started_at: context.started_at,
            finished_at: Utc::now(),
        }
    }

    /// One shared pipeline per task, in declaration order.
    ///
    /// A task's pipeline first awaits the pipelines of the tasks it runs after, since
    /// Tekton creates its TaskRun only once they have finished. A main task whose
    /// predecessor did not succeed is never created and is recorded as skipped.
    fn schedule_tasks<'a>(
        &'a self,
        context: &'a RunContext,
        tasks: &[ExpectedTask],
    ) -> TektonResult<Vec<TaskPipeline<'a>>> {
        let mut scheduled: HashMap<&str, TaskPipeline<'a>> = HashMap::new();

        for task in dependency_order(tasks)? {
            let predecessors: Vec<TaskPipeline<'a>> = task
                .after
                .iter()
                .filter_map(|name| scheduled.get(name.as_str()).cloned())
                .collect();
            let name = task.name.clone();
            let finally = task.finally;

            let pipeline = async move {
                let finished = join_all(predecessors).await;
                if !finally && finished.iter().any(|node| !node.succeeded()) {
                    info!(task = %name, "⏭️ ORCHESTRATOR: Predecessor did not succeed, task will not run");
                    return TaskRunNode::skipped(name);
                }
                if !finished.is_empty() {
                    debug!(task = %name, waited_for = finished.len(), "Predecessors finished");
                }
                self.follow_task(context, Some(name), None).await
            }
            .boxed()
            .shared();
            scheduled.insert(task.name.as_str(), pipeline);
        }

        Ok(tasks
            .iter()
            .filter_map(|task| scheduled.get(task.name.as_str()).cloned())
            .collect())
    }

    /// One per-task pipeline. It owns its node and returns it with any error recorded.
    async fn follow_task(
        &self,
        context: &RunContext,
        task_name: Option<String>,
        task_run: Option<ResourceRef>,
    ) -> TaskRunNode {
        let mut node = TaskRunNode::new(task_name);
        if let Err(err) = self.drive_task(context, &mut node, task_run).await {
            if err.is_cancellation() {
                debug!(task = %node.label(), "Per-task pipeline cancelled");
            } else {
                warn!(task = %node.label(), error = %err, "⚠️ ORCHESTRATOR: Per-task pipeline failed");
            }
            node.error = Some(err);
        }
        node
    }

    async fn drive_task(
        &self,
        context: &RunContext,
        node: &mut TaskRunNode,
        known_task_run: Option<ResourceRef>,
    ) -> TektonResult<()> {
        let task_run = match known_task_run {
            Some(task_run) => task_run,
            None => {
                let task = node.task_name.clone().unwrap_or_default();
                let target = format!("TaskRun for pipeline task '{task}' of {}", context.root);
                let resolver = &self.resolver;
                let root = &context.root;
                let task_ref = task.as_str();
                let found = context
                    .resolution
                    .poll_until(
                        &target,
                        move || async move {
                            resolver
                                .task_runs_for_pipeline_task(root, task_ref)
                                .await
                                .map(Observation::Present)
                        },
                        |refs: &Vec<ResourceRef>| !refs.is_empty(),
                    )
                    .await
                    .map_err(|err| resolution_error(err, target.clone(), root))?;
                first(found, &target)?
            }
        };
        debug!(task = %node.label(), task_run = %task_run.name, "TaskRun resolved");
        node.task_run = Some(task_run.clone());

        let target = format!("Pod of {task_run}");
        let resolver = &self.resolver;
        let owner = &task_run;
        let pods = context
            .resolution
            .poll_until(
                &target,
                move || async move {
                    resolver
                        .pods_for_task_run(owner)
                        .await
                        .map(Observation::Present)
                },
                |refs: &Vec<ResourceRef>| !refs.is_empty(),
            )
            .await
            .map_err(|err| resolution_error(err, target.clone(), &task_run))?;
        let pod = first(pods, &target)?;
        if context.machine.advance(RunState::WaitingForReady) {
            info!(root = %context.root, "🚀 ORCHESTRATOR: Children resolved, waiting for containers");
        }

        let mut pod_node = PodNode::new(pod);
        let result = self.follow_pod(context, &mut pod_node).await;
        node.pods.push(pod_node);
        result
    }

    async fn follow_pod(&self, context: &RunContext, node: &mut PodNode) -> TektonResult<()> {
        let pod_ref = node.pod.clone();
        let pod = &pod_ref;
        let client = self.client.as_ref();

        let snapshot = context
            .readiness
            .poll_until(&pod.to_string(), move || fetch_pod(client, pod), pod_reported)
            .await
            .map_err(|err| readiness_error(err, &node.pod, "reported by the kubelet"))?;
        node.phase = pod_phase(&snapshot).map(str::to_string);
        node.containers = container_names(&snapshot)
            .into_iter()
            .map(ContainerLogState::new)
            .collect();

        // Steps run one after another, so containers are followed in spec order
        for state in node.containers.iter_mut() {
            self.follow_container(context, pod, state).await?;
        }

        let snapshot = context
            .termination
            .poll_until(
                &pod.to_string(),
                move || fetch_pod(client, pod),
                |pod: &Pod| pod_phase(pod).is_some_and(phases::is_terminal),
            )
            .await
            .map_err(|err| readiness_error(err, &node.pod, "finished"))?;

        let phase = pod_phase(&snapshot).unwrap_or(phases::UNKNOWN).to_string();
        node.phase = Some(phase.clone());
        if phase == phases::FAILED {
            return Err(TektonError::PodFailed {
                pod: node.pod.name.clone(),
                phase,
            });
        }
        Ok(())
    }

    async fn follow_container(
        &self,
        context: &RunContext,
        pod_ref: &ResourceRef,
        state: &mut ContainerLogState,
    ) -> TektonResult<()> {
        let client = self.client.as_ref();
        let container = state.container_name.clone();
        let target = format!("{}/{container}", pod_ref.name);

        let snapshot = context
            .readiness
            .poll_until(
                &target,
                move || fetch_pod(client, pod_ref),
                |pod: &Pod| {
                    container_phase(pod, &container).is_streamable()
                        || pod_phase(pod).is_some_and(phases::is_terminal)
                },
            )
            .await
            .map_err(|err| readiness_error(err, pod_ref, "running"))?;
        state.observe(&snapshot);

        if !state.phase.is_streamable() {
            let phase = pod_phase(&snapshot).unwrap_or(phases::UNKNOWN).to_string();
            if phase == phases::FAILED {
                return Err(TektonError::PodFailed {
                    pod: pod_ref.name.clone(),
                    phase,
                });
            }
            return Err(TektonError::InvalidState(format!(
                "container {target} never started before the pod finished"
            )));
        }

        context.machine.advance(RunState::Streaming);
        state.begin_stream()?;
        context
            .output
            .write_line(&format!(
                "{} ==> {target}",
                self.config.streaming.status_line_prefix
            ))
            .map_err(TektonError::from)?;

        let request = LogRequest {
            pretty: self.config.streaming.pretty,
            ..LogRequest::follow(&pod_ref.namespace, &pod_ref.name, &container)
        };
        let interruption = match context.streamer.stream(&request).await {
            Ok(summary) => {
                debug!(target = %target, bytes = summary.bytes, "Log stream completed");
                if summary.bytes > 0 && !summary.ends_with_newline {
                    context.output.write(b"\n").map_err(TektonError::from)?;
                }
                None
            }
            Err(StreamError::Interrupted(reason)) => {
                state.stream_interrupted = true;
                Some(reason)
            }
            Err(StreamError::NotFound) => return Err(lookup_error_kind(pod_ref)),
            Err(StreamError::Cancelled) => return Err(TektonError::Cancelled),
            Err(StreamError::Output(message)) => return Err(TektonError::OutputError(message)),
        };

        let terminated = context
            .termination
            .poll_until(
                &target,
                move || fetch_pod(client, pod_ref),
                |pod: &Pod| container_phase(pod, &container) == ContainerPhase::Terminated,
            )
            .await;
        let snapshot = match (terminated, interruption.as_ref()) {
            (Ok(snapshot), _) => snapshot,
            // Terminal state unknown, so the partial log cannot be accepted
            (Err(PollError::Timeout { .. }), Some(reason)) => {
                return Err(TektonError::StreamInterrupted {
                    pod: pod_ref.name.clone(),
                    container: container.clone(),
                    reason: reason.clone(),
                })
            }
            (Err(err), _) => return Err(readiness_error(err, pod_ref, "terminated")),
        };
        state.observe(&snapshot);

        match state.exit_code {
            Some(0) => {
                if let Some(reason) = interruption {
                    warn!(
                        target = %target,
                        reason = %reason,
                        "⚠️ ORCHESTRATOR: Log stream interrupted, container succeeded; keeping partial logs"
                    );
                }
                Ok(())
            }
            Some(exit_code) => Err(TektonError::ContainerFailed {
                pod: pod_ref.name.clone(),
                container,
                exit_code,
                reason: state.reason.clone(),
            }),
            None => Err(TektonError::InvalidState(format!(
                "container {target} terminated without an exit code"
            ))),
        }
    }
}

/// Tasks ordered so each comes after every task it waits for
fn dependency_order(tasks: &[ExpectedTask]) -> TektonResult<Vec<&ExpectedTask>> {
    let mut placed = vec![false; tasks.len()];
    let mut order = Vec::with_capacity(tasks.len());

    while order.len() < tasks.len() {
        let before = order.len();
        for (index, task) in tasks.iter().enumerate() {
            if placed[index] {
                continue;
            }
            let ready = task.after.iter().all(|name| {
                tasks
                    .iter()
                    .zip(placed.iter())
                    .all(|(other, done)| other.name != *name || *done)
            });
            if ready {
                placed[index] = true;
                order.push(task);
            }
        }
        if order.len() == before {
            let stuck: Vec<&str> = tasks
                .iter()
                .zip(placed.iter())
                .filter(|(_, done)| !**done)
                .map(|(task, _)| task.name.as_str())
                .collect();
            return Err(TektonError::InvalidState(format!(
                "pipeline tasks {stuck:?} wait on each other through runAfter"
            )));
        }
    }
    Ok(order)
}

/// Fetch a Pod snapshot, treating a 404 as an observed deletion
async fn fetch_pod(client: &dyn ClusterClient, pod: &ResourceRef) -> ClusterResult<Observation<Pod>> {
    match Observation::from_lookup(client.get(ResourceKind::Pod, &pod.namespace, &pod.name).await)? {
        Observation::Present(resource) => {
            let kind = resource.kind();
            resource
                .into_pod()
                .map(Observation::Present)
                .ok_or_else(|| ClusterError::Decode(format!("expected a Pod, got a {kind}")))
        }
        Observation::Absent => Ok(Observation::Absent),
    }
}

fn first(mut refs: Vec<ResourceRef>, target: &str) -> TektonResult<ResourceRef> {
    if refs.is_empty() {
        return Err(TektonError::InvalidState(format!("{target} resolved to nothing")));
    }
    Ok(refs.swap_remove(0))
}

fn lookup_error_kind(missing: &ResourceRef) -> TektonError {
    TektonError::NotFound {
        kind: missing.kind,
        namespace: missing.namespace.clone(),
        name: missing.name.clone(),
    }
}

fn lookup_error(err: ClusterError, missing: &ResourceRef) -> TektonError {
    if err.is_not_found() {
        lookup_error_kind(missing)
    } else {
        err.into()
    }
}

fn resolution_error(err: PollError, target: String, subject: &ResourceRef) -> TektonError {
    match err {
        PollError::Timeout {
            attempts,
            elapsed_ms,
        } => TektonError::ResolutionTimeout {
            target,
            attempts,
            elapsed_ms,
        },
        PollError::NotFound => lookup_error_kind(subject),
        PollError::Cancelled => TektonError::Cancelled,
        PollError::Cluster(err) => lookup_error(err, subject),
    }
}

fn readiness_error(err: PollError, pod: &ResourceRef, awaited: &str) -> TektonError {
    match err {
        PollError::Timeout {
            attempts,
            elapsed_ms,
        } => TektonError::ReadinessTimeout {
            target: pod.to_string(),
            awaited: awaited.to_string(),
            attempts,
            elapsed_ms,
        },
        PollError::NotFound => lookup_error_kind(pod),
        PollError::Cancelled => TektonError::Cancelled,
        PollError::Cluster(err) => lookup_error(err, pod),
    }
}
