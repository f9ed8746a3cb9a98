//! Cluster scenarios shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use tekton_run::orchestration::{CapturingSink, RunOrchestrator};
use tekton_run::resources::{ResourceKind, ResourceRef};
use tekton_run::test_helpers::{fixtures, InMemoryCluster, LogScript};
use tekton_run::TektonRunConfig;

pub const NAMESPACE: &str = "test";
pub const PIPELINE_RUN: &str = "release";
pub const PIPELINE_RUN_UID: &str = "pipeline-run-uid";
pub const PIPELINE_TASK: &str = "pipelineTaskName";
pub const TASK_RUN: &str = "testTaskRun";
pub const POD: &str = "hello-world-pod";
pub const CONTAINER: &str = "hello-world-container";
pub const POD_LOG: &str = "Whoop! This is the pod log";

pub const POLL_INTERVAL_MS: u64 = 100;

/// Short intervals, small budgets, namespace `test`
pub fn fast_config() -> TektonRunConfig {
    let mut config = TektonRunConfig::default();
    config.cluster.namespace = NAMESPACE.to_string();
    for policy in [
        &mut config.polling.resolution,
        &mut config.polling.readiness,
        &mut config.polling.termination,
    ] {
        policy.interval_ms = POLL_INTERVAL_MS;
        policy.max_attempts = Some(5);
        policy.max_duration_ms = None;
    }
    config.polling.readiness.max_attempts = Some(10);
    config
}

pub fn orchestrator(cluster: &Arc<InMemoryCluster>) -> RunOrchestrator {
    RunOrchestrator::new(cluster.clone(), fast_config())
}

pub fn capture() -> Arc<CapturingSink> {
    Arc::new(CapturingSink::new())
}

pub fn root_ref() -> ResourceRef {
    ResourceRef::new(
        ResourceKind::PipelineRun,
        NAMESPACE,
        PIPELINE_RUN,
        PIPELINE_RUN_UID,
    )
}

/// The `release` PipelineRun with a single task, as the user submits it
pub fn hello_world_pipeline_run() -> tekton_run::resources::PipelineRun {
    fixtures::pipeline_run(PIPELINE_RUN, NAMESPACE, PIPELINE_RUN_UID, &[PIPELINE_TASK])
}

/// Seed what Tekton's controller and the kubelet produce for the `release` run:
/// one TaskRun that appears once the run is submitted, and a Pod whose only
/// container has already finished with exit code 0.
pub fn seed_hello_world(cluster: &InMemoryCluster) {
    cluster.insert_visible_after(
        fixtures::task_run(TASK_RUN, NAMESPACE, &root_ref(), PIPELINE_TASK),
        1,
    );
    cluster.insert(fixtures::succeeded(fixtures::pod(
        POD,
        NAMESPACE,
        TASK_RUN,
        &[CONTAINER],
    )));
    cluster.script_log(NAMESPACE, POD, CONTAINER, LogScript::chunks([POD_LOG]));
}

/// Seed a TaskRun and Pod for one more pipeline task of the `release` run
pub fn seed_pipeline_task(cluster: &InMemoryCluster, task: &str, log: &str) -> (String, String) {
    let task_run = format!("release-{task}");
    let pod = format!("{task_run}-pod");
    cluster.insert(fixtures::task_run(&task_run, NAMESPACE, &root_ref(), task));
    cluster.insert(fixtures::succeeded(fixtures::pod(
        &pod,
        NAMESPACE,
        &task_run,
        &["step-build"],
    )));
    cluster.script_log(NAMESPACE, &pod, "step-build", LogScript::chunks([log]));
    (task_run, pod)
}

/// `GET` path of the hello-world Pod
pub fn pod_path() -> String {
    format!("/api/v1/namespaces/{NAMESPACE}/pods/{POD}")
}
