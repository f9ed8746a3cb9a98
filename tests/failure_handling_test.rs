//! Pass/fail decisions: container exit codes, Pod phases, vanished objects,
//! dropped log streams and exhausted poll budgets.

mod common;

use common::*;
use std::sync::Arc;
use tekton_run::orchestration::{RunOrchestrator, RunOutcome, RunReport, RunState};
use tekton_run::resources::ResourceKind;
use tekton_run::test_helpers::{fixtures, InMemoryCluster, LogScript};
use tekton_run::TektonError;

async fn run_hello_world(cluster: &Arc<InMemoryCluster>) -> RunReport {
    run_with(RunOrchestrator::new(cluster.clone(), fast_config())).await
}

async fn run_with(orchestrator: RunOrchestrator) -> RunReport {
    let submitted = orchestrator
        .submit_manifest(ResourceKind::PipelineRun, &hello_world_pipeline_run().into(), None)
        .await
        .unwrap();
    orchestrator.run_and_stream(&submitted, capture()).await
}

/// TaskRun resolved immediately; the Pod is up to the test
fn seed_task_run(cluster: &InMemoryCluster) {
    cluster.insert(fixtures::task_run(TASK_RUN, NAMESPACE, &root_ref(), PIPELINE_TASK));
}

fn hello_pod() -> k8s_openapi::api::core::v1::Pod {
    fixtures::pod(POD, NAMESPACE, TASK_RUN, &[CONTAINER])
}

#[tokio::test(start_paused = true)]
async fn test_nonzero_exit_fails_despite_clean_stream() {
    let cluster = Arc::new(InMemoryCluster::new());
    seed_task_run(&cluster);
    let pod = fixtures::with_phase(
        fixtures::with_container_terminated(hello_pod(), CONTAINER, 1),
        "Failed",
    );
    cluster.insert(pod);
    cluster.script_log(NAMESPACE, POD, CONTAINER, LogScript::chunks(["step output\n"]));

    let report = run_hello_world(&cluster).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert!(report.captured_logs.contains("step output"));
    assert_eq!(
        report.errors,
        vec![TektonError::ContainerFailed {
            pod: POD.to_string(),
            container: CONTAINER.to_string(),
            exit_code: 1,
            reason: Some("Error".to_string()),
        }]
    );
    assert!(report.captured_logs.ends_with(
        "[tekton] PipelineRun test/release failed: Container hello-world-pod/hello-world-container terminated with exit code 1 (Error)\n"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failed_pod_phase_fails_run() {
    let cluster = Arc::new(InMemoryCluster::new());
    seed_task_run(&cluster);
    cluster.insert(fixtures::with_phase(
        fixtures::with_container_terminated(hello_pod(), CONTAINER, 0),
        "Failed",
    ));

    let report = run_hello_world(&cluster).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(
        report.errors,
        vec![TektonError::PodFailed {
            pod: POD.to_string(),
            phase: "Failed".to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_later_containers_not_followed_after_failure() {
    let cluster = Arc::new(InMemoryCluster::new());
    seed_task_run(&cluster);
    let pod = fixtures::pod(POD, NAMESPACE, TASK_RUN, &["step-one", "step-two"]);
    let pod = fixtures::with_container_terminated(pod, "step-one", 2);
    let pod = fixtures::with_container_terminated(pod, "step-two", 0);
    cluster.insert(fixtures::with_phase(pod, "Failed"));

    let report = run_hello_world(&cluster).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.errors[0].error_code(), "CONTAINER_FAILED");
    assert!(cluster.paths().iter().all(|p| !p.contains("container=step-two")));
    let streamed: Vec<_> = report
        .graph
        .containers()
        .filter(|(_, c)| c.streamed)
        .map(|(_, c)| c.container_name.clone())
        .collect();
    assert_eq!(streamed, vec!["step-one"]);
}

#[tokio::test(start_paused = true)]
async fn test_vanished_pod_is_not_found() {
    let cluster = Arc::new(InMemoryCluster::new());
    seed_task_run(&cluster);
    cluster.insert(hello_pod());
    cluster.script_pod(NAMESPACE, POD, vec![None]);

    let report = run_hello_world(&cluster).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(
        report.errors,
        vec![TektonError::NotFound {
            kind: ResourceKind::Pod,
            namespace: NAMESPACE.to_string(),
            name: POD.to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_task_run_times_out_resolution() {
    let cluster = Arc::new(InMemoryCluster::new());

    let report = run_hello_world(&cluster).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.final_state, RunState::Failed);
    match &report.errors[..] {
        [TektonError::ResolutionTimeout { target, attempts, .. }] => {
            assert_eq!(*attempts, 5);
            assert!(target.contains(PIPELINE_TASK));
        }
        other => panic!("expected a resolution timeout, got {other:?}"),
    }
    // One create plus one list per attempt
    assert_eq!(cluster.request_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_missing_pod_times_out_resolution() {
    let cluster = Arc::new(InMemoryCluster::new());
    seed_task_run(&cluster);

    let report = run_hello_world(&cluster).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].error_code(), "RESOLUTION_TIMEOUT");
    let node = &report.graph.task_runs[0];
    assert_eq!(node.task_run.as_ref().map(|r| r.name.as_str()), Some(TASK_RUN));
    assert!(node.pods.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_container_that_never_starts_times_out_readiness() {
    let cluster = Arc::new(InMemoryCluster::new());
    seed_task_run(&cluster);
    cluster.insert(fixtures::with_container_waiting(hello_pod(), CONTAINER));

    let report = run_hello_world(&cluster).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    match &report.errors[..] {
        [TektonError::ReadinessTimeout { awaited, attempts, .. }] => {
            assert_eq!(awaited, "running");
            assert_eq!(*attempts, 10);
        }
        other => panic!("expected a readiness timeout, got {other:?}"),
    }
    assert!(cluster.paths().iter().all(|p| !p.contains("/log?")));
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_stream_recovered_when_container_succeeds() {
    let cluster = Arc::new(InMemoryCluster::new());
    seed_task_run(&cluster);
    cluster.insert(fixtures::succeeded(hello_pod()));
    cluster.script_log(
        NAMESPACE,
        POD,
        CONTAINER,
        LogScript::interrupted(["partial line\n"], "connection reset by peer"),
    );

    let report = run_hello_world(&cluster).await;

    assert!(report.is_success(), "errors: {:?}", report.errors);
    assert!(report.captured_logs.contains("partial line"));
    let (_, container) = report.graph.containers().next().unwrap();
    assert!(container.stream_interrupted);
    assert_eq!(container.exit_code, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_stream_fails_when_termination_unknown() {
    let cluster = Arc::new(InMemoryCluster::new());
    seed_task_run(&cluster);
    cluster.insert(fixtures::with_container_running(hello_pod(), CONTAINER));
    cluster.script_log(
        NAMESPACE,
        POD,
        CONTAINER,
        LogScript::interrupted(["partial line\n"], "connection reset by peer"),
    );

    let report = run_hello_world(&cluster).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(
        report.errors,
        vec![TektonError::StreamInterrupted {
            pod: POD.to_string(),
            container: CONTAINER.to_string(),
            reason: "Transport error: connection reset by peer".to_string(),
        }]
    );
    assert!(report.captured_logs.contains("partial line"));
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_stream_with_nonzero_exit_reports_container_failure() {
    let cluster = Arc::new(InMemoryCluster::new());
    seed_task_run(&cluster);
    cluster.insert(fixtures::with_phase(
        fixtures::with_container_terminated(hello_pod(), CONTAINER, 137),
        "Failed",
    ));
    cluster.script_log(
        NAMESPACE,
        POD,
        CONTAINER,
        LogScript::interrupted(["partial"], "connection reset by peer"),
    );

    let report = run_hello_world(&cluster).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].error_code(), "CONTAINER_FAILED");
}

#[tokio::test(start_paused = true)]
async fn test_failing_task_does_not_stop_its_siblings() {
    let cluster = Arc::new(InMemoryCluster::new());
    // `broken` never gets a TaskRun
    seed_pipeline_task(&cluster, "healthy", "healthy log\n");
    let orchestrator = RunOrchestrator::new(cluster.clone(), fast_config());
    let run = fixtures::pipeline_run(PIPELINE_RUN, NAMESPACE, PIPELINE_RUN_UID, &["broken", "healthy"]);

    let submitted = orchestrator
        .submit_manifest(ResourceKind::PipelineRun, &run.into(), None)
        .await
        .unwrap();
    let report = orchestrator.run_and_stream(&submitted, capture()).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.errors.len(), 1);
    assert!(report.captured_logs.contains("healthy log"));
    assert!(report.graph.task_runs[1].succeeded());
    assert!(!report.graph.task_runs[0].succeeded());
}
