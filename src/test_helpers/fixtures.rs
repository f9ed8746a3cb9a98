//! Builders for the objects Tekton's controller and the kubelet produce.

use crate::constants::{pod_phase, tekton};
use crate::resources::{
    NamedRef, Pipeline, PipelineRun, PipelineRunSpec, PipelineSpec, PipelineTask, ResourceKind,
    ResourceRef, Task, TaskRun, TaskRunSpec,
};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStateRunning, ContainerStateTerminated,
    ContainerStateWaiting, ContainerStatus,
    Pod, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use std::collections::BTreeMap;

fn meta(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

fn owner(kind: ResourceKind, name: &str, uid: &str) -> OwnerReference {
    OwnerReference {
        api_version: kind.api_version().to_string(),
        kind: kind.as_str().to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn pipeline_tasks(names: &[&str]) -> Vec<PipelineTask> {
    names
        .iter()
        .map(|name| PipelineTask {
            name: name.to_string(),
            task_ref: Some(NamedRef {
                name: Some(format!("{name}-task")),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect()
}

pub fn task(name: &str, namespace: &str) -> Task {
    Task {
        metadata: meta(name, namespace),
        spec: None,
    }
}

pub fn pipeline(name: &str, namespace: &str, tasks: &[&str], finally: &[&str]) -> Pipeline {
    Pipeline {
        metadata: meta(name, namespace),
        spec: Some(PipelineSpec {
            tasks: pipeline_tasks(tasks),
            finally: pipeline_tasks(finally),
            ..Default::default()
        }),
    }
}

/// PipelineRun with an inline pipeline spec declaring `tasks`
pub fn pipeline_run(name: &str, namespace: &str, uid: &str, tasks: &[&str]) -> PipelineRun {
    let mut metadata = meta(name, namespace);
    if !uid.is_empty() {
        metadata.uid = Some(uid.to_string());
    }
    PipelineRun {
        metadata,
        spec: Some(PipelineRunSpec {
            pipeline_spec: Some(PipelineSpec {
                tasks: pipeline_tasks(tasks),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    }
}

/// Declare `finally` tasks on an inline PipelineRun
pub fn with_finally(mut run: PipelineRun, finally: &[&str]) -> PipelineRun {
    if let Some(spec) = run.spec.as_mut().and_then(|s| s.pipeline_spec.as_mut()) {
        spec.finally.extend(pipeline_tasks(finally));
    }
    run
}

/// Make `task` of an inline PipelineRun wait for `after` through `runAfter`
pub fn with_run_after(mut run: PipelineRun, task: &str, after: &[&str]) -> PipelineRun {
    let declared = run
        .spec
        .as_mut()
        .and_then(|s| s.pipeline_spec.as_mut())
        .and_then(|spec| spec.tasks.iter_mut().find(|t| t.name == task));
    if let Some(declared) = declared {
        declared.extra.insert("runAfter".to_string(), serde_json::json!(after));
    }
    run
}

/// PipelineRun pointing at a stored Pipeline by name
pub fn pipeline_run_with_ref(name: &str, namespace: &str, uid: &str, pipeline: &str) -> PipelineRun {
    let mut run = pipeline_run(name, namespace, uid, &[]);
    run.spec = Some(PipelineRunSpec {
        pipeline_ref: Some(NamedRef {
            name: Some(pipeline.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    });
    run
}

/// TaskRun as the controller creates it for `task` of `pipeline_run`
pub fn task_run(name: &str, namespace: &str, pipeline_run: &ResourceRef, task: &str) -> TaskRun {
    let mut metadata = meta(name, namespace);
    metadata.uid = Some(format!("{name}-uid"));
    metadata.labels = Some(BTreeMap::from([
        (tekton::LABEL_PIPELINE_RUN.to_string(), pipeline_run.name.clone()),
        (tekton::LABEL_PIPELINE_TASK.to_string(), task.to_string()),
    ]));
    metadata.owner_references = Some(vec![owner(
        ResourceKind::PipelineRun,
        &pipeline_run.name,
        &pipeline_run.uid,
    )]);
    TaskRun {
        metadata,
        spec: Some(TaskRunSpec {
            task_ref: Some(NamedRef {
                name: Some(format!("{task}-task")),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    }
}

/// Standalone TaskRun, as submitted directly
pub fn standalone_task_run(name: &str, namespace: &str, uid: &str) -> TaskRun {
    let mut metadata = meta(name, namespace);
    if !uid.is_empty() {
        metadata.uid = Some(uid.to_string());
    }
    TaskRun {
        metadata,
        ..Default::default()
    }
}

/// Pending Pod owned by `task_run`, containers in step order, not yet reported on
pub fn pod(name: &str, namespace: &str, task_run: &str, containers: &[&str]) -> Pod {
    let mut metadata = meta(name, namespace);
    metadata.uid = Some(format!("{name}-uid"));
    metadata.labels = Some(BTreeMap::from([(
        tekton::LABEL_TASK_RUN.to_string(),
        task_run.to_string(),
    )]));
    metadata.owner_references = Some(vec![owner(
        ResourceKind::TaskRun,
        task_run,
        &format!("{task_run}-uid"),
    )]);
    Pod {
        metadata,
        spec: Some(PodSpec {
            containers: containers
                .iter()
                .map(|name| Container {
                    name: name.to_string(),
                    image: Some("busybox".to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(pod_phase::PENDING.to_string()),
            ..Default::default()
        }),
    }
}

pub fn with_created_at(mut pod: Pod, at: DateTime<Utc>) -> Pod {
    pod.metadata.creation_timestamp = Some(Time(at));
    pod
}

pub fn with_phase(mut pod: Pod, phase: &str) -> Pod {
    pod.status.get_or_insert_with(PodStatus::default).phase = Some(phase.to_string());
    pod
}

fn with_container_state(mut pod: Pod, container: &str, state: ContainerState) -> Pod {
    let running = state.running.is_some();
    let status = pod.status.get_or_insert_with(PodStatus::default);
    let statuses = status.container_statuses.get_or_insert_with(Vec::new);
    match statuses.iter_mut().find(|s| s.name == container) {
        Some(existing) => {
            existing.ready = running;
            existing.state = Some(state);
        }
        None => statuses.push(ContainerStatus {
            name: container.to_string(),
            image: "busybox".to_string(),
            ready: running,
            state: Some(state),
            ..Default::default()
        }),
    }
    pod
}

/// Container reported but not started, e.g. while its image is pulled
pub fn with_container_waiting(pod: Pod, container: &str) -> Pod {
    with_container_state(
        pod,
        container,
        ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some("PodInitializing".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
    )
}

/// Container started; Pod phase becomes Running
pub fn with_container_running(pod: Pod, container: &str) -> Pod {
    let pod = with_container_state(
        pod,
        container,
        ContainerState {
            running: Some(ContainerStateRunning::default()),
            ..Default::default()
        },
    );
    with_phase(pod, pod_phase::RUNNING)
}

/// Container exited with `exit_code`; the Pod phase is left unchanged
pub fn with_container_terminated(pod: Pod, container: &str, exit_code: i32) -> Pod {
    with_container_state(
        pod,
        container,
        ContainerState {
            terminated: Some(ContainerStateTerminated {
                exit_code,
                reason: Some(if exit_code == 0 { "Completed" } else { "Error" }.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
    )
}

/// Every container exited 0 and the Pod Succeeded
pub fn succeeded(pod: Pod) -> Pod {
    let containers: Vec<String> = pod
        .spec
        .as_ref()
        .map(|s| s.containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();
    let pod = containers
        .iter()
        .fold(pod, |pod, name| with_container_terminated(pod, name, 0));
    with_phase(pod, pod_phase::SUCCEEDED)
}
