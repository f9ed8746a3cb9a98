//! # Tekton Resource Types
//!
//! Typed `tekton.dev/v1beta1` objects. Only the fields the run engine reads are
//! modelled; everything else round-trips through the flattened `extra` maps so a
//! submitted manifest reaches the cluster unchanged.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single step template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<TaskSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A DAG of tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PipelineSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<PipelineTask>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finally: Vec<PipelineTask>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PipelineSpec {
    /// Names of every task that produces a TaskRun, `tasks` first then `finally`
    pub fn task_names(&self) -> Vec<String> {
        self.tasks
            .iter()
            .chain(self.finally.iter())
            .map(|task| task.name.clone())
            .collect()
    }

    /// Every task that produces a TaskRun, with the tasks Tekton finishes before creating it.
    ///
    /// A main task waits for the main tasks named in its `runAfter`; a `finally`
    /// task waits for every main task.
    pub fn expected_tasks(&self) -> Vec<ExpectedTask> {
        let main: Vec<&str> = self.tasks.iter().map(|task| task.name.as_str()).collect();

        let tasks = self.tasks.iter().map(|task| {
            let mut after = Vec::new();
            for predecessor in task.run_after() {
                if main.contains(&predecessor.as_str()) && !after.contains(&predecessor) {
                    after.push(predecessor);
                }
            }
            ExpectedTask {
                name: task.name.clone(),
                after,
                finally: false,
            }
        });
        let finally = self.finally.iter().map(|task| ExpectedTask {
            name: task.name.clone(),
            after: main.iter().map(|name| name.to_string()).collect(),
            finally: true,
        });
        tasks.chain(finally).collect()
    }
}

/// A pipeline task the run will create a TaskRun for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedTask {
    pub name: String,
    /// Tasks that must finish before the TaskRun is created
    pub after: Vec<String>,
    /// Runs whatever the outcome of the tasks before it
    pub finally: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTask {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<NamedRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PipelineTask {
    /// Task names listed in `runAfter`
    pub fn run_after(&self) -> Vec<String> {
        self.extra
            .get("runAfter")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `taskRef` / `pipelineRef`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One execution of a Task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<TaskRunSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_spec: Option<TaskSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One execution of a Pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PipelineRunSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_ref: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_spec: Option<PipelineSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PipelineRun {
    /// Task names declared inline, `None` when the run points at a named Pipeline instead
    pub fn embedded_task_names(&self) -> Option<Vec<String>> {
        self.spec
            .as_ref()
            .and_then(|spec| spec.pipeline_spec.as_ref())
            .map(PipelineSpec::task_names)
    }

    /// Tasks declared inline with their ordering, `None` when the run points at a named Pipeline
    pub fn embedded_tasks(&self) -> Option<Vec<ExpectedTask>> {
        self.spec
            .as_ref()
            .and_then(|spec| spec.pipeline_spec.as_ref())
            .map(PipelineSpec::expected_tasks)
    }

    /// Name of the referenced Pipeline, if the run uses `pipelineRef`
    pub fn pipeline_ref_name(&self) -> Option<&str> {
        self.spec
            .as_ref()
            .and_then(|spec| spec.pipeline_ref.as_ref())
            .and_then(|r| r.name.as_deref())
    }
}

/// Shared status block of TaskRun and PipelineRun
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
