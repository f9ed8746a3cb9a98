//! # Cluster Resources
//!
//! Closed set of object kinds the run engine submits and follows. Each variant of
//! [`Resource`] carries its own typed payload; [`ResourceRef`] is the immutable
//! identity of an object once the cluster has assigned it a UID.

pub mod manifest;
pub mod tekton;

use crate::constants;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub use manifest::{parse_manifest, ManifestInput};
pub use tekton::{
    Condition, ExpectedTask, NamedRef, Pipeline, PipelineRun, PipelineRunSpec, PipelineSpec, PipelineTask,
    RunStatus, Step, Task, TaskRun, TaskRunSpec, TaskSpec,
};

/// Object kinds known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Task,
    Pipeline,
    TaskRun,
    PipelineRun,
    Pod,
}

impl ResourceKind {
    /// Kinds that may be submitted through the create path
    pub const SUBMITTABLE: [ResourceKind; 4] = [
        ResourceKind::Task,
        ResourceKind::Pipeline,
        ResourceKind::TaskRun,
        ResourceKind::PipelineRun,
    ];

    /// Lower-case plural used in REST paths
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Pipeline => "pipelines",
            Self::TaskRun => "taskruns",
            Self::PipelineRun => "pipelineruns",
            Self::Pod => "pods",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            Self::Pod => constants::core_api::API_VERSION,
            _ => constants::tekton::GROUP_VERSION,
        }
    }

    pub fn is_tekton(&self) -> bool {
        !matches!(self, Self::Pod)
    }

    /// Run kinds spawn children that can be followed; templates do not
    pub fn is_run(&self) -> bool {
        matches!(self, Self::TaskRun | Self::PipelineRun)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "Task",
            Self::Pipeline => "Pipeline",
            Self::TaskRun => "TaskRun",
            Self::PipelineRun => "PipelineRun",
            Self::Pod => "Pod",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Task" => Ok(Self::Task),
            "Pipeline" => Ok(Self::Pipeline),
            "TaskRun" => Ok(Self::TaskRun),
            "PipelineRun" => Ok(Self::PipelineRun),
            "Pod" => Ok(Self::Pod),
            _ => Err(format!("Unsupported resource kind: {s}")),
        }
    }
}

/// Identity of a cluster object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    /// Empty when the server response carried no UID
    pub uid: String,
}

impl ResourceRef {
    pub fn new(
        kind: ResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }

    pub fn has_uid(&self) -> bool {
        !self.uid.is_empty()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Owner back-link read from a child's `metadata.ownerReferences`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerLink {
    pub owner_uid: String,
    pub owner_kind: String,
    pub owner_name: String,
    pub child: ResourceRef,
}

impl OwnerLink {
    /// A link is only valid when it points at this exact parent instance
    pub fn is_owned_by(&self, parent: &ResourceRef) -> bool {
        parent.has_uid() && self.owner_uid == parent.uid
    }
}

/// A typed cluster object
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Task(Task),
    Pipeline(Pipeline),
    TaskRun(TaskRun),
    PipelineRun(PipelineRun),
    Pod(Pod),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Task(_) => ResourceKind::Task,
            Self::Pipeline(_) => ResourceKind::Pipeline,
            Self::TaskRun(_) => ResourceKind::TaskRun,
            Self::PipelineRun(_) => ResourceKind::PipelineRun,
            Self::Pod(_) => ResourceKind::Pod,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Task(r) => &r.metadata,
            Self::Pipeline(r) => &r.metadata,
            Self::TaskRun(r) => &r.metadata,
            Self::PipelineRun(r) => &r.metadata,
            Self::Pod(r) => &r.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Task(r) => &mut r.metadata,
            Self::Pipeline(r) => &mut r.metadata,
            Self::TaskRun(r) => &mut r.metadata,
            Self::PipelineRun(r) => &mut r.metadata,
            Self::Pod(r) => &mut r.metadata,
        }
    }

    /// `metadata.name`, falling back to `generateName` for objects not yet created
    pub fn name(&self) -> &str {
        let meta = self.metadata();
        meta.name
            .as_deref()
            .or(meta.generate_name.as_deref())
            .unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    pub fn uid(&self) -> &str {
        self.metadata().uid.as_deref().unwrap_or_default()
    }

    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.metadata().creation_timestamp.as_ref().map(|t| t.0)
    }

    pub fn owner_references(&self) -> &[OwnerReference] {
        self.metadata()
            .owner_references
            .as_deref()
            .unwrap_or_default()
    }

    /// Identity of this object; `default_namespace` fills in a missing namespace
    pub fn to_ref(&self, default_namespace: &str) -> ResourceRef {
        ResourceRef::new(
            self.kind(),
            self.namespace().unwrap_or(default_namespace),
            self.name(),
            self.uid(),
        )
    }

    /// Owner links derived from this object's owner references
    pub fn owner_links(&self, default_namespace: &str) -> Vec<OwnerLink> {
        let child = self.to_ref(default_namespace);
        self.owner_references()
            .iter()
            .map(|owner| OwnerLink {
                owner_uid: owner.uid.clone(),
                owner_kind: owner.kind.clone(),
                owner_name: owner.name.clone(),
                child: child.clone(),
            })
            .collect()
    }

    pub fn as_pipeline(&self) -> Option<&Pipeline> {
        match self {
            Self::Pipeline(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_task_run(&self) -> Option<&TaskRun> {
        match self {
            Self::TaskRun(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_pipeline_run(&self) -> Option<&PipelineRun> {
        match self {
            Self::PipelineRun(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_pod(&self) -> Option<&Pod> {
        match self {
            Self::Pod(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_pod(self) -> Option<Pod> {
        match self {
            Self::Pod(r) => Some(r),
            _ => None,
        }
    }

    /// Wire representation, with `apiVersion` and `kind` set
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let mut value = match self {
            Self::Task(r) => serde_json::to_value(r)?,
            Self::Pipeline(r) => serde_json::to_value(r)?,
            Self::TaskRun(r) => serde_json::to_value(r)?,
            Self::PipelineRun(r) => serde_json::to_value(r)?,
            Self::Pod(r) => serde_json::to_value(r)?,
        };
        if let Value::Object(map) = &mut value {
            map.insert(
                "apiVersion".to_string(),
                Value::String(self.kind().api_version().to_string()),
            );
            map.insert(
                "kind".to_string(),
                Value::String(self.kind().as_str().to_string()),
            );
        }
        Ok(value)
    }

    /// Decode a wire object of a known kind. List items usually omit `apiVersion`
    /// and `kind`, so both are filled in before decoding.
    pub fn from_json(kind: ResourceKind, mut value: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(map) = &mut value {
            map.entry("apiVersion")
                .or_insert_with(|| Value::String(kind.api_version().to_string()));
            map.entry("kind")
                .or_insert_with(|| Value::String(kind.as_str().to_string()));
        }
        Ok(match kind {
            ResourceKind::Task => Self::Task(serde_json::from_value(value)?),
            ResourceKind::Pipeline => Self::Pipeline(serde_json::from_value(value)?),
            ResourceKind::TaskRun => Self::TaskRun(serde_json::from_value(value)?),
            ResourceKind::PipelineRun => Self::PipelineRun(serde_json::from_value(value)?),
            ResourceKind::Pod => Self::Pod(serde_json::from_value(value)?),
        })
    }
}

impl From<Pod> for Resource {
    fn from(pod: Pod) -> Self {
        Self::Pod(pod)
    }
}

impl From<TaskRun> for Resource {
    fn from(run: TaskRun) -> Self {
        Self::TaskRun(run)
    }
}

impl From<PipelineRun> for Resource {
    fn from(run: PipelineRun) -> Self {
        Self::PipelineRun(run)
    }
}

impl From<Task> for Resource {
    fn from(task: Task) -> Self {
        Self::Task(task)
    }
}

impl From<Pipeline> for Resource {
    fn from(pipeline: Pipeline) -> Self {
        Self::Pipeline(pipeline)
    }
}
