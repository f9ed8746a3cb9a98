//! # Cluster Constants
//!
//! API groups, label keys and well-known values shared by the resolver, the HTTP
//! client and the in-memory cluster.

/// Tekton API group and version served under `/apis`
pub mod tekton {
    pub const API_GROUP: &str = "tekton.dev";
    pub const API_VERSION: &str = "v1beta1";
    pub const GROUP_VERSION: &str = "tekton.dev/v1beta1";

    /// Label Tekton sets on every TaskRun created for a PipelineRun
    pub const LABEL_PIPELINE_RUN: &str = "tekton.dev/pipelineRun";
    /// Label Tekton sets on every TaskRun naming the pipeline task it executes
    pub const LABEL_PIPELINE_TASK: &str = "tekton.dev/pipelineTask";
    /// Label Tekton sets on Pods naming the TaskRun that owns them
    pub const LABEL_TASK_RUN: &str = "tekton.dev/taskRun";
}

/// Core Kubernetes API served under `/api`
pub mod core_api {
    pub const API_VERSION: &str = "v1";
}

/// Pod phases reported in `status.phase`
pub mod pod_phase {
    pub const PENDING: &str = "Pending";
    pub const RUNNING: &str = "Running";
    pub const SUCCEEDED: &str = "Succeeded";
    pub const FAILED: &str = "Failed";
    pub const UNKNOWN: &str = "Unknown";

    /// Phases after which the Pod will not change again
    pub fn is_terminal(phase: &str) -> bool {
        phase == SUCCEEDED || phase == FAILED
    }
}

/// Environment variables consulted by configuration and logging
pub mod env {
    pub const ENVIRONMENT: &str = "TEKTON_RUN_ENV";
    pub const CONFIG_PREFIX: &str = "TEKTON_RUN";
    pub const CONFIG_SEPARATOR: &str = "__";
    pub const LOG_FORMAT: &str = "TEKTON_RUN_LOG_FORMAT";
}
