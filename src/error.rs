//! Error types for the Tekton run engine.
//!

use crate::cluster::ClusterError;
use crate::resources::ResourceKind;
use thiserror::Error;

/// Crate-level error taxonomy.
///
/// Lower layers (`cluster`, `orchestration::poller`) have their own error types and
/// are mapped into this one at the call site, so the orchestrator is the only place
/// that decides whether an error fails the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TektonError {
    /// Creating the root object failed. Never retried: creation is not idempotent.
    #[error("Submission error: failed to create {kind} '{name}' in namespace '{namespace}': {reason}")]
    SubmissionError {
        kind: ResourceKind,
        namespace: String,
        name: String,
        reason: String,
    },

    /// An expected child object never appeared within its poll budget
    #[error("Resolution timeout: {target} did not appear after {attempts} attempts ({elapsed_ms}ms)")]
    ResolutionTimeout {
        target: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    /// A resolved object never reached the awaited state within its poll budget
    #[error("Readiness timeout: {target} was not {awaited} after {attempts} attempts ({elapsed_ms}ms)")]
    ReadinessTimeout {
        target: String,
        awaited: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    /// A previously resolved object vanished from the cluster
    #[error("Not found: {kind} {namespace}/{name}")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    /// The log transport dropped before the server closed the stream
    #[error("Stream interrupted for {pod}/{container}: {reason}")]
    StreamInterrupted {
        pod: String,
        container: String,
        reason: String,
    },

    /// A tracked container terminated unsuccessfully
    #[error("Container {pod}/{container} terminated with exit code {exit_code}{}", .reason.as_ref().map(|r| format!(" ({r})")).unwrap_or_default())]
    ContainerFailed {
        pod: String,
        container: String,
        exit_code: i32,
        reason: Option<String>,
    },

    /// The Pod reported a Failed phase
    #[error("Pod {pod} finished in phase {phase}")]
    PodFailed { pod: String, phase: String },

    /// The surrounding job aborted the run
    #[error("Run cancelled")]
    Cancelled,

    #[error("Cluster error: {0}")]
    ClusterError(String),

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Writing to the job output failed
    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TektonError {
    /// Whether this error came from cancellation rather than a run failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short machine-readable code, used in status lines and structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SubmissionError { .. } => "SUBMISSION_ERROR",
            Self::ResolutionTimeout { .. } => "RESOLUTION_TIMEOUT",
            Self::ReadinessTimeout { .. } => "READINESS_TIMEOUT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::StreamInterrupted { .. } => "STREAM_INTERRUPTED",
            Self::ContainerFailed { .. } => "CONTAINER_FAILED",
            Self::PodFailed { .. } => "POD_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::ClusterError(_) => "CLUSTER_ERROR",
            Self::ManifestError(_) => "MANIFEST_ERROR",
            Self::ConfigurationError(_) => "CONFIGURATION_ERROR",
            Self::OutputError(_) => "OUTPUT_ERROR",
            Self::InvalidState(_) => "INVALID_STATE",
        }
    }
}

impl From<ClusterError> for TektonError {
    fn from(err: ClusterError) -> Self {
        TektonError::ClusterError(err.to_string())
    }
}

impl From<std::io::Error> for TektonError {
    fn from(err: std::io::Error) -> Self {
        TektonError::OutputError(err.to_string())
    }
}

impl From<serde_yaml::Error> for TektonError {
    fn from(err: serde_yaml::Error) -> Self {
        TektonError::ManifestError(format!("YAML parse error: {err}"))
    }
}

impl From<serde_json::Error> for TektonError {
    fn from(err: serde_json::Error) -> Self {
        TektonError::ManifestError(format!("JSON serialization error: {err}"))
    }
}

pub type TektonResult<T> = std::result::Result<T, TektonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_failed_display_includes_reason() {
        let err = TektonError::ContainerFailed {
            pod: "build-pod".to_string(),
            container: "step-compile".to_string(),
            exit_code: 2,
            reason: Some("Error".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Container build-pod/step-compile terminated with exit code 2 (Error)"
        );

        let bare = TektonError::ContainerFailed {
            pod: "build-pod".to_string(),
            container: "step-compile".to_string(),
            exit_code: 1,
            reason: None,
        };
        assert_eq!(
            bare.to_string(),
            "Container build-pod/step-compile terminated with exit code 1"
        );
    }

    #[test]
    fn test_cluster_error_conversion() {
        let err: TektonError = ClusterError::Transport("connection reset".to_string()).into();
        assert_eq!(err.error_code(), "CLUSTER_ERROR");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_only_cancelled_is_cancellation() {
        assert!(TektonError::Cancelled.is_cancellation());
        assert!(!TektonError::InvalidState("x".to_string()).is_cancellation());
    }
}
