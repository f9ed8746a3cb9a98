//! # Cluster Client
//!
//! The outbound seam to the Kubernetes API. The run engine only ever talks to the
//! cluster through [`ClusterClient`], which keeps the orchestration logic testable
//! against [`crate::test_helpers::InMemoryCluster`] and runnable against a real
//! API server through [`HttpClusterClient`].
//!
//! Implementations must be safe for concurrent use: the orchestrator shares one
//! client across all per-task pipelines of a run without extra locking.

pub mod http;
pub mod paths;

use crate::resources::{Resource, ResourceKind};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub use http::HttpClusterClient;
pub use paths::{label_selector_query, pipeline_task_selector, ApiPath, LabelSelector};

/// Transport-level errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    /// The server answered 404
    #[error("Resource not found at {path}")]
    NotFound { path: String },

    /// Any other non-2xx answer
    #[error("HTTP {status} from {path}: {message}")]
    Api {
        status: u16,
        path: String,
        message: String,
    },

    /// Connection-level failure, including a dropped log stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body did not decode into the expected type
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Raw log bytes in arrival order. The stream ends when the server closes it.
pub type LogStream = BoxStream<'static, ClusterResult<Vec<u8>>>;

/// Parameters of a Pod log request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub follow: bool,
    pub pretty: bool,
}

impl LogRequest {
    /// Live follow request for one container
    pub fn follow(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
            follow: true,
            pretty: false,
        }
    }
}

/// Typed create/get/list plus log streaming against one cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create `resource` in `namespace`, returning the object as stored by the server
    async fn create(&self, namespace: &str, resource: &Resource) -> ClusterResult<Resource>;

    /// Fetch one object; a missing object is [`ClusterError::NotFound`]
    async fn get(&self, kind: ResourceKind, namespace: &str, name: &str)
        -> ClusterResult<Resource>;

    /// List objects of `kind`, optionally filtered server-side by a label selector
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> ClusterResult<Vec<Resource>>;

    /// Open a log stream for one container
    async fn open_log_stream(&self, request: &LogRequest) -> ClusterResult<LogStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_request_defaults() {
        let request = LogRequest::follow("test", "hello-world-pod", "hello-world-container");
        assert!(request.follow);
        assert!(!request.pretty);
        assert_eq!(request.container, "hello-world-container");
    }

    #[test]
    fn test_not_found_detection() {
        assert!(ClusterError::NotFound {
            path: "/api/v1/namespaces/test/pods/gone".to_string()
        }
        .is_not_found());
        assert!(!ClusterError::Transport("reset".to_string()).is_not_found());
    }
}
