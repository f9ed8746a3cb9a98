//! In-memory [`ClusterClient`] recording every request it serves.
//!
//! Objects can be made visible only after a number of requests to mimic the delay
//! between submitting a run and Tekton creating its children. Pod reads can be
//! scripted as a sequence of snapshots to walk a Pod through its lifecycle.

use crate::cluster::{ApiPath, ClusterClient, ClusterError, ClusterResult, LabelSelector, LogRequest, LogStream};
use crate::resources::{Resource, ResourceKind};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// One request as the API server would have seen it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
}

impl RecordedRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

/// Scripted log endpoint behaviour for one container
#[derive(Debug, Clone, PartialEq)]
pub enum LogScript {
    /// Yield the chunks, then close
    Complete(Vec<Vec<u8>>),
    /// Yield the chunks, then fail with a transport error
    Interrupted { chunks: Vec<Vec<u8>>, reason: String },
    /// Yield the chunks, then stay open forever
    Pending(Vec<Vec<u8>>),
}

impl LogScript {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self::Complete(to_chunks(chunks))
    }

    pub fn interrupted<I, S>(chunks: I, reason: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self::Interrupted {
            chunks: to_chunks(chunks),
            reason: reason.into(),
        }
    }

    pub fn pending<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self::Pending(to_chunks(chunks))
    }

    fn into_stream(self) -> LogStream {
        match self {
            Self::Complete(chunks) => stream::iter(chunks.into_iter().map(Ok)).boxed(),
            Self::Interrupted { chunks, reason } => stream::iter(chunks.into_iter().map(Ok))
                .chain(stream::once(async move { Err(ClusterError::Transport(reason)) }))
                .boxed(),
            Self::Pending(chunks) => stream::iter(chunks.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed(),
        }
    }
}

fn to_chunks<I, S>(chunks: I) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    chunks.into_iter().map(|c| c.as_ref().to_vec()).collect()
}

struct StoredObject {
    resource: Resource,
    /// Hidden from the first `visible_after` requests
    visible_after: usize,
}

type ObjectKey = (String, String);
type ContainerKey = (String, String, String);

#[derive(Default)]
struct ClusterState {
    objects: Vec<StoredObject>,
    pod_snapshots: HashMap<ObjectKey, VecDeque<Option<Pod>>>,
    logs: HashMap<ContainerKey, LogScript>,
    requests: Vec<RecordedRequest>,
    create_failure: Option<ClusterError>,
}

impl ClusterState {
    /// Record a request and return its zero-based index
    fn record(&mut self, method: &str, path: String) -> usize {
        self.requests.push(RecordedRequest::new(method, path));
        self.requests.len() - 1
    }

    fn visible(&self, index: usize) -> impl Iterator<Item = &Resource> {
        self.objects
            .iter()
            .filter(move |o| index >= o.visible_after)
            .map(|o| &o.resource)
    }
}

fn matches(resource: &Resource, kind: ResourceKind, namespace: &str) -> bool {
    resource.kind() == kind && resource.namespace().unwrap_or_default() == namespace
}

/// Hand-written stand-in for the Kubernetes API server
#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<ClusterState>,
}

impl std::fmt::Debug for InMemoryCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryCluster")
            .field("objects", &state.objects.len())
            .field("requests", &state.requests.len())
            .finish()
    }
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, visible immediately
    pub fn insert(&self, resource: impl Into<Resource>) {
        self.insert_visible_after(resource, 0);
    }

    /// Store an object that only the requests after the first `requests` will see
    pub fn insert_visible_after(&self, resource: impl Into<Resource>, requests: usize) {
        self.state.lock().objects.push(StoredObject {
            resource: resource.into(),
            visible_after: requests,
        });
    }

    /// Script successive GET answers for one Pod; `None` answers 404. The last
    /// snapshot repeats once the script is exhausted.
    pub fn script_pod(&self, namespace: &str, name: &str, snapshots: Vec<Option<Pod>>) {
        self.state
            .lock()
            .pod_snapshots
            .insert((namespace.to_string(), name.to_string()), snapshots.into());
    }

    pub fn script_log(&self, namespace: &str, pod: &str, container: &str, script: LogScript) {
        self.state.lock().logs.insert(
            (namespace.to_string(), pod.to_string(), container.to_string()),
            script,
        );
    }

    /// Make every create fail with `error`
    pub fn fail_creates_with(&self, error: ClusterError) {
        self.state.lock().create_failure = Some(error);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .map(|r| r.path.clone())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Stored object, bypassing visibility and without recording a request
    pub fn stored(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<Resource> {
        self.state
            .lock()
            .objects
            .iter()
            .map(|o| &o.resource)
            .find(|r| matches(r, kind, namespace) && r.name() == name)
            .cloned()
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn create(&self, namespace: &str, resource: &Resource) -> ClusterResult<Resource> {
        let mut state = self.state.lock();
        state.record("POST", ApiPath::collection(resource.kind(), namespace));
        if let Some(error) = state.create_failure.clone() {
            return Err(error);
        }

        let mut created = resource.clone();
        let metadata = created.metadata_mut();
        metadata.namespace = Some(namespace.to_string());
        if metadata.name.is_none() {
            let prefix = metadata.generate_name.clone().unwrap_or_default();
            metadata.name = Some(format!("{prefix}{}", &Uuid::new_v4().simple().to_string()[..5]));
        }
        if metadata.uid.as_deref().unwrap_or_default().is_empty() {
            metadata.uid = Some(Uuid::new_v4().to_string());
        }
        metadata.creation_timestamp.get_or_insert_with(|| Time(Utc::now()));
        metadata.resource_version = Some("1".to_string());

        state.objects.push(StoredObject {
            resource: created.clone(),
            visible_after: 0,
        });
        Ok(created)
    }

    async fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> ClusterResult<Resource> {
        let mut state = self.state.lock();
        let path = ApiPath::object(kind, namespace, name);
        let index = state.record("GET", path.clone());

        if kind == ResourceKind::Pod {
            let key = (namespace.to_string(), name.to_string());
            if let Some(script) = state.pod_snapshots.get_mut(&key) {
                let snapshot = if script.len() > 1 {
                    script.pop_front().flatten()
                } else {
                    script.front().cloned().flatten()
                };
                return snapshot
                    .map(Resource::Pod)
                    .ok_or(ClusterError::NotFound { path });
            }
        }

        let found = state
            .visible(index)
            .find(|r| matches(r, kind, namespace) && r.name() == name)
            .cloned();
        found.ok_or(ClusterError::NotFound { path })
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> ClusterResult<Vec<Resource>> {
        let mut state = self.state.lock();
        let index = state.record("GET", ApiPath::list(kind, namespace, selector));

        let found: Vec<Resource> = state
            .visible(index)
            .filter(|r| matches(r, kind, namespace))
            .filter(|r| selector.map_or(true, |s| s.matches(r.metadata().labels.as_ref())))
            .cloned()
            .collect();
        Ok(found)
    }

    async fn open_log_stream(&self, request: &LogRequest) -> ClusterResult<LogStream> {
        let mut state = self.state.lock();
        let path = ApiPath::log(request);
        let index = state.record("GET", path.clone());

        let key = (
            request.namespace.clone(),
            request.pod.clone(),
            request.container.clone(),
        );
        if let Some(script) = state.logs.get(&key) {
            return Ok(script.clone().into_stream());
        }

        // An unscripted container of a known Pod has an empty log
        let pod_known = state
            .visible(index)
            .any(|r| matches(r, ResourceKind::Pod, &request.namespace) && r.name() == request.pod);
        if pod_known {
            Ok(stream::empty().boxed())
        } else {
            Err(ClusterError::NotFound { path })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::fixtures;

    #[tokio::test]
    async fn test_objects_hidden_until_visible() {
        let cluster = InMemoryCluster::new();
        cluster.insert_visible_after(fixtures::pod("late-pod", "test", "testTaskRun", &["c"]), 2);

        for expected in [0, 0, 1] {
            let pods = cluster.list(ResourceKind::Pod, "test", None).await.unwrap();
            assert_eq!(pods.len(), expected);
        }
        assert_eq!(cluster.request_count(), 3);
    }

    #[tokio::test]
    async fn test_get_respects_visibility() {
        let cluster = InMemoryCluster::new();
        cluster.insert_visible_after(fixtures::pipeline("build", "test", &["compile"], &[]), 1);

        let hidden = cluster.get(ResourceKind::Pipeline, "test", "build").await;
        assert!(hidden.unwrap_err().is_not_found());
        let visible = cluster.get(ResourceKind::Pipeline, "test", "build").await.unwrap();
        assert_eq!(visible.name(), "build");
    }

    #[tokio::test]
    async fn test_scripted_pod_snapshots_repeat_last() {
        let cluster = InMemoryCluster::new();
        let pod = fixtures::pod("hello-world-pod", "test", "testTaskRun", &["c"]);
        cluster.script_pod(
            "test",
            "hello-world-pod",
            vec![Some(pod.clone()), Some(fixtures::with_container_running(pod, "c"))],
        );

        for _ in 0..3 {
            cluster.get(ResourceKind::Pod, "test", "hello-world-pod").await.unwrap();
        }
        let last = cluster
            .get(ResourceKind::Pod, "test", "hello-world-pod")
            .await
            .unwrap();
        assert!(last
            .as_pod()
            .and_then(|p| p.status.as_ref())
            .and_then(|s| s.container_statuses.as_ref())
            .is_some());
        assert_eq!(
            cluster.paths()[0],
            "/api/v1/namespaces/test/pods/hello-world-pod"
        );
    }

    #[tokio::test]
    async fn test_create_assigns_identity_and_records_post() {
        let cluster = InMemoryCluster::new();
        let mut run = crate::resources::PipelineRun::default();
        run.metadata.generate_name = Some("release-".to_string());

        let created = cluster.create("test", &Resource::PipelineRun(run)).await.unwrap();

        assert!(created.name().starts_with("release-"));
        assert!(!created.uid().is_empty());
        assert!(created.creation_timestamp().is_some());
        assert_eq!(
            cluster.requests(),
            vec![RecordedRequest::new(
                "POST",
                "/apis/tekton.dev/v1beta1/namespaces/test/pipelineruns"
            )]
        );
    }
}
