//! # Owner-Chain Resolver
//!
//! Discovers the children a submitted run produces. Every call is a plain read
//! against the cluster, so the orchestrator can re-invoke it under the readiness
//! poller until the children appear.
//!
//! Two strategies, chosen by child kind:
//!
//! - **PipelineRun → TaskRun**: server-side label selector
//!   `tekton.dev/pipelineTask=<task>,tekton.dev/pipelineRun=<run>`, then the owner
//!   UID is checked client-side so a same-named run from an earlier submission is
//!   never picked up.
//! - **TaskRun → Pod**: list every Pod in the namespace and keep those with an owner
//!   reference of kind `TaskRun` and the TaskRun's name. There is no selector for
//!   this edge and UID propagation is not guaranteed, so matching is by name.
//!
//! When several children match, the most recently created comes first.

use crate::cluster::{pipeline_task_selector, ClusterClient, ClusterError};
use crate::error::{TektonError, TektonResult};
use crate::resources::{ExpectedTask, PipelineRun, Resource, ResourceKind, ResourceRef};
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct OwnerChainResolver {
    client: Arc<dyn ClusterClient>,
}

impl std::fmt::Debug for OwnerChainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerChainResolver").finish_non_exhaustive()
    }
}

impl OwnerChainResolver {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// TaskRuns created for `task_name` of `pipeline_run`. Empty means "not yet created".
    #[instrument(skip(self, pipeline_run), fields(pipeline_run = %pipeline_run.name))]
    pub async fn task_runs_for_pipeline_task(
        &self,
        pipeline_run: &ResourceRef,
        task_name: &str,
    ) -> Result<Vec<ResourceRef>, ClusterError> {
        let selector = pipeline_task_selector(task_name, &pipeline_run.name);
        let candidates = self
            .client
            .list(ResourceKind::TaskRun, &pipeline_run.namespace, Some(&selector))
            .await?;
        let total = candidates.len();

        let owned: Vec<Resource> = candidates
            .into_iter()
            .filter(|task_run| {
                // Without a root UID there is nothing to check against
                !pipeline_run.has_uid()
                    || task_run
                        .owner_links(&pipeline_run.namespace)
                        .iter()
                        .any(|link| link.is_owned_by(pipeline_run))
            })
            .collect();

        debug!(
            task_name = %task_name,
            candidates = total,
            owned = owned.len(),
            "Resolved TaskRuns by label selector"
        );
        Ok(most_recent_first(owned, &pipeline_run.namespace))
    }

    /// Pods owned by `task_run`, matched client-side on owner kind and name
    #[instrument(skip(self, task_run), fields(task_run = %task_run.name))]
    pub async fn pods_for_task_run(
        &self,
        task_run: &ResourceRef,
    ) -> Result<Vec<ResourceRef>, ClusterError> {
        let pods = self
            .client
            .list(ResourceKind::Pod, &task_run.namespace, None)
            .await?;
        let total = pods.len();

        let owned: Vec<Resource> = pods
            .into_iter()
            .filter(|pod| {
                pod.owner_references().iter().any(|owner| {
                    owner.kind == ResourceKind::TaskRun.as_str() && owner.name == task_run.name
                })
            })
            .collect();

        debug!(
            scanned = total,
            owned = owned.len(),
            "Resolved Pods by owner reference scan"
        );
        Ok(most_recent_first(owned, &task_run.namespace))
    }

    /// Pipeline tasks the run will execute, `tasks` then `finally`, with their ordering.
    ///
    /// A run with an inline `pipelineSpec` is answered without a cluster call; a run
    /// using `pipelineRef` costs one GET of the referenced Pipeline.
    pub async fn expected_tasks(
        &self,
        pipeline_run: &PipelineRun,
        namespace: &str,
    ) -> TektonResult<Vec<ExpectedTask>> {
        if let Some(tasks) = pipeline_run.embedded_tasks() {
            return Ok(tasks);
        }
        let Some(pipeline_name) = pipeline_run.pipeline_ref_name() else {
            return Ok(Vec::new());
        };

        let pipeline = self
            .client
            .get(ResourceKind::Pipeline, namespace, pipeline_name)
            .await
            .map_err(|err| match err {
                ClusterError::NotFound { .. } => TektonError::NotFound {
                    kind: ResourceKind::Pipeline,
                    namespace: namespace.to_string(),
                    name: pipeline_name.to_string(),
                },
                other => other.into(),
            })?;

        Ok(pipeline
            .as_pipeline()
            .and_then(|p| p.spec.as_ref())
            .map(|spec| spec.expected_tasks())
            .unwrap_or_default())
    }
}

/// Newest first; objects without a creation timestamp sort last, ties keep list order
fn most_recent_first(mut resources: Vec<Resource>, namespace: &str) -> Vec<ResourceRef> {
    resources.sort_by(|a, b| b.creation_timestamp().cmp(&a.creation_timestamp()));
    resources.iter().map(|r| r.to_ref(namespace)).collect()
}
