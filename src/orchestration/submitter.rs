//! Resource submission. Creation is not idempotent, so a failed create is never
//! retried here or anywhere above.

use crate::cluster::ClusterClient;
use crate::error::{TektonError, TektonResult};
use crate::resources::{Resource, ResourceKind};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct ResourceSubmitter {
    client: Arc<dyn ClusterClient>,
}

impl ResourceSubmitter {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Create `resource` in `namespace` and return the object as stored by the server
    #[instrument(skip(self, resource), fields(kind = %resource.kind(), name = %resource.name()))]
    pub async fn submit(&self, resource: &Resource, namespace: &str) -> TektonResult<Resource> {
        let kind = resource.kind();
        let name = resource.name().to_string();
        let failure = |reason: String| TektonError::SubmissionError {
            kind,
            namespace: namespace.to_string(),
            name: name.clone(),
            reason,
        };

        if !ResourceKind::SUBMITTABLE.contains(&kind) {
            return Err(failure(format!("{kind} objects are not submitted directly")));
        }
        if name.is_empty() {
            return Err(failure("manifest has neither a name nor a generateName".to_string()));
        }

        let mut body = resource.clone();
        body.metadata_mut().namespace = Some(namespace.to_string());

        let created = self.client.create(namespace, &body).await.map_err(|err| {
            warn!(error = %err, "📤 SUBMITTER: Create rejected");
            failure(err.to_string())
        })?;

        if created.kind() != kind {
            return Err(failure(format!(
                "server answered with a {} instead of a {kind}",
                created.kind()
            )));
        }

        info!(
            created_name = %created.name(),
            uid = %created.uid(),
            "📤 SUBMITTER: Created"
        );
        Ok(created)
    }
}
