//! REST paths and label selectors.
//!
//! These are pure functions of their inputs and define the wire format shared by
//! the HTTP client and the in-memory cluster's request log.

use super::LogRequest;
use crate::constants::tekton;
use crate::resources::ResourceKind;
use std::collections::BTreeMap;
use std::fmt;
use url::form_urlencoded;

/// Equality-based label selector, `key=value` terms joined by `,` in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSelector {
    terms: Vec<(String, String)>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.push((key.into(), value.into()));
        self
    }

    pub fn terms(&self) -> &[(String, String)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether every term is present with the same value
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.terms.iter().all(|(key, value)| {
            labels
                .and_then(|labels| labels.get(key))
                .is_some_and(|actual| actual == value)
        })
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Selector for the TaskRun Tekton creates for `task_name` within `pipeline_run_name`
pub fn pipeline_task_selector(task_name: &str, pipeline_run_name: &str) -> LabelSelector {
    LabelSelector::new()
        .with(tekton::LABEL_PIPELINE_TASK, task_name)
        .with(tekton::LABEL_PIPELINE_RUN, pipeline_run_name)
}

fn escape(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// `labelSelector=<escaped selector>`
pub fn label_selector_query(selector: &LabelSelector) -> String {
    format!("labelSelector={}", escape(&selector.to_string()))
}

/// Builders for API server paths
pub struct ApiPath;

impl ApiPath {
    /// `/apis/tekton.dev/v1beta1/namespaces/<ns>/<plural>` or `/api/v1/namespaces/<ns>/pods`
    pub fn collection(kind: ResourceKind, namespace: &str) -> String {
        if kind.is_tekton() {
            format!(
                "/apis/{}/namespaces/{namespace}/{}",
                tekton::GROUP_VERSION,
                kind.plural()
            )
        } else {
            format!(
                "/api/{}/namespaces/{namespace}/{}",
                kind.api_version(),
                kind.plural()
            )
        }
    }

    pub fn object(kind: ResourceKind, namespace: &str, name: &str) -> String {
        format!("{}/{name}", Self::collection(kind, namespace))
    }

    pub fn list(kind: ResourceKind, namespace: &str, selector: Option<&LabelSelector>) -> String {
        let collection = Self::collection(kind, namespace);
        match selector {
            Some(selector) if !selector.is_empty() => {
                format!("{collection}?{}", label_selector_query(selector))
            }
            _ => collection,
        }
    }

    /// `/api/v1/namespaces/<ns>/pods/<pod>/log?pretty=<b>&container=<c>&follow=<b>`
    pub fn log(request: &LogRequest) -> String {
        format!(
            "{}/log?pretty={}&container={}&follow={}",
            Self::object(ResourceKind::Pod, &request.namespace, &request.pod),
            request.pretty,
            escape(&request.container),
            request.follow
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pipeline_task_selector_wire_format() {
        let selector = pipeline_task_selector("pipelineTaskName", "release");
        assert_eq!(
            selector.to_string(),
            "tekton.dev/pipelineTask=pipelineTaskName,tekton.dev/pipelineRun=release"
        );
        assert_eq!(
            label_selector_query(&selector),
            "labelSelector=tekton.dev%2FpipelineTask%3DpipelineTaskName%2Ctekton.dev%2FpipelineRun%3Drelease"
        );
    }

    #[test]
    fn test_collection_paths() {
        assert_eq!(
            ApiPath::collection(ResourceKind::Task, "test"),
            "/apis/tekton.dev/v1beta1/namespaces/test/tasks"
        );
        assert_eq!(
            ApiPath::collection(ResourceKind::PipelineRun, "test"),
            "/apis/tekton.dev/v1beta1/namespaces/test/pipelineruns"
        );
        assert_eq!(
            ApiPath::collection(ResourceKind::Pod, "test"),
            "/api/v1/namespaces/test/pods"
        );
        assert_eq!(
            ApiPath::object(ResourceKind::Pod, "test", "hello-world-pod"),
            "/api/v1/namespaces/test/pods/hello-world-pod"
        );
    }

    #[test]
    fn test_list_path_with_selector() {
        let selector = pipeline_task_selector("pipelineTaskName", "release");
        assert_eq!(
            ApiPath::list(ResourceKind::TaskRun, "test", Some(&selector)),
            "/apis/tekton.dev/v1beta1/namespaces/test/taskruns?labelSelector=tekton.dev%2FpipelineTask%3DpipelineTaskName%2Ctekton.dev%2FpipelineRun%3Drelease"
        );
        assert_eq!(
            ApiPath::list(ResourceKind::Pod, "test", Some(&LabelSelector::new())),
            "/api/v1/namespaces/test/pods"
        );
    }

    #[test]
    fn test_log_path() {
        let request = LogRequest::follow("test", "hello-world-pod", "hello-world-container");
        assert_eq!(
            ApiPath::log(&request),
            "/api/v1/namespaces/test/pods/hello-world-pod/log?pretty=false&container=hello-world-container&follow=true"
        );
    }

    #[test]
    fn test_selector_matches_labels() {
        let selector = pipeline_task_selector("build", "release");
        let mut labels = BTreeMap::new();
        labels.insert("tekton.dev/pipelineTask".to_string(), "build".to_string());
        assert!(!selector.matches(Some(&labels)));

        labels.insert("tekton.dev/pipelineRun".to_string(), "release".to_string());
        labels.insert("app".to_string(), "other".to_string());
        assert!(selector.matches(Some(&labels)));
        assert!(!selector.matches(None));
        assert!(LabelSelector::new().matches(None));
    }

    proptest! {
        /// Property: selector construction is pure and the escaped form decodes back
        #[test]
        fn selector_escaping_round_trips(task in "[a-zA-Z0-9-]{1,20}", run in "[a-z0-9.-]{1,30}") {
            let selector = pipeline_task_selector(&task, &run);
            prop_assert_eq!(&selector, &pipeline_task_selector(&task, &run));

            let expected = format!("tekton.dev/pipelineTask={task},tekton.dev/pipelineRun={run}");
            prop_assert_eq!(selector.to_string(), expected.clone());

            let query = label_selector_query(&selector);
            prop_assert!(!query["labelSelector=".len()..].contains('/'));
            prop_assert!(!query["labelSelector=".len()..].contains(','));
            let decoded: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect();
            prop_assert_eq!(decoded, vec![("labelSelector".to_string(), expected)]);
        }
    }
}
