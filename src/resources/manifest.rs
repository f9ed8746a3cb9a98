//! Manifest input: a YAML document given inline or read from a file, decoded into
//! a typed [`Resource`].

use super::{Resource, ResourceKind};
use crate::constants;
use crate::error::{TektonError, TektonResult};
use std::path::PathBuf;
use tracing::debug;

/// Where a manifest comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestInput {
    /// Path to a YAML file, relative to the working directory
    File(PathBuf),
    /// Inline YAML text
    Yaml(String),
}

impl ManifestInput {
    /// Read the manifest text
    pub fn read(&self) -> TektonResult<String> {
        match self {
            Self::Yaml(text) => Ok(text.clone()),
            Self::File(path) => std::fs::read_to_string(path).map_err(|e| {
                TektonError::ManifestError(format!("{} ({e})", path.display()))
            }),
        }
    }

    /// Read and decode the manifest
    pub fn load(&self) -> TektonResult<Resource> {
        let text = self.read()?;
        parse_manifest(&text)
    }
}

/// Decode a single YAML document into one of the submittable kinds
pub fn parse_manifest(text: &str) -> TektonResult<Resource> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    let value = serde_json::to_value(yaml)?;

    let kind_name = value
        .get("kind")
        .and_then(|k| k.as_str())
        .ok_or_else(|| TektonError::ManifestError("manifest has no 'kind'".to_string()))?;
    let kind: ResourceKind = kind_name.parse().map_err(TektonError::ManifestError)?;
    if !ResourceKind::SUBMITTABLE.contains(&kind) {
        return Err(TektonError::ManifestError(format!(
            "{kind} cannot be submitted, expected one of Task, Pipeline, TaskRun, PipelineRun"
        )));
    }

    if let Some(api_version) = value.get("apiVersion").and_then(|v| v.as_str()) {
        if api_version != constants::tekton::GROUP_VERSION {
            return Err(TektonError::ManifestError(format!(
                "unsupported apiVersion '{api_version}', expected '{}'",
                constants::tekton::GROUP_VERSION
            )));
        }
    }

    let resource = Resource::from_json(kind, value)?;
    if resource.name().is_empty() {
        return Err(TektonError::ManifestError(format!(
            "{kind} manifest needs metadata.name or metadata.generateName"
        )));
    }

    debug!(kind = %kind, name = %resource.name(), "Parsed manifest");
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TASK_YAML: &str = "apiVersion: tekton.dev/v1beta1\nkind: Task\nmetadata:\n  name: testTask\n";

    #[test]
    fn test_parse_inline_task() {
        let resource = ManifestInput::Yaml(TASK_YAML.to_string()).load().unwrap();
        assert_eq!(resource.kind(), ResourceKind::Task);
        assert_eq!(resource.name(), "testTask");
    }

    #[test]
    fn test_parse_file_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TASK_YAML.as_bytes()).unwrap();

        let resource = ManifestInput::File(file.path().to_path_buf()).load().unwrap();
        assert_eq!(resource.name(), "testTask");
    }

    #[test]
    fn test_missing_file_is_manifest_error() {
        let err = ManifestInput::File(PathBuf::from(".tekton/does-not-exist.yaml"))
            .load()
            .unwrap_err();
        assert!(matches!(err, TektonError::ManifestError(_)));
        assert!(err.to_string().contains(".tekton/does-not-exist.yaml"));
    }

    #[test]
    fn test_parse_pipeline_run_with_embedded_spec() {
        let yaml = r#"
apiVersion: tekton.dev/v1beta1
kind: PipelineRun
metadata:
  name: release
  namespace: test
spec:
  pipelineSpec:
    tasks:
      - name: pipelineTaskName
        taskSpec:
          steps:
            - name: hello
              image: alpine
              script: echo hello
"#;
        let resource = parse_manifest(yaml).unwrap();
        let run = resource.as_pipeline_run().unwrap();
        assert_eq!(resource.namespace(), Some("test"));
        assert_eq!(
            run.embedded_task_names(),
            Some(vec!["pipelineTaskName".to_string()])
        );
    }

    #[test]
    fn test_rejects_pods_and_unknown_kinds() {
        let pod = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\n";
        assert!(matches!(
            parse_manifest(pod),
            Err(TektonError::ManifestError(_))
        ));

        let unknown = "apiVersion: tekton.dev/v1beta1\nkind: ClusterTask\nmetadata:\n  name: t\n";
        assert!(parse_manifest(unknown).is_err());
    }

    #[test]
    fn test_rejects_wrong_api_version_and_missing_name() {
        let v1 = "apiVersion: tekton.dev/v1\nkind: Task\nmetadata:\n  name: t\n";
        assert!(parse_manifest(v1).is_err());

        let nameless = "apiVersion: tekton.dev/v1beta1\nkind: Task\nmetadata: {}\n";
        assert!(parse_manifest(nameless).is_err());
    }
}
