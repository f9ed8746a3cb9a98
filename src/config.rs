//! # Run Engine Configuration
//!
//! Explicit configuration passed into the orchestrator at construction. Nothing is
//! bound process-wide: each run context loads (or is handed) one
//! [`TektonRunConfig`] and never mutates it while a run is in flight.
//!
//! Sources are layered with the `config` crate, later sources winning:
//!
//! 1. built-in defaults ([`TektonRunConfig::default`])
//! 2. an optional TOML file
//! 3. `TEKTON_RUN__<SECTION>__<KEY>` environment variables
//!
//! ```rust,no_run
//! use tekton_run::config::TektonRunConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TektonRunConfig::load(Some(Path::new("config/tekton-run.toml")))?;
//! println!("following runs in {}", config.cluster.namespace);
//! # Ok(())
//! # }
//! ```

use crate::constants::env;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<::config::ConfigError> for ConfigurationError {
    fn from(err: ::config::ConfigError) -> Self {
        ConfigurationError::Load(err.to_string())
    }
}

impl From<ConfigurationError> for crate::error::TektonError {
    fn from(err: ConfigurationError) -> Self {
        crate::error::TektonError::ConfigurationError(err.to_string())
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TektonRunConfig {
    pub cluster: ClusterConfig,
    pub polling: PollingConfig,
    pub streaming: StreamingConfig,
}

/// How to reach and authenticate against the cluster
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub server_url: String,
    /// Bearer token; takes precedence over `token_file`
    pub token: Option<String>,
    /// File holding a bearer token, e.g. a mounted service-account token
    pub token_file: Option<PathBuf>,
    /// PEM bundle trusted for the API server certificate
    pub ca_cert_file: Option<PathBuf>,
    pub insecure_skip_tls_verify: bool,
    /// Namespace used when neither the caller nor the manifest names one
    pub namespace: String,
    /// Timeout for non-streaming requests
    pub request_timeout_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            server_url: "https://kubernetes.default.svc".to_string(),
            token: None,
            token_file: None,
            ca_cert_file: None,
            insecure_skip_tls_verify: false,
            namespace: "default".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl ClusterConfig {
    /// Resolve the bearer token from `token` or `token_file`
    pub fn bearer_token(&self) -> Result<Option<String>, String> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Some(token.clone()));
        }
        match &self.token_file {
            Some(path) => std::fs::read_to_string(path)
                .map(|contents| Some(contents.trim().to_string()))
                .map_err(|e| format!("Failed to read token file {}: {e}", path.display())),
            None => Ok(None),
        }
    }
}

/// Poll budget for one stage
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollPolicyConfig {
    pub interval_ms: u64,
    pub max_attempts: Option<u32>,
    pub max_duration_ms: Option<u64>,
}

impl Default for PollPolicyConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_attempts: Some(60),
            max_duration_ms: None,
        }
    }
}

impl PollPolicyConfig {
    fn validate(&self, stage: &str) -> ConfigResult<()> {
        if self.interval_ms == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: format!("polling.{stage}.interval_ms"),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_attempts.is_none() && self.max_duration_ms.is_none() {
            return Err(ConfigurationError::InvalidValue {
                field: format!("polling.{stage}"),
                reason: "either max_attempts or max_duration_ms must be set".to_string(),
            });
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigurationError::InvalidValue {
                field: format!("polling.{stage}.max_attempts"),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Poll budgets per orchestration stage
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Waiting for TaskRuns and Pods to appear
    pub resolution: PollPolicyConfig,
    /// Waiting for a container to start; covers image pulls
    pub readiness: PollPolicyConfig,
    /// Waiting for terminal container state and Pod phase after a stream closes
    pub termination: PollPolicyConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            resolution: PollPolicyConfig::default(),
            readiness: PollPolicyConfig {
                interval_ms: 1_000,
                max_attempts: None,
                max_duration_ms: Some(600_000),
            },
            termination: PollPolicyConfig {
                interval_ms: 1_000,
                max_attempts: Some(30),
                max_duration_ms: None,
            },
        }
    }
}

/// Log forwarding options
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Ask the API server for pretty-printed output
    pub pretty: bool,
    /// Prefix of the engine's own lines in the job output
    pub status_line_prefix: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            status_line_prefix: "[tekton]".to_string(),
        }
    }
}

impl TektonRunConfig {
    /// Layer defaults, an optional TOML file and environment overrides
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(env::CONFIG_PREFIX)
                .prefix_separator(env::CONFIG_SEPARATOR)
                .separator(env::CONFIG_SEPARATOR)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            config = %serde_json::to_string(&config.sanitized()).unwrap_or_else(|_| "[serialization error]".to_string()),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Reject configurations that would poll forever or cannot address a cluster
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cluster.server_url.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "cluster.server_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.cluster.namespace.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "cluster.namespace".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        self.polling.resolution.validate("resolution")?;
        self.polling.readiness.validate("readiness")?;
        self.polling.termination.validate("termination")?;
        Ok(())
    }

    /// Copy with secrets masked, for logging
    pub fn sanitized(&self) -> Self {
        let mut copy = self.clone();
        if copy.cluster.token.is_some() {
            copy.cluster.token = Some("***".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = TektonRunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cluster.namespace, "default");
        assert!(!config.streaming.pretty);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[cluster]
server_url = "https://cluster.example.com:6443"
namespace = "ci"
token = "secret-token"

[polling.resolution]
interval_ms = 250
max_attempts = 8
"#
        )
        .unwrap();

        let config = TektonRunConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.cluster.server_url, "https://cluster.example.com:6443");
        assert_eq!(config.cluster.namespace, "ci");
        assert_eq!(config.polling.resolution.interval_ms, 250);
        assert_eq!(config.polling.resolution.max_attempts, Some(8));
        // Untouched sections keep their defaults
        assert_eq!(config.polling.termination, PollingConfig::default().termination);
    }

    #[test]
    fn test_unbounded_polling_rejected() {
        let mut config = TektonRunConfig::default();
        config.polling.readiness.max_attempts = None;
        config.polling.readiness.max_duration_ms = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("polling.readiness"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = TektonRunConfig::default();
        config.polling.resolution.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sanitized_masks_token() {
        let mut config = TektonRunConfig::default();
        config.cluster.token = Some("secret-token".to_string());
        assert_eq!(config.sanitized().cluster.token.as_deref(), Some("***"));
        assert_eq!(config.cluster.token.as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_bearer_token_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "file-token").unwrap();

        let config = ClusterConfig {
            token_file: Some(file.path().to_path_buf()),
            ..ClusterConfig::default()
        };
        assert_eq!(config.bearer_token().unwrap().as_deref(), Some("file-token"));

        let inline = ClusterConfig {
            token: Some("inline".to_string()),
            token_file: Some(file.path().to_path_buf()),
            ..ClusterConfig::default()
        };
        assert_eq!(inline.bearer_token().unwrap().as_deref(), Some("inline"));
    }
}
