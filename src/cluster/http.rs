//! # HTTP Cluster Client
//!
//! [`ClusterClient`] over the Kubernetes REST API using `reqwest`. Authentication is
//! a bearer token; TLS trust comes from an optional CA bundle.

use super::paths::{ApiPath, LabelSelector};
use super::{ClusterClient, ClusterError, ClusterResult, LogRequest, LogStream};
use crate::config::ClusterConfig;
use crate::resources::{Resource, ResourceKind};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Kubernetes API client bound to one cluster configuration
#[derive(Debug, Clone)]
pub struct HttpClusterClient {
    client: Client,
    server_url: String,
    request_timeout: Duration,
}

impl HttpClusterClient {
    /// Build a client from an explicit cluster configuration
    pub fn new(config: &ClusterConfig) -> ClusterResult<Self> {
        Url::parse(&config.server_url).map_err(|e| {
            ClusterError::InvalidRequest(format!("Invalid server_url '{}': {e}", config.server_url))
        })?;

        let mut builder = Client::builder();

        if config.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_path) = &config.ca_cert_file {
            let pem = std::fs::read(ca_path).map_err(|e| {
                ClusterError::InvalidRequest(format!(
                    "Failed to read CA bundle {}: {e}",
                    ca_path.display()
                ))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ClusterError::InvalidRequest(format!("Invalid CA bundle: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }

        if let Some(token) = config.bearer_token().map_err(ClusterError::InvalidRequest)? {
            let mut default_headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ClusterError::InvalidRequest(format!("Invalid bearer token: {e}")))?;
            default_headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(default_headers);
        }

        let client = builder
            .build()
            .map_err(|e| ClusterError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    fn url(&self, path: &str) -> ClusterResult<Url> {
        Url::parse(&format!("{}{path}", self.server_url))
            .map_err(|e| ClusterError::InvalidRequest(format!("Invalid request path {path}: {e}")))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> ClusterResult<reqwest::Response> {
        let mut request = self.client.request(method.clone(), self.url(path)?);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        debug!(method = %method, path = %path, "Sending cluster request");

        let response = request
            .send()
            .await
            .map_err(|e| ClusterError::Transport(format!("{method} {path}: {e}")))?;

        Self::check_status(response, path).await
    }

    /// Map non-2xx answers onto [`ClusterError`]
    async fn check_status(
        response: reqwest::Response,
        path: &str,
    ) -> ClusterResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let err = status_error(status, path, message);
        if !err.is_not_found() {
            error!(status = %status, path = %path, error = %err, "Cluster request failed");
        }
        Err(err)
    }

    /// A follow stream stays open for the container's lifetime, so it gets no request timeout
    fn log_timeout(&self, request: &LogRequest) -> Option<Duration> {
        (!request.follow).then_some(self.request_timeout)
    }

    async fn json_body(response: reqwest::Response, path: &str) -> ClusterResult<Value> {
        response
            .json::<Value>()
            .await
            .map_err(|e| ClusterError::Decode(format!("{path}: {e}")))
    }
}

/// Error for a non-2xx answer; a 404 is always [`ClusterError::NotFound`]
fn status_error(status: StatusCode, path: &str, message: String) -> ClusterError {
    if status == StatusCode::NOT_FOUND {
        return ClusterError::NotFound {
            path: path.to_string(),
        };
    }
    ClusterError::Api {
        status: status.as_u16(),
        path: path.to_string(),
        message,
    }
}

fn decode(kind: ResourceKind, value: Value, path: &str) -> ClusterResult<Resource> {
    Resource::from_json(kind, value).map_err(|e| ClusterError::Decode(format!("{path}: {e}")))
}

/// Items of a `*List` body. The API server sends `"items": null` for an empty list.
fn decode_list(kind: ResourceKind, mut value: Value, path: &str) -> ClusterResult<Vec<Resource>> {
    let items = match value.get_mut("items").map(Value::take) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(ClusterError::Decode(format!(
                "{path}: expected 'items' array, got {other}"
            )))
        }
    };

    items
        .into_iter()
        .map(|item| decode(kind, item, path))
        .collect()
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    #[instrument(skip(self, resource), fields(kind = %resource.kind(), name = %resource.name()))]
    async fn create(&self, namespace: &str, resource: &Resource) -> ClusterResult<Resource> {
        let path = ApiPath::collection(resource.kind(), namespace);
        let body = resource
            .to_json()
            .map_err(|e| ClusterError::InvalidRequest(format!("Failed to encode manifest: {e}")))?;

        let response = self
            .send(Method::POST, &path, Some(&body), Some(self.request_timeout))
            .await?;
        let value = Self::json_body(response, &path).await?;
        decode(resource.kind(), value, &path)
    }

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Resource> {
        let path = ApiPath::object(kind, namespace, name);
        let response = self
            .send(Method::GET, &path, None, Some(self.request_timeout))
            .await?;
        let value = Self::json_body(response, &path).await?;
        decode(kind, value, &path)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> ClusterResult<Vec<Resource>> {
        let path = ApiPath::list(kind, namespace, selector);
        let response = self
            .send(Method::GET, &path, None, Some(self.request_timeout))
            .await?;
        let value = Self::json_body(response, &path).await?;
        decode_list(kind, value, &path)
    }

    #[instrument(skip(self), fields(pod = %request.pod, container = %request.container))]
    async fn open_log_stream(&self, request: &LogRequest) -> ClusterResult<LogStream> {
        let path = ApiPath::log(request);
        let timeout = self.log_timeout(request);
        let response = self.send(Method::GET, &path, None, timeout).await?;

        Ok(response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| ClusterError::Transport(e.to_string()))
            .boxed())
    }
}
