//! # Log Streamer
//!
//! Opens one follow stream per (Pod, container) and forwards every chunk to the
//! job output in arrival order as soon as it arrives.

use tokio_util::sync::CancellationToken;
use super::sink::JobOutputSink;
use crate::cluster::{ClusterClient, ClusterError, LogRequest};
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// How a stream ended early
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    /// The transport dropped, or the stream could not be opened
    #[error("stream interrupted: {0}")]
    Interrupted(String),

    /// The Pod disappeared before the stream could be opened
    #[error("pod not found")]
    NotFound,

    #[error("cancelled")]
    Cancelled,

    /// The job output rejected a write
    #[error("output write failed: {0}")]
    Output(String),
}

/// What a stream delivered before the server closed it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    pub chunks: usize,
    pub bytes: usize,
    /// The last chunk ended a line
    pub ends_with_newline: bool,
}

#[derive(Clone)]
pub struct LogStreamer {
    client: Arc<dyn ClusterClient>,
    sink: Arc<dyn JobOutputSink>,
    cancel: CancellationToken,
}

impl LogStreamer {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        sink: Arc<dyn JobOutputSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            sink,
            cancel,
        }
    }

    /// Follow one container until the server closes the stream.
    ///
    /// On cancellation the stream is dropped immediately, which closes the
    /// underlying connection.
    #[instrument(skip(self, request), fields(pod = %request.pod, container = %request.container))]
    pub async fn stream(&self, request: &LogRequest) -> Result<StreamSummary, StreamError> {
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StreamError::Cancelled),
            result = self.client.open_log_stream(request) => result,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(ClusterError::NotFound { .. }) => return Err(StreamError::NotFound),
            Err(err) => {
                warn!(error = %err, "📜 LOG STREAMER: Failed to open log stream");
                return Err(StreamError::Interrupted(err.to_string()));
            }
        };

        let mut summary = StreamSummary::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(bytes = summary.bytes, "📜 LOG STREAMER: Cancelled, closing stream");
                    return Err(StreamError::Cancelled);
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    self.sink
                        .write(&chunk)
                        .map_err(|e| StreamError::Output(e.to_string()))?;
                    summary.chunks += 1;
                    summary.bytes += chunk.len();
                    if let Some(last) = chunk.last() {
                        summary.ends_with_newline = *last == b'\n';
                    }
                }
                Some(Err(err)) => {
                    warn!(
                        error = %err,
                        bytes = summary.bytes,
                        "📜 LOG STREAMER: Stream interrupted"
                    );
                    return Err(StreamError::Interrupted(err.to_string()));
                }
                None => {
                    debug!(
                        chunks = summary.chunks,
                        bytes = summary.bytes,
                        "📜 LOG STREAMER: Stream closed by server"
                    );
                    return Ok(summary);
                }
            }
        }
    }
}
