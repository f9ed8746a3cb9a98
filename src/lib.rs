#![allow(clippy::doc_markdown)] // Allow technical terms like PipelineRun, TaskRun in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tekton Run Core
//!
//! Submits Tekton `Task`, `Pipeline`, `TaskRun` and `PipelineRun` objects to a
//! Kubernetes cluster and follows their execution, streaming container logs back
//! into a job's output as they are produced.
//!
//! ## Overview
//!
//! Tekton's controller creates the objects that actually run work asynchronously:
//! a `PipelineRun` spawns one `TaskRun` per pipeline task, and each `TaskRun` spawns
//! a Pod whose containers are the task's steps. None of them exist at the moment the
//! root object is created. This crate correlates the chain by polling:
//!
//! 1. **Submit** the root object and keep the server's copy (UID, generated name)
//! 2. **Resolve** TaskRuns by label selector and Pods by owner-reference scan
//! 3. **Wait** for each container to start
//! 4. **Stream** its log live into the job output
//! 5. **Decide** one pass/fail/aborted outcome for the whole run
//!
//! ## Module Organization
//!
//! - [`resources`] - Typed Tekton and Pod objects, manifest loading
//! - [`cluster`] - The `ClusterClient` seam and its HTTP implementation
//! - [`orchestration`] - Resolver, poller, log streamer and the run orchestrator
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured diagnostics
//! - [`test_helpers`] - In-memory cluster and fixtures for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tekton_run::cluster::HttpClusterClient;
//! use tekton_run::config::TektonRunConfig;
//! use tekton_run::orchestration::{RunOrchestrator, WriterSink};
//! use tekton_run::resources::ManifestInput;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TektonRunConfig::load(None)?;
//! let client = Arc::new(HttpClusterClient::new(&config.cluster)?);
//! let orchestrator = RunOrchestrator::new(client, config);
//!
//! let report = orchestrator
//!     .submit_and_run(
//!         &ManifestInput::File("pipeline-run.yaml".into()),
//!         None,
//!         Arc::new(WriterSink::stdout()),
//!     )
//!     .await?;
//! println!("run {} {}", report.root, report.outcome);
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod resources;
pub mod test_helpers;

pub use cluster::{ClusterClient, ClusterError, HttpClusterClient, LogRequest};
pub use config::{ClusterConfig, ConfigurationError, PollingConfig, StreamingConfig, TektonRunConfig};
pub use error::{TektonError, TektonResult};
pub use orchestration::{
    JobOutputSink, RunCancellation, RunOrchestrator, RunOutcome, RunReport, RunState,
    SubmittedResource,
};
pub use resources::{ManifestInput, Resource, ResourceKind, ResourceRef};
