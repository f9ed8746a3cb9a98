//! # Test Helpers
//!
//! Shared testing infrastructure for unit and integration tests: an in-memory
//! stand-in for the Kubernetes API server and builders for the objects Tekton's
//! controller would create.

pub mod fixtures;
pub mod mock_cluster;

pub use mock_cluster::{InMemoryCluster, LogScript, RecordedRequest};
