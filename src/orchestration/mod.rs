//! # Run Orchestration
//!
//! The correlation, polling and streaming engine.
//!
//! ## Core Components
//!
//! - **ResourceSubmitter**: creates the root object, never retried
//! - **OwnerChainResolver**: PipelineRun → TaskRun by label selector, TaskRun → Pod by owner scan
//! - **ReadinessPoller**: fixed-interval re-fetch until a predicate holds, cancellable
//! - **LogStreamer**: follows one container log and forwards it to the job output
//! - **RunOrchestrator**: composes the above and decides the outcome of a run
//!
//! Supporting types track one run: [`RunStateMachine`] for the lifecycle and
//! [`RunGraph`] for everything observed along the owner chain.

pub mod log_streamer;
pub mod orchestrator;
pub mod poller;
pub mod resolver;
pub mod run_graph;
pub mod sink;
pub mod state;
pub mod submitter;

pub use log_streamer::{LogStreamer, StreamError, StreamSummary};
pub use orchestrator::{RunCancellation, RunOrchestrator, RunOutcome, RunReport, SubmittedResource};
pub use poller::{Observation, PollError, PollPolicy, ReadinessPoller};
pub use resolver::OwnerChainResolver;
pub use run_graph::{ContainerLogState, ContainerPhase, PodNode, RunGraph, TaskRunNode};
pub use sink::{CapturingSink, JobOutputSink, WriterSink};
pub use state::{RunState, RunStateMachine, RunTransition};
pub use submitter::ResourceSubmitter;
