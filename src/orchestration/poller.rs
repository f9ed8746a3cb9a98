//! # Readiness Poller
//!
//! Fixed-interval re-fetch of a cluster object until a predicate holds. This stands
//! in for watch semantics: children of a submitted object are created
//! asynchronously by Tekton's controller, so every downstream lookup is polled.
//!
//! Outcomes are exactly one of: the satisfying snapshot, [`PollError::NotFound`]
//! (the object was observed deleted), [`PollError::Timeout`] (budget exhausted),
//! [`PollError::Cancelled`], or a propagated cluster error.

use tokio_util::sync::CancellationToken;
use crate::cluster::{ClusterError, ClusterResult};
use crate::config::PollPolicyConfig;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Poll interval and budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub max_duration: Option<Duration>,
}

impl PollPolicy {
    /// Fixed interval, bounded by attempt count
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
            max_duration: None,
        }
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.max_duration.is_some_and(|max| elapsed >= max)
    }
}

impl From<&PollPolicyConfig> for PollPolicy {
    fn from(config: &PollPolicyConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            max_attempts: config.max_attempts,
            max_duration: config.max_duration_ms.map(Duration::from_millis),
        }
    }
}

/// Result of a single fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    Present(T),
    /// The object no longer exists
    Absent,
}

impl<T> Observation<T> {
    /// Treat a 404 as an observed deletion
    pub fn from_lookup(result: ClusterResult<T>) -> ClusterResult<Self> {
        match result {
            Ok(value) => Ok(Self::Present(value)),
            Err(err) if err.is_not_found() => Ok(Self::Absent),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollError {
    #[error("budget exhausted after {attempts} attempts ({elapsed_ms}ms)")]
    Timeout { attempts: u32, elapsed_ms: u64 },

    #[error("object disappeared")]
    NotFound,

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Polls with one policy, honouring one cancellation token
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl ReadinessPoller {
    pub fn new(policy: PollPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Fetch and test until `predicate` holds. The first fetch happens immediately;
    /// later fetches are `interval` apart.
    pub async fn poll_until<T, F, Fut, P>(
        &self,
        target: &str,
        mut fetch: F,
        mut predicate: P,
    ) -> Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClusterResult<Observation<T>>>,
        P: FnMut(&T) -> bool,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            attempts += 1;
            let observation = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
                result = fetch() => result?,
            };

            match observation {
                Observation::Present(snapshot) if predicate(&snapshot) => {
                    debug!(target = %target, attempts = attempts, "Poll predicate satisfied");
                    return Ok(snapshot);
                }
                Observation::Present(_) => {
                    trace!(target = %target, attempts = attempts, "Poll predicate not yet satisfied");
                }
                Observation::Absent => {
                    debug!(target = %target, attempts = attempts, "Polled object disappeared");
                    return Err(PollError::NotFound);
                }
            }

            let elapsed = started.elapsed();
            if self.policy.exhausted(attempts, elapsed) {
                debug!(
                    target = %target,
                    attempts = attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Poll budget exhausted"
                );
                return Err(PollError::Timeout {
                    attempts,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
        }
    }
}
