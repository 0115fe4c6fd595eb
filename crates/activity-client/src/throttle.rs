//! Throttling-aware retry around any [`BrokerClient`].

use crate::BrokerClient;
use activity_core::{BrokerError, Result, Task, TaskFailure, TaskToken};

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for broker calls.
///
/// Throttling is expected to be transient, so by default it is retried
/// practically forever. Transport failures get a small bounded budget.
/// Task timeouts and service errors are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries of a throttled call
    pub max_retries: u32,
    /// Cap on a single backoff sleep
    pub max_sleep: Duration,
    /// Backoff multiplier: the n-th retry waits `multiplier_ms * 2^n` ms
    pub multiplier_ms: u64,
    /// Upper bound of the random jitter added to each sleep
    pub max_jitter_ms: u64,
    /// Maximum retries of a call that failed in transport
    pub transport_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 1_000_000,
            max_sleep: Duration::from_secs(120),
            multiplier_ms: 2,
            max_jitter_ms: 2,
            transport_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let max_ms = self.max_sleep.as_millis().min(u64::MAX as u128) as u64;
        let delay_ms = 2u64
            .checked_pow(attempt)
            .and_then(|exp| exp.checked_mul(self.multiplier_ms))
            .unwrap_or(u64::MAX)
            .min(max_ms);
        Duration::from_millis(delay_ms)
    }

    /// Backoff plus uniform jitter in `[0, max_jitter_ms]`
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0..=self.max_jitter_ms);
        self.backoff(attempt) + Duration::from_millis(jitter)
    }

    /// Whether a call that failed with `err` may be retried, given how many
    /// retries of each class were already spent
    pub fn should_retry(&self, err: &BrokerError, throttled: u32, transport: u32) -> bool {
        match err {
            BrokerError::Throttled(_) => throttled < self.max_retries,
            BrokerError::Transport(_) => transport < self.transport_retries,
            _ => false,
        }
    }
}

/// [`BrokerClient`] decorator applying a [`RetryPolicy`] to every call
pub struct Throttled<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: BrokerClient> Throttled<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Throttled { inner, policy }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let mut throttled = 0u32;
        let mut transport = 0u32;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.policy.should_retry(&err, throttled, transport) {
                return Err(err);
            }

            // throttling and transport failures draw on separate budgets
            let attempt = if err.is_throttling() {
                throttled += 1;
                throttled
            } else {
                transport += 1;
                warn!("{} failed in transport (retry {}): {}", operation, transport, err);
                transport
            };

            let delay = self.policy.delay(attempt);
            debug!("Retrying {} in {:?} after: {}", operation, delay, err);
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl<B: BrokerClient> BrokerClient for Throttled<B> {
    async fn claim(&self, queue_id: &str, worker_name: &str) -> Result<Option<Task>> {
        self.with_retry("claim", || self.inner.claim(queue_id, worker_name))
            .await
    }

    async fn heartbeat(&self, token: &TaskToken) -> Result<()> {
        self.with_retry("heartbeat", || self.inner.heartbeat(token)).await
    }

    async fn complete(&self, token: &TaskToken, output: &serde_json::Value) -> Result<()> {
        self.with_retry("complete", || self.inner.complete(token, output))
            .await
    }

    async fn fail(&self, token: &TaskToken, cause: &str, error_kind: &str) -> Result<()> {
        self.with_retry("fail", || self.inner.fail(token, cause, error_kind))
            .await
    }

    async fn fail_from_failure(&self, token: &TaskToken, failure: &TaskFailure) -> Result<()> {
        self.with_retry("fail", || self.inner.fail_from_failure(token, failure))
            .await
    }

    async fn start_execution(
        &self,
        workflow_id: &str,
        input: &serde_json::Value,
        name: Option<&str>,
    ) -> Result<String> {
        self.with_retry("start_execution", || {
            self.inner.start_execution(workflow_id, input, name)
        })
        .await
    }

    async fn stop_execution(
        &self,
        execution_id: &str,
        error: Option<&str>,
        cause: Option<&str>,
    ) -> Result<()> {
        self.with_retry("stop_execution", || {
            self.inner.stop_execution(execution_id, error, cause)
        })
        .await
    }
}
