//! Client side of the orchestrator task protocol.
//!
//! [`BrokerClient`] is the capability the worker depends on. [`TcpBrokerClient`]
//! implements it over the framed TCP protocol and [`Throttled`] adds the
//! throttling-aware retry policy on top of any implementation.

mod tcp;
mod throttle;

pub use tcp::{ClientConfig, TcpBrokerClient, DEFAULT_BROKER_ADDRESS};
pub use throttle::{RetryPolicy, Throttled};

pub use activity_core::{BrokerError, Result, Task, TaskFailure, TaskInput, TaskToken};

use async_trait::async_trait;

/// Operations of the orchestrator's task protocol
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Long-poll `queue_id` for a task. `Ok(None)` means the poll window
    /// elapsed without one.
    async fn claim(&self, queue_id: &str, worker_name: &str) -> Result<Option<Task>>;

    /// Report liveness for `token`. Fails with [`BrokerError::TaskTimedOut`]
    /// once the orchestrator no longer considers the token valid.
    async fn heartbeat(&self, token: &TaskToken) -> Result<()>;

    /// Report success with a JSON output
    async fn complete(&self, token: &TaskToken, output: &serde_json::Value) -> Result<()>;

    /// Report failure with a free-text cause and an error classification
    async fn fail(&self, token: &TaskToken, cause: &str, error_kind: &str) -> Result<()>;

    /// Report failure described by a captured error and its stack trace
    async fn fail_from_failure(&self, token: &TaskToken, failure: &TaskFailure) -> Result<()> {
        self.fail(token, &failure.cause(), &failure.error_kind).await
    }

    /// Heartbeat several tokens, stopping at the first error
    async fn heartbeat_many(&self, tokens: &[TaskToken]) -> Result<()> {
        for token in tokens {
            self.heartbeat(token).await?;
        }
        Ok(())
    }

    /// Start a workflow run and return its execution id
    async fn start_execution(
        &self,
        workflow_id: &str,
        input: &serde_json::Value,
        name: Option<&str>,
    ) -> Result<String>;

    /// Abort a workflow run
    async fn stop_execution(
        &self,
        execution_id: &str,
        error: Option<&str>,
        cause: Option<&str>,
    ) -> Result<()>;
}
