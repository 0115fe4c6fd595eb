use activity_core::TaskInput;
use async_trait::async_trait;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;

/// Unit of business logic executed for every claimed task.
///
/// Implementations are stateless with respect to tasks: one instance handles
/// every task the worker claims, one at a time.
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    /// JSON-serializable task output
    type Output: Serialize + Send;

    /// Error reported to the orchestrator as the task failure
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build an instance from ambient configuration
    fn create_instance() -> Self
    where
        Self: Sized;

    /// Process one task input
    async fn handle(&self, input: TaskInput) -> Result<Self::Output, Self::Error>;
}

/// Activity that returns its input unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoActivity;

#[async_trait]
impl Activity for EchoActivity {
    type Output = TaskInput;
    type Error = Infallible;

    fn create_instance() -> Self {
        EchoActivity
    }

    async fn handle(&self, input: TaskInput) -> Result<TaskInput, Infallible> {
        Ok(input)
    }
}

/// Activity that simulates long-running work, then echoes its input
#[derive(Debug, Clone, Copy)]
pub struct SleepActivity {
    duration: Duration,
}

impl SleepActivity {
    pub fn new(duration: Duration) -> Self {
        SleepActivity { duration }
    }
}

#[async_trait]
impl Activity for SleepActivity {
    type Output = TaskInput;
    type Error = Infallible;

    fn create_instance() -> Self {
        SleepActivity::new(Duration::from_millis(1000))
    }

    async fn handle(&self, input: TaskInput) -> Result<TaskInput, Infallible> {
        tokio::time::sleep(self.duration).await;
        Ok(input)
    }
}
