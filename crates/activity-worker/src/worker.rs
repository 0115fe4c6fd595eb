use crate::{Activity, HeartbeatDaemon, TerminationSignals, WorkerConfig, WorkerError, WorkerState};
use activity_client::{BrokerClient, TcpBrokerClient, Throttled};
use activity_core::{Task, TaskFailure, TaskToken};

use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

/// Shortest accepted delay between claims or heartbeats
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Worker process that claims tasks from one queue and runs an [`Activity`]
/// on them, one task at a time.
pub struct ActivityWorker<A: Activity> {
    activity: A,
    worker_name: String,
    queue_id: String,
    broker: Arc<dyn BrokerClient>,
    state: WorkerState,
    wait_sleep_time: Duration,
    heartbeat_interval: Duration,
}

impl<A: Activity> ActivityWorker<A> {
    pub fn new(
        activity: A,
        worker_name: impl Into<String>,
        queue_id: impl Into<String>,
        broker: Arc<dyn BrokerClient>,
    ) -> Self {
        let defaults = WorkerConfig::default();

        ActivityWorker {
            activity,
            worker_name: worker_name.into(),
            queue_id: queue_id.into(),
            broker,
            state: WorkerState::new(),
            wait_sleep_time: defaults.wait_sleep_duration(),
            heartbeat_interval: defaults.heartbeat_duration(),
        }
    }

    /// Worker for a fresh activity instance, talking to the broker described
    /// by `config` through the throttling retry policy
    pub fn from_config(queue_id: impl Into<String>, config: &WorkerConfig) -> Self {
        Self::with_activity(A::create_instance(), queue_id, config)
    }

    /// Like [`ActivityWorker::from_config`] with an already built activity
    pub fn with_activity(activity: A, queue_id: impl Into<String>, config: &WorkerConfig) -> Self {
        let broker = Throttled::new(
            TcpBrokerClient::new(config.client_config()),
            config.retry_policy(),
        );

        ActivityWorker::new(
            activity,
            config.resolve_worker_name(),
            queue_id,
            Arc::new(broker),
        )
        .with_timing(config.wait_sleep_duration(), config.heartbeat_duration())
    }

    /// Override the empty-claim delay and heartbeat cadence. Zero durations
    /// are raised to [`MIN_INTERVAL`].
    pub fn with_timing(mut self, wait_sleep_time: Duration, heartbeat_interval: Duration) -> Self {
        self.wait_sleep_time = wait_sleep_time.max(MIN_INTERVAL);
        self.heartbeat_interval = heartbeat_interval.max(MIN_INTERVAL);
        self
    }

    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    /// Handle on the in-flight token, shared with the running worker
    pub fn state(&self) -> WorkerState {
        self.state.clone()
    }

    /// Run until a fatal outcome, treating the process termination signals as
    /// one
    pub async fn run(self) -> Result<(), WorkerError> {
        let signals = TerminationSignals::install()?;
        self.run_until(signals.recv()).await
    }

    /// Run until a fatal outcome or until `termination` yields a signal
    /// number.
    ///
    /// The heartbeat daemon starts before the first claim. On termination the
    /// in-flight task, if any, is failed with cause `Signal <n>`.
    pub async fn run_until<F>(self, termination: F) -> Result<(), WorkerError>
    where
        F: Future<Output = i32>,
    {
        info!(
            worker = %self.worker_name,
            queue = %self.queue_id,
            "Starting ActivityWorker of {} activity",
            short_type_name::<A>()
        );

        let worker = Arc::new(self);

        let daemon = HeartbeatDaemon::new(
            worker.broker.clone(),
            worker.state.clone(),
            worker.heartbeat_interval,
        );
        let mut heartbeats = tokio::spawn(daemon.run());

        let mut tasks = tokio::spawn({
            let worker = worker.clone();
            async move { worker.process_tasks().await }
        });

        let outcome = tokio::select! {
            // activity failure or unrecoverable broker error
            joined = &mut tasks => flatten(joined),
            // the daemon only returns once liveness is lost
            joined = &mut heartbeats => match joined {
                Ok(fatal) => Err(fatal),
                Err(e) => Err(aborted("heartbeat daemon", e)),
            },
            signal = termination => {
                // stop both before reporting so nothing races the signal report
                tasks.abort();
                heartbeats.abort();
                info!("Received {} signal", signal);
                worker.report_termination(signal).await;
                Err(WorkerError::Terminated { signal })
            }
        };

        tasks.abort();
        heartbeats.abort();
        outcome
    }

    async fn process_tasks(&self) -> Result<(), WorkerError> {
        loop {
            let Some(task) = self.broker.claim(&self.queue_id, &self.worker_name).await? else {
                // long-poll elapsed empty
                tokio::time::sleep(self.wait_sleep_time).await;
                continue;
            };

            self.process(task).await?;
        }
    }

    async fn process(&self, task: Task) -> Result<(), WorkerError> {
        debug!("Pulled new task: {}", task.token.tip());
        self.state.set(task.token.clone()).await;

        let outcome = AssertUnwindSafe(self.activity.handle(task.input.clone()))
            .catch_unwind()
            .await;

        let err: Box<dyn std::error::Error + Send + Sync> = match outcome {
            Ok(Ok(output)) => match serde_json::to_value(&output) {
                Ok(output) => return self.report_success(&task, output).await,
                Err(e) => Box::new(e),
            },
            Ok(Err(e)) => {
                error!("Exception while processing task {}: {}", task.token.tip(), e);
                let failure = TaskFailure::from_error(&e);
                self.report_failure(&failure).await;
                return Err(WorkerError::Activity {
                    token_tip: task.token.tip().to_string(),
                    failure,
                    source: Box::new(e),
                });
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Activity panicked on task {}: {}", task.token.tip(), message);
                let failure = TaskFailure::new(
                    format!("Panic({:?})", message),
                    format!("Panic: {}\n{}", message, Backtrace::force_capture()),
                    "Panic",
                );
                self.report_failure(&failure).await;
                return Err(WorkerError::ActivityPanicked {
                    token_tip: task.token.tip().to_string(),
                    message,
                });
            }
        };

        error!("Output of task {} is not serializable: {}", task.token.tip(), err);
        let failure = TaskFailure::from_dyn_error("SerializationError", err.as_ref());
        self.report_failure(&failure).await;
        Err(WorkerError::Activity {
            token_tip: task.token.tip().to_string(),
            failure,
            source: err,
        })
    }

    /// Report success for the in-flight token and clear it. A task timeout
    /// at this point means the orchestrator already decided the task's fate.
    async fn report_success(&self, task: &Task, output: serde_json::Value) -> Result<(), WorkerError> {
        let mut current = self.state.lock().await;
        let Some(token) = current.clone() else {
            warn!(
                "Task {} is no longer owned by this worker, dropping its output",
                task.token.tip()
            );
            return Ok(());
        };

        match self.broker.complete(&token, &output).await {
            Ok(()) => info!(
                token = token.tip(),
                elapsed_ms = task.elapsed_ms(),
                "Task completed"
            ),
            Err(e) if e.is_timeout() => warn!(
                "Task {} timed out before its success was reported",
                token.tip()
            ),
            Err(e) => return Err(e.into()),
        }

        *current = None;
        Ok(())
    }

    /// Report failure for the in-flight token, if still owned, and clear it.
    /// The token stays set until the report returns, so a report cancelled by
    /// termination is still covered by the signal report.
    async fn report_failure(&self, failure: &TaskFailure) {
        let mut current = self.state.lock().await;
        if let Some(token) = current.clone() {
            self.send_failure(&token, failure).await;
            *current = None;
        }
    }

    async fn send_failure(&self, token: &TaskToken, failure: &TaskFailure) {
        if let Err(e) = self.broker.fail_from_failure(token, failure).await {
            error!("Failed to report failure for task {}: {}", token.tip(), e);
        }
    }

    async fn report_termination(&self, signal: i32) {
        // waits for an aborted report to drop its guard
        let mut current = self.state.lock().await;
        if let Some(token) = current.clone() {
            let cause = format!("Signal {}", signal);
            if let Err(e) = self.broker.fail(&token, &cause, "Process terminated").await {
                error!("Failed to report termination of task {}: {}", token.tip(), e);
            }
            *current = None;
        }
    }
}

fn flatten(joined: Result<Result<(), WorkerError>, JoinError>) -> Result<(), WorkerError> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(aborted("worker loop", e)),
    }
}

fn aborted(what: &str, err: JoinError) -> WorkerError {
    if err.is_panic() {
        WorkerError::Aborted(format!("{} panicked", what))
    } else {
        WorkerError::Aborted(format!("{} was cancelled", what))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
