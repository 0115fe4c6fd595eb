//! Background liveness reporting for the in-flight task.

use crate::worker::MIN_INTERVAL;
use crate::{WorkerError, WorkerState};
use activity_client::BrokerClient;
use activity_core::TaskFailure;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};

/// Sends a heartbeat for the current token every interval.
///
/// The daemon only returns once liveness can no longer be maintained. The
/// returned error is fatal to the whole process.
pub struct HeartbeatDaemon {
    broker: Arc<dyn BrokerClient>,
    state: WorkerState,
    interval: Duration,
}

impl HeartbeatDaemon {
    pub fn new(broker: Arc<dyn BrokerClient>, state: WorkerState, interval: Duration) -> Self {
        HeartbeatDaemon {
            broker,
            state,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Heartbeat forever, returning the fatal outcome that stopped it
    pub async fn run(self) -> WorkerError {
        debug!("Started heartbeat daemon (interval {:?})", self.interval);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Some(fatal) = self.beat().await {
                return fatal;
            }
        }
    }

    /// One heartbeat cycle. Does nothing while no task is in flight.
    pub async fn beat(&self) -> Option<WorkerError> {
        let mut current = self.state.lock().await;
        let token = current.clone()?;

        let err = match self.broker.heartbeat(&token).await {
            Ok(()) => {
                debug!(token = token.tip(), "Heartbeat sent");
                return None;
            }
            Err(err) => err,
        };

        // token already reassigned: reporting would use a dead token
        if err.is_timeout() {
            error!(
                "Timeout when sending heartbeat for {}, exiting worker now",
                token.tip()
            );
            *current = None;
            return Some(WorkerError::HeartbeatTimedOut {
                token_tip: token.tip().to_string(),
            });
        }

        error!("Exception occurred when sending heartbeat for {}: {}", token.tip(), err);
        let failure = TaskFailure::from_error(&err);
        if let Err(report_err) = self.broker.fail_from_failure(&token, &failure).await {
            error!("Failed to report failure for {}: {}", token.tip(), report_err);
        }
        *current = None;

        Some(WorkerError::HeartbeatFailed {
            token_tip: token.tip().to_string(),
            source: err,
        })
    }
}
