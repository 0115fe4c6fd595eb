use activity_core::{BrokerError, TaskFailure};
use thiserror::Error;

/// Fatal outcome of a running worker. Every variant means the process must
/// exit; [`WorkerError::exit_code`] gives the status to exit with.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Activity failed on task {token_tip}: {source}")]
    Activity {
        token_tip: String,
        failure: TaskFailure,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Activity panicked on task {token_tip}: {message}")]
    ActivityPanicked { token_tip: String, message: String },

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Heartbeat for task {token_tip} timed out, the task is no longer owned by this worker")]
    HeartbeatTimedOut { token_tip: String },

    #[error("Heartbeat for task {token_tip} failed: {source}")]
    HeartbeatFailed {
        token_tip: String,
        #[source]
        source: BrokerError,
    },

    #[error("Terminated by signal {signal}")]
    Terminated { signal: i32 },

    #[error("Failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),

    #[error("Worker task stopped unexpectedly: {0}")]
    Aborted(String),
}

impl WorkerError {
    /// Process exit status for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::Terminated { signal } => 128 + signal,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(WorkerError::Terminated { signal: 2 }.exit_code(), 130);
        assert_eq!(WorkerError::Terminated { signal: 15 }.exit_code(), 143);
        assert_eq!(
            WorkerError::HeartbeatTimedOut {
                token_tip: "token 1".to_string()
            }
            .exit_code(),
            1
        );
        assert_eq!(
            WorkerError::Broker(BrokerError::Transport("reset".to_string())).exit_code(),
            1
        );
    }

    #[test]
    fn test_activity_error_message() {
        let source = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad header");
        let err = WorkerError::Activity {
            token_tip: "0123456789".to_string(),
            failure: TaskFailure::from_error(&source),
            source: Box::new(source),
        };
        assert_eq!(err.to_string(), "Activity failed on task 0123456789: bad header");
    }
}
