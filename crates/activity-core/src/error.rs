use thiserror::Error;

/// Errors surfaced by calls to the orchestrator.
///
/// `TaskTimedOut` is the one variant callers routinely branch on: the
/// orchestrator no longer considers the token valid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Task timed out: token {token_tip} is no longer valid")]
    TaskTimedOut { token_tip: String },

    #[error("Throttled by broker: {0}")]
    Throttled(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Broker error {code}: {message}")]
    Service { code: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BrokerError {
    /// Wire error code the orchestrator uses for an invalidated token
    pub const TASK_TIMED_OUT: &'static str = "TaskTimedOut";

    /// Wire error codes that signal rate limiting
    pub const THROTTLING_CODES: [&'static str; 2] =
        ["ThrottlingException", "ProvisionedThroughputExceededException"];

    /// Map an error code returned by the orchestrator to the taxonomy
    pub fn from_code(code: &str, message: impl Into<String>, token_tip: Option<&str>) -> Self {
        let message = message.into();
        if code == Self::TASK_TIMED_OUT {
            BrokerError::TaskTimedOut {
                token_tip: token_tip.unwrap_or_default().to_string(),
            }
        } else if Self::THROTTLING_CODES.contains(&code) {
            BrokerError::Throttled(message)
        } else {
            BrokerError::Service {
                code: code.to_string(),
                message,
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BrokerError::TaskTimedOut { .. })
    }

    pub fn is_throttling(&self) -> bool {
        matches!(self, BrokerError::Throttled(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, BrokerError::Transport(_))
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(err: std::io::Error) -> Self {
        BrokerError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
