use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of trailing characters of a token that may appear in logs
pub const TOKEN_TIP_LEN: usize = 10;

/// Opaque handle for one claimed unit of work.
///
/// `Display` and `Debug` only ever render the tip of the token. The full value
/// is reachable through [`TaskToken::as_str`] and is meant for the wire only.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskToken(String);

impl TaskToken {
    /// Wrap a token issued by the orchestrator. Empty tokens are rejected.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(TaskToken(token))
        }
    }

    /// Full token value, for requests to the orchestrator
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last characters of the token, safe to log
    pub fn tip(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(TOKEN_TIP_LEN - 1)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl fmt::Display for TaskToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "...{}", self.tip())
    }
}

impl fmt::Debug for TaskToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskToken").field(&self.tip()).finish()
    }
}
