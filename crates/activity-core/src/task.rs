use crate::TaskToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input of a claimed task.
///
/// The orchestrator ships input as a string. When it parses as JSON it is
/// handed to the activity as a value, otherwise the raw string is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskInput {
    Json(serde_json::Value),
    Raw(String),
}

impl TaskInput {
    pub fn parse(raw: String) -> Self {
        match serde_json::from_str(&raw) {
            Ok(value) => TaskInput::Json(value),
            Err(_) => TaskInput::Raw(raw),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            TaskInput::Json(value) => Some(value),
            TaskInput::Raw(_) => None,
        }
    }

    /// Render the input back to the string form used on the wire
    pub fn to_wire(&self) -> String {
        match self {
            TaskInput::Json(value) => value.to_string(),
            TaskInput::Raw(raw) => raw.clone(),
        }
    }
}

/// A unit of work produced by a successful claim
#[derive(Debug, Clone)]
pub struct Task {
    pub token: TaskToken,
    pub input: TaskInput,
    /// When this worker received the task
    pub claimed_at: DateTime<Utc>,
}

impl Task {
    pub fn new(token: TaskToken, input: TaskInput) -> Self {
        Task {
            token,
            input,
            claimed_at: Utc::now(),
        }
    }

    /// Build a task from the raw claim response fields
    pub fn from_claim(token: TaskToken, raw_input: String) -> Self {
        Task::new(token, TaskInput::parse(raw_input))
    }

    /// Time spent on the task so far, in milliseconds
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.claimed_at).num_milliseconds()
    }
}
