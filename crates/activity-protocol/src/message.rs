use serde::{Deserialize, Serialize};

/// Message types for the TCP protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    ClaimTask = 1,
    TaskAssigned = 2,
    NoTask = 3,
    Heartbeat = 4,
    CompleteTask = 5,
    FailTask = 6,
    StartExecution = 7,
    ExecutionStarted = 8,
    StopExecution = 9,
    Ack = 10,
    Nack = 11,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(MessageType::ClaimTask),
            2 => Some(MessageType::TaskAssigned),
            3 => Some(MessageType::NoTask),
            4 => Some(MessageType::Heartbeat),
            5 => Some(MessageType::CompleteTask),
            6 => Some(MessageType::FailTask),
            7 => Some(MessageType::StartExecution),
            8 => Some(MessageType::ExecutionStarted),
            9 => Some(MessageType::StopExecution),
            10 => Some(MessageType::Ack),
            11 => Some(MessageType::Nack),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Worker long-polls a queue for a task
    ClaimTask(ClaimTaskRequest),

    /// A task was handed to the claiming worker
    TaskAssigned(TaskAssignedResponse),

    /// The poll window elapsed without a task
    NoTask,

    /// Liveness report for an in-flight token
    Heartbeat(HeartbeatRequest),

    /// Successful task outcome
    CompleteTask(CompleteTaskRequest),

    /// Failed task outcome
    FailTask(FailTaskRequest),

    /// Start a workflow run
    StartExecution(StartExecutionRequest),

    /// Identifier of a started workflow run
    ExecutionStarted(ExecutionStartedResponse),

    /// Abort a workflow run
    StopExecution(StopExecutionRequest),

    /// Positive acknowledgment
    Ack,

    /// Negative acknowledgment carrying an error code
    Nack(NackResponse),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::ClaimTask(_) => MessageType::ClaimTask,
            Message::TaskAssigned(_) => MessageType::TaskAssigned,
            Message::NoTask => MessageType::NoTask,
            Message::Heartbeat(_) => MessageType::Heartbeat,
            Message::CompleteTask(_) => MessageType::CompleteTask,
            Message::FailTask(_) => MessageType::FailTask,
            Message::StartExecution(_) => MessageType::StartExecution,
            Message::ExecutionStarted(_) => MessageType::ExecutionStarted,
            Message::StopExecution(_) => MessageType::StopExecution,
            Message::Ack => MessageType::Ack,
            Message::Nack(_) => MessageType::Nack,
        }
    }

    pub fn nack(code: impl Into<String>, message: impl Into<String>) -> Self {
        Message::Nack(NackResponse {
            code: code.into(),
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimTaskRequest {
    pub queue_id: String,
    pub worker_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignedResponse {
    pub token: String,
    /// Task input as sent by the orchestrator, usually a JSON document
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteTaskRequest {
    pub token: String,
    /// JSON-encoded task output
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailTaskRequest {
    pub token: String,
    pub cause: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartExecutionRequest {
    pub workflow_id: String,
    /// JSON-encoded execution input
    pub input: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStartedResponse {
    pub execution_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopExecutionRequest {
    pub execution_id: String,
    pub error: Option<String>,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NackResponse {
    pub code: String,
    pub message: String,
}
