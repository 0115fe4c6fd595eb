//! Wire contract between activity workers and the orchestrator.
//!
//! Every request is answered by exactly one response frame on the same
//! connection.

mod message;
mod codec;

pub use message::{
    Message, MessageType, ClaimTaskRequest, TaskAssignedResponse, HeartbeatRequest,
    CompleteTaskRequest, FailTaskRequest, StartExecutionRequest, ExecutionStartedResponse,
    StopExecutionRequest, NackResponse,
};
pub use codec::MessageCodec;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Maximum frame size. Task input and output are capped by the orchestrator
/// well below this.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;
