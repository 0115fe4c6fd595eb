use crate::BrokerClient;
use activity_core::{BrokerError, Result, Task, TaskToken};
use activity_protocol::{
    ClaimTaskRequest, CompleteTaskRequest, FailTaskRequest, HeartbeatRequest, Message,
    MessageCodec, ProtocolError, StartExecutionRequest, StopExecutionRequest,
};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, error, info};

pub const DEFAULT_BROKER_ADDRESS: &str = "127.0.0.1:7480";

/// Connection settings for [`TcpBrokerClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: String,
    /// Deadline for heartbeat, report and execution calls
    pub request_timeout: Duration,
    /// Deadline for a claim. Must exceed the broker's long-poll window.
    pub claim_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            address: DEFAULT_BROKER_ADDRESS.to_string(),
            request_timeout: Duration::from_secs(5),
            claim_timeout: Duration::from_secs(65),
        }
    }
}

impl ClientConfig {
    /// Defaults with the address taken from `BROKER_ADDRESS` when set
    pub fn from_env() -> Self {
        let mut config = ClientConfig::default();
        if let Ok(address) = std::env::var("BROKER_ADDRESS") {
            config.address = address;
        }
        config
    }
}

/// Broker client speaking the framed TCP protocol, one connection per call
pub struct TcpBrokerClient {
    config: ClientConfig,
}

impl TcpBrokerClient {
    pub fn new(config: ClientConfig) -> Self {
        TcpBrokerClient { config }
    }

    pub fn from_env() -> Self {
        TcpBrokerClient::new(ClientConfig::from_env())
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Send one request and wait for its response
    async fn request(&self, message: Message, deadline: Duration) -> Result<Message> {
        match timeout(deadline, self.exchange(message)).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Transport(format!(
                "No response from {} within {:?}",
                self.config.address, deadline
            ))),
        }
    }

    async fn exchange(&self, message: Message) -> Result<Message> {
        let stream = TcpStream::connect(&self.config.address).await?;
        let mut framed = Framed::new(stream, MessageCodec);

        framed.send(message).await.map_err(protocol_error)?;

        match framed.next().await {
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(protocol_error(e)),
            None => Err(BrokerError::Transport("Connection closed by broker".to_string())),
        }
    }

    async fn request_ack(&self, message: Message, token: Option<&TaskToken>) -> Result<()> {
        let response = self.request(message, self.config.request_timeout).await?;
        expect_ack(response, token)
    }
}

fn protocol_error(err: ProtocolError) -> BrokerError {
    match err {
        ProtocolError::IoError(e) => BrokerError::Transport(e.to_string()),
        other => BrokerError::Protocol(other.to_string()),
    }
}

fn expect_ack(response: Message, token: Option<&TaskToken>) -> Result<()> {
    match response {
        Message::Ack => Ok(()),
        Message::Nack(nack) => Err(BrokerError::from_code(
            &nack.code,
            nack.message,
            token.map(TaskToken::tip),
        )),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(response: &Message) -> BrokerError {
    BrokerError::Protocol(format!("Unexpected response: {:?}", response.message_type()))
}

#[async_trait]
impl BrokerClient for TcpBrokerClient {
    async fn claim(&self, queue_id: &str, worker_name: &str) -> Result<Option<Task>> {
        let message = Message::ClaimTask(ClaimTaskRequest {
            queue_id: queue_id.to_string(),
            worker_name: worker_name.to_string(),
        });

        match self.request(message, self.config.claim_timeout).await? {
            Message::TaskAssigned(assigned) => {
                let token = TaskToken::new(assigned.token).ok_or_else(|| {
                    BrokerError::Protocol("Task assigned with an empty token".to_string())
                })?;
                info!("Received token {}", token.tip());
                Ok(Some(Task::from_claim(token, assigned.input)))
            }
            Message::NoTask => {
                debug!("No task available on {}", queue_id);
                Ok(None)
            }
            Message::Nack(nack) => Err(BrokerError::from_code(&nack.code, nack.message, None)),
            other => Err(unexpected(&other)),
        }
    }

    async fn heartbeat(&self, token: &TaskToken) -> Result<()> {
        debug!("Sending heartbeat for token {}", token.tip());
        let message = Message::Heartbeat(HeartbeatRequest {
            token: token.as_str().to_string(),
        });
        self.request_ack(message, Some(token)).await
    }

    async fn complete(&self, token: &TaskToken, output: &serde_json::Value) -> Result<()> {
        info!("Sending successful response for task {}", token.tip());
        let message = Message::CompleteTask(CompleteTaskRequest {
            token: token.as_str().to_string(),
            output: output.to_string(),
        });
        self.request_ack(message, Some(token)).await
    }

    async fn fail(&self, token: &TaskToken, cause: &str, error_kind: &str) -> Result<()> {
        error!("Sending failed response for token {}", token.tip());
        let message = Message::FailTask(FailTaskRequest {
            token: token.as_str().to_string(),
            cause: cause.to_string(),
            error: error_kind.to_string(),
        });
        self.request_ack(message, Some(token)).await
    }

    async fn start_execution(
        &self,
        workflow_id: &str,
        input: &serde_json::Value,
        name: Option<&str>,
    ) -> Result<String> {
        info!("Start execution of {}", workflow_id);
        let message = Message::StartExecution(StartExecutionRequest {
            workflow_id: workflow_id.to_string(),
            input: input.to_string(),
            name: name.map(str::to_string),
        });

        match self.request(message, self.config.request_timeout).await? {
            Message::ExecutionStarted(started) => {
                debug!("Execution id: {}", started.execution_id);
                Ok(started.execution_id)
            }
            Message::Nack(nack) => Err(BrokerError::from_code(&nack.code, nack.message, None)),
            other => Err(unexpected(&other)),
        }
    }

    async fn stop_execution(
        &self,
        execution_id: &str,
        error: Option<&str>,
        cause: Option<&str>,
    ) -> Result<()> {
        info!("Stop execution of {}", execution_id);
        let message = Message::StopExecution(StopExecutionRequest {
            execution_id: execution_id.to_string(),
            error: error.map(str::to_string),
            cause: cause.map(str::to_string),
        });
        self.request_ack(message, None).await
    }
}
