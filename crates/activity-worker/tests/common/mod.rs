//! In-memory broker and activity used by the worker integration tests

#![allow(dead_code)]

use activity_client::{BrokerClient, BrokerError, Result, Task, TaskInput, TaskToken};
use activity_worker::{Activity, WorkerState};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One observed broker call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Claim,
    Heartbeat(TaskToken),
    Complete(TaskToken, Value),
    Fail {
        token: TaskToken,
        cause: String,
        error_kind: String,
    },
}

/// Broker that hands out scripted claims and records every call
#[derive(Default)]
pub struct RecordingBroker {
    claims: Mutex<VecDeque<Option<Task>>>,
    heartbeats: Mutex<VecDeque<Result<()>>>,
    completes: Mutex<VecDeque<Result<()>>>,
    fail_delay: Mutex<Option<Duration>>,
    observed: Mutex<Option<WorkerState>>,
    tokens_at_claim: Mutex<Vec<Option<TaskToken>>>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims answered in order; empty claims once the script runs out
    pub fn with_claims(self, claims: Vec<Option<Task>>) -> Self {
        *self.claims.lock() = claims.into();
        self
    }

    /// Heartbeat outcomes answered in order; `Ok` once the script runs out
    pub fn with_heartbeats(self, outcomes: Vec<Result<()>>) -> Self {
        *self.heartbeats.lock() = outcomes.into();
        self
    }

    /// Complete outcomes answered in order; `Ok` once the script runs out
    pub fn with_completes(self, outcomes: Vec<Result<()>>) -> Self {
        *self.completes.lock() = outcomes.into();
        self
    }

    /// Failure reports take `delay` and are only recorded once delivered
    pub fn with_slow_fail(self, delay: Duration) -> Self {
        *self.fail_delay.lock() = Some(delay);
        self
    }

    /// Snapshot `state`'s token whenever a claim is issued
    pub fn observe(&self, state: WorkerState) {
        *self.observed.lock() = Some(state);
    }

    pub fn tokens_at_claim(&self) -> Vec<Option<TaskToken>> {
        self.tokens_at_claim.lock().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn claims(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Claim))
            .count()
    }

    pub fn heartbeats(&self) -> Vec<TaskToken> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Heartbeat(token) => Some(token),
                _ => None,
            })
            .collect()
    }

    pub fn completes(&self) -> Vec<(TaskToken, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Complete(token, output) => Some((token, output)),
                _ => None,
            })
            .collect()
    }

    pub fn fails(&self) -> Vec<(TaskToken, String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Fail {
                    token,
                    cause,
                    error_kind,
                } => Some((token, cause, error_kind)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BrokerClient for RecordingBroker {
    async fn claim(&self, _queue_id: &str, _worker_name: &str) -> Result<Option<Task>> {
        let observed = self.observed.lock().clone();
        if let Some(state) = observed {
            let token = state.current_token().await;
            self.tokens_at_claim.lock().push(token);
        }

        self.calls.lock().push(Call::Claim);
        Ok(self.claims.lock().pop_front().flatten())
    }

    async fn heartbeat(&self, token: &TaskToken) -> Result<()> {
        self.calls.lock().push(Call::Heartbeat(token.clone()));
        self.heartbeats.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn complete(&self, token: &TaskToken, output: &Value) -> Result<()> {
        self.calls
            .lock()
            .push(Call::Complete(token.clone(), output.clone()));
        self.completes.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn fail(&self, token: &TaskToken, cause: &str, error_kind: &str) -> Result<()> {
        let delay = *self.fail_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().push(Call::Fail {
            token: token.clone(),
            cause: cause.to_string(),
            error_kind: error_kind.to_string(),
        });
        Ok(())
    }

    async fn start_execution(
        &self,
        _workflow_id: &str,
        _input: &Value,
        _name: Option<&str>,
    ) -> Result<String> {
        Err(BrokerError::Service {
            code: "Unsupported".to_string(),
            message: "not a workflow broker".to_string(),
        })
    }

    async fn stop_execution(
        &self,
        _execution_id: &str,
        _error: Option<&str>,
        _cause: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }
}

pub fn token(value: &str) -> TaskToken {
    TaskToken::new(value).unwrap()
}

pub fn task(token_value: &str, input: &str) -> Task {
    Task::from_claim(token(token_value), input.to_string())
}

pub fn timed_out(token_value: &str) -> BrokerError {
    BrokerError::TaskTimedOut {
        token_tip: token(token_value).tip().to_string(),
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValueError(pub String);

/// What the scripted activity does for one task
pub enum Step {
    Return(Value),
    Sleep(Duration, Value),
    Raise(&'static str),
    Panic(&'static str),
}

/// Activity that replays a script of steps and counts its invocations
#[derive(Default)]
pub struct ScriptedActivity {
    steps: Mutex<VecDeque<Step>>,
    invocations: Arc<AtomicUsize>,
}

impl ScriptedActivity {
    pub fn new(steps: Vec<Step>) -> Self {
        ScriptedActivity {
            steps: Mutex::new(steps.into()),
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter that stays readable after the activity moves into a worker
    pub fn invocations(&self) -> Arc<AtomicUsize> {
        self.invocations.clone()
    }
}

#[async_trait]
impl Activity for ScriptedActivity {
    type Output = Value;
    type Error = ValueError;

    fn create_instance() -> Self {
        Self::default()
    }

    async fn handle(&self, input: TaskInput) -> std::result::Result<Value, ValueError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().pop_front();

        match step {
            Some(Step::Return(output)) => Ok(output),
            Some(Step::Sleep(duration, output)) => {
                tokio::time::sleep(duration).await;
                Ok(output)
            }
            Some(Step::Raise(message)) => Err(ValueError(message.to_string())),
            Some(Step::Panic(message)) => panic!("{}", message),
            None => Ok(input.to_wire().into()),
        }
    }
}
