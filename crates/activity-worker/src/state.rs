use activity_core::TaskToken;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// The worker's single in-flight task token.
///
/// Set when a claim succeeds; cleared once the outcome is reported or the
/// heartbeat daemon learns the task is gone. Every broker call that uses the
/// token is made while holding the guard, so no call is ever issued with a
/// token after it was cleared.
#[derive(Debug, Clone, Default)]
pub struct WorkerState {
    current: Arc<Mutex<Option<TaskToken>>>,
}

impl WorkerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current token
    pub async fn current_token(&self) -> Option<TaskToken> {
        self.current.lock().await.clone()
    }

    pub async fn is_idle(&self) -> bool {
        self.current.lock().await.is_none()
    }

    pub(crate) async fn set(&self, token: TaskToken) {
        let mut current = self.current.lock().await;
        debug_assert!(current.is_none(), "a task token is already in flight");
        *current = Some(token);
    }

    /// Exclusive access for a report or heartbeat about the current token
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<TaskToken>> {
        self.current.lock().await
    }
}
