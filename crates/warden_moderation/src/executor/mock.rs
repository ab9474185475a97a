use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::executor::{ActionExecutor, CaseRequest, ExecutorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorOperation {
    Ban,
    Kick,
    Unban,
    RemoveTimeout,
    OpenCase,
    NotifyUser,
    ResolveUsername,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorCall {
    pub operation: ExecutorOperation,
    pub community_id: Option<String>,
    pub user_id: String,
    pub detail: String,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<ExecutorCall>,
    failures: HashMap<ExecutorOperation, ExecutorError>,
    usernames: HashMap<String, String>,
    delay: Option<Duration>,
}

/// Executor that records calls instead of touching a platform.
///
/// Failures can be scripted per operation; a delay makes every call sleep
/// before answering.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    state: Arc<RwLock<MockState>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(self, operation: ExecutorOperation, error: ExecutorError) -> Self {
        self.fail(operation, error);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .delay = Some(delay);
        self
    }

    pub fn with_username(self, user_id: &str, username: &str) -> Self {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .usernames
            .insert(user_id.to_string(), username.to_string());
        self
    }

    pub fn fail(&self, operation: ExecutorOperation, error: ExecutorError) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .failures
            .insert(operation, error);
    }

    pub fn succeed(&self, operation: ExecutorOperation) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .failures
            .remove(&operation);
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .clone()
    }

    pub fn call_count(&self, operation: ExecutorOperation) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    async fn record(
        &self,
        operation: ExecutorOperation,
        community_id: Option<&str>,
        user_id: &str,
        detail: &str,
    ) -> Result<(), ExecutorError> {
        let delay = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.calls.push(ExecutorCall {
                operation,
                community_id: community_id.map(str::to_string),
                user_id: user_id.to_string(),
                detail: detail.to_string(),
            });
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match state.failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ActionExecutor for MockExecutor {
    async fn ban(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorOperation::Ban, Some(community_id), user_id, reason)
            .await
    }

    async fn kick(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorOperation::Kick, Some(community_id), user_id, reason)
            .await
    }

    async fn unban(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorOperation::Unban, Some(community_id), user_id, reason)
            .await
    }

    async fn remove_timeout(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        self.record(
            ExecutorOperation::RemoveTimeout,
            Some(community_id),
            user_id,
            reason,
        )
        .await
    }

    async fn open_case(&self, case: &CaseRequest) -> Result<String, ExecutorError> {
        self.record(
            ExecutorOperation::OpenCase,
            None,
            &case.user_id,
            &case.opening_message(),
        )
        .await?;
        Ok("Thread created and user added.".to_string())
    }

    async fn notify_user(&self, user_id: &str, message: &str) -> Result<(), ExecutorError> {
        self.record(ExecutorOperation::NotifyUser, None, user_id, message)
            .await
    }

    async fn resolve_username(&self, user_id: &str) -> Result<Option<String>, ExecutorError> {
        self.record(ExecutorOperation::ResolveUsername, None, user_id, "")
            .await?;
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.usernames.get(user_id).cloned())
    }
}
