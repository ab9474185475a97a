pub mod bridge;
pub mod mock;

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::{ActionType, ModerationError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Missing permissions: {0}")]
    PermissionDenied(String),

    #[error("Chat platform unavailable: {0}")]
    Unavailable(String),

    #[error("No answer within {0:?}")]
    Timeout(Duration),

    #[error("Chat platform error: {0}")]
    Unknown(String),
}

impl From<ExecutorError> for ModerationError {
    fn from(error: ExecutorError) -> Self {
        match error {
            ExecutorError::NotFound(what) => ModerationError::NotFound(what),
            ExecutorError::PermissionDenied(msg) => ModerationError::PermissionDenied(msg),
            ExecutorError::Timeout(waited) => ModerationError::Timeout(waited),
            ExecutorError::Unavailable(_) | ExecutorError::Unknown(_) => {
                ModerationError::Executor(error.to_string())
            }
        }
    }
}

/// Where and for whom an appeal case thread is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRequest {
    pub channel_id: String,
    pub user_id: String,
    pub log_id: String,
}

impl CaseRequest {
    pub fn opening_message(&self) -> String {
        format!("Appeal Case - <@{}> [Log ID: {}]", self.user_id, self.log_id)
    }

    pub fn thread_name(&self) -> String {
        format!("appeal-{}", self.user_id)
    }
}

/// Side effects on the chat platform.
///
/// Every call runs against the community passed in; the executor does not
/// pick one itself.
#[async_trait]
pub trait ActionExecutor: Send + Sync + Debug {
    async fn ban(&self, community_id: &str, user_id: &str, reason: &str)
    -> Result<(), ExecutorError>;

    async fn kick(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError>;

    async fn unban(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError>;

    async fn remove_timeout(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError>;

    /// Opens a private case thread and returns a short status line.
    async fn open_case(&self, case: &CaseRequest) -> Result<String, ExecutorError>;

    async fn notify_user(&self, user_id: &str, message: &str) -> Result<(), ExecutorError>;

    async fn resolve_username(&self, _user_id: &str) -> Result<Option<String>, ExecutorError> {
        Ok(None)
    }

    /// Runs the platform side of a journaled action. Unkick has nothing to
    /// undo on the platform.
    async fn apply(
        &self,
        community_id: &str,
        user_id: &str,
        action: ActionType,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        match action {
            ActionType::Ban => self.ban(community_id, user_id, reason).await,
            ActionType::Kick => self.kick(community_id, user_id, reason).await,
            ActionType::Unban => self.unban(community_id, user_id, reason).await,
            ActionType::Untimeout => self.remove_timeout(community_id, user_id, reason).await,
            ActionType::Unkick => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_executor_errors_map_to_kinds() {
        let cases = [
            (ExecutorError::NotFound("Member 1".into()), ErrorKind::NotFound),
            (
                ExecutorError::PermissionDenied("ban members".into()),
                ErrorKind::PermissionDenied,
            ),
            (ExecutorError::Unknown("502".into()), ErrorKind::Executor),
            (ExecutorError::Unavailable("closed".into()), ErrorKind::Executor),
            (
                ExecutorError::Timeout(Duration::from_secs(10)),
                ErrorKind::Timeout,
            ),
        ];
        for (error, kind) in cases {
            assert_eq!(ModerationError::from(error).kind(), kind);
        }
    }

    #[test]
    fn test_case_request_texts() {
        let case = CaseRequest {
            channel_id: "100".into(),
            user_id: "42".into(),
            log_id: "7".into(),
        };
        assert_eq!(case.opening_message(), "Appeal Case - <@42> [Log ID: 7]");
        assert_eq!(case.thread_name(), "appeal-42");
    }
}
