//! Chat platform side of the moderation system.

pub mod rest;
pub mod runtime;

use async_trait::async_trait;
use warden_moderation::{ActionExecutor, CaseRequest, ExecutorError};

pub use rest::RestExecutor;
pub use runtime::ChatRuntime;

/// Executor used when no platform connection is configured. Every platform
/// action fails as unavailable; record-only work still goes through.
#[derive(Debug, Clone)]
pub struct OfflineExecutor {
    reason: String,
}

impl OfflineExecutor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn unavailable<T>(&self) -> Result<T, ExecutorError> {
        Err(ExecutorError::Unavailable(self.reason.clone()))
    }
}

#[async_trait]
impl ActionExecutor for OfflineExecutor {
    async fn ban(
        &self,
        _community_id: &str,
        _user_id: &str,
        _reason: &str,
    ) -> Result<(), ExecutorError> {
        self.unavailable()
    }

    async fn kick(
        &self,
        _community_id: &str,
        _user_id: &str,
        _reason: &str,
    ) -> Result<(), ExecutorError> {
        self.unavailable()
    }

    async fn unban(
        &self,
        _community_id: &str,
        _user_id: &str,
        _reason: &str,
    ) -> Result<(), ExecutorError> {
        self.unavailable()
    }

    async fn remove_timeout(
        &self,
        _community_id: &str,
        _user_id: &str,
        _reason: &str,
    ) -> Result<(), ExecutorError> {
        self.unavailable()
    }

    async fn open_case(&self, _case: &CaseRequest) -> Result<String, ExecutorError> {
        self.unavailable()
    }

    async fn notify_user(&self, _user_id: &str, _message: &str) -> Result<(), ExecutorError> {
        self.unavailable()
    }
}

#[cfg(test)]
mod tests {
    use warden_moderation::ActionType;

    use super::*;

    #[tokio::test]
    async fn test_offline_only_allows_record_only_work() {
        let executor = OfflineExecutor::new("no bot token configured");
        let err = executor.unban("g", "1", "").await.unwrap_err();
        assert_eq!(
            err,
            ExecutorError::Unavailable("no bot token configured".to_string())
        );
        executor
            .apply("g", "1", ActionType::Unkick, "")
            .await
            .unwrap();
        assert_eq!(executor.resolve_username("1").await.unwrap(), None);
    }
}
