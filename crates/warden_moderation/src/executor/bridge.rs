//! Hands executor calls to the runtime that owns the chat platform client.
//!
//! Platform calls are only valid from the chat runtime, while dashboard and
//! console callers live elsewhere. The bridge runs an actor on the chat
//! runtime and callers wait for its answer for a bounded time. When the wait
//! expires the call keeps running on the chat runtime: a timeout means the
//! outcome is unknown, not that nothing happened.
//!
//! [`ActionExecutor::apply`] is the exception: it waits for the platform's
//! answer however long it takes, so a journaled action always learns whether
//! it landed. Its callers bound their own wait.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};
use tracing::{debug, warn};

use crate::{
    ActionType,
    executor::{ActionExecutor, CaseRequest, ExecutorError},
};

pub const DEFAULT_BRIDGE_TIMEOUT: Duration = Duration::from_secs(10);

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Box<dyn FnOnce(Arc<dyn ActionExecutor>) -> JobFuture + Send>;

#[derive(Debug, Clone)]
pub struct ExecutorBridge {
    sender: mpsc::Sender<Job>,
    timeout: Duration,
}

impl ExecutorBridge {
    /// Starts the actor on `handle`. Each request runs as its own task there,
    /// so a slow call does not hold up the ones behind it.
    pub fn spawn(handle: &Handle, executor: Arc<dyn ActionExecutor>, timeout: Duration) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(64);

        handle.spawn(async move {
            while let Some(job) = receiver.recv().await {
                tokio::spawn(job(Arc::clone(&executor)));
            }
            debug!(log_type = "executor", "Executor bridge closed");
        });

        Self { sender, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, ExecutorError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn ActionExecutor>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ExecutorError>> + Send + 'static,
    {
        match tokio::time::timeout(self.timeout, self.exchange(operation, call)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    log_type = "executor",
                    "{} did not answer within {:?}; it may still complete", operation, self.timeout
                );
                Err(ExecutorError::Timeout(self.timeout))
            }
        }
    }

    /// Hands `call` to the chat runtime and waits for its answer.
    async fn exchange<T, F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> Result<T, ExecutorError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn ActionExecutor>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ExecutorError>> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |executor: Arc<dyn ActionExecutor>| -> JobFuture {
            Box::pin(async move {
                let result = call(executor).await;
                if reply_tx.send(result).is_err() {
                    debug!(
                        log_type = "executor",
                        "{} finished after the caller stopped waiting", operation
                    );
                }
            })
        });

        self.sender.send(job).await.map_err(|_| {
            ExecutorError::Unavailable("the chat runtime is not running".to_string())
        })?;
        reply_rx.await.map_err(|_| {
            ExecutorError::Unavailable(format!("{} was dropped before answering", operation))
        })?
    }
}

#[async_trait]
impl ActionExecutor for ExecutorBridge {
    async fn ban(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        let (community_id, user_id, reason) = owned(community_id, user_id, reason);
        self.call("ban", move |executor| async move {
            executor.ban(&community_id, &user_id, &reason).await
        })
        .await
    }

    async fn kick(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        let (community_id, user_id, reason) = owned(community_id, user_id, reason);
        self.call("kick", move |executor| async move {
            executor.kick(&community_id, &user_id, &reason).await
        })
        .await
    }

    async fn unban(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        let (community_id, user_id, reason) = owned(community_id, user_id, reason);
        self.call("unban", move |executor| async move {
            executor.unban(&community_id, &user_id, &reason).await
        })
        .await
    }

    async fn remove_timeout(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        let (community_id, user_id, reason) = owned(community_id, user_id, reason);
        self.call("remove_timeout", move |executor| async move {
            executor
                .remove_timeout(&community_id, &user_id, &reason)
                .await
        })
        .await
    }

    async fn apply(
        &self,
        community_id: &str,
        user_id: &str,
        action: ActionType,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        let (community_id, user_id, reason) = owned(community_id, user_id, reason);
        self.exchange(action.as_str(), move |executor| async move {
            executor
                .apply(&community_id, &user_id, action, &reason)
                .await
        })
        .await
    }

    async fn open_case(&self, case: &CaseRequest) -> Result<String, ExecutorError> {
        let case = case.clone();
        self.call("open_case", move |executor| async move {
            executor.open_case(&case).await
        })
        .await
    }

    async fn notify_user(&self, user_id: &str, message: &str) -> Result<(), ExecutorError> {
        let user_id = user_id.to_string();
        let message = message.to_string();
        self.call("notify_user", move |executor| async move {
            executor.notify_user(&user_id, &message).await
        })
        .await
    }

    async fn resolve_username(&self, user_id: &str) -> Result<Option<String>, ExecutorError> {
        let user_id = user_id.to_string();
        self.call("resolve_username", move |executor| async move {
            executor.resolve_username(&user_id).await
        })
        .await
    }
}

fn owned(community_id: &str, user_id: &str, reason: &str) -> (String, String, String) {
    (
        community_id.to_string(),
        user_id.to_string(),
        reason.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::{ExecutorOperation, MockExecutor};

    #[tokio::test]
    async fn test_bridge_forwards_calls_and_errors() {
        let mock = MockExecutor::new().with_failure(
            ExecutorOperation::RemoveTimeout,
            ExecutorError::PermissionDenied("moderate members".into()),
        );
        let bridge = ExecutorBridge::spawn(
            &Handle::current(),
            Arc::new(mock.clone()),
            DEFAULT_BRIDGE_TIMEOUT,
        );

        bridge.unban("guild", "1", "appeal").await.unwrap();
        let err = bridge
            .remove_timeout("guild", "1", "appeal")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExecutorError::PermissionDenied("moderate members".into())
        );
        assert_eq!(mock.call_count(ExecutorOperation::Unban), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_times_out_but_call_still_lands() {
        let mock = MockExecutor::new().with_delay(Duration::from_secs(30));
        let bridge = ExecutorBridge::spawn(
            &Handle::current(),
            Arc::new(mock.clone()),
            Duration::from_secs(10),
        );

        let err = bridge.unban("guild", "1", "appeal").await.unwrap_err();
        assert_eq!(err, ExecutorError::Timeout(Duration::from_secs(10)));

        // the platform call was already handed over and is not cancelled
        assert_eq!(mock.call_count(ExecutorOperation::Unban), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_waits_past_the_bridge_bound() {
        let mock = MockExecutor::new().with_delay(Duration::from_secs(8));
        let bridge = ExecutorBridge::spawn(
            &Handle::current(),
            Arc::new(mock.clone()),
            Duration::from_secs(5),
        );

        bridge
            .apply("guild", "1", ActionType::Unban, "appeal")
            .await
            .unwrap();
        assert_eq!(mock.call_count(ExecutorOperation::Unban), 1);

        let err = bridge.unban("guild", "1", "again").await.unwrap_err();
        assert_eq!(err, ExecutorError::Timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_bridge_across_runtimes() {
        let chat_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let mock = MockExecutor::new().with_username("42", "moderated_user");
        let bridge = ExecutorBridge::spawn(
            chat_runtime.handle(),
            Arc::new(mock.clone()),
            DEFAULT_BRIDGE_TIMEOUT,
        );

        let dashboard_runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let name = dashboard_runtime
            .block_on(bridge.resolve_username("42"))
            .unwrap();
        assert_eq!(name.as_deref(), Some("moderated_user"));
    }

    #[test]
    fn test_stopped_runtime_reports_unavailable() {
        let chat_runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let bridge = ExecutorBridge::spawn(
            chat_runtime.handle(),
            Arc::new(MockExecutor::new()),
            DEFAULT_BRIDGE_TIMEOUT,
        );
        drop(chat_runtime);

        let dashboard_runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = dashboard_runtime
            .block_on(bridge.unban("guild", "1", ""))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Unavailable(_)));
    }
}
