use std::{
    io,
    sync::{Arc, mpsc as std_mpsc},
    thread::{self, JoinHandle},
    time::Duration,
};

use tokio::{runtime::Handle, sync::oneshot};
use tracing::{debug, info, warn};
use warden_moderation::{ActionExecutor, ExecutorBridge};

/// Dedicated thread running the runtime that owns the platform client.
///
/// Platform calls are only issued from this runtime; other runtimes reach it
/// through the [`ExecutorBridge`] returned by [`ChatRuntime::start`].
#[derive(Debug)]
pub struct ChatRuntime {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ChatRuntime {
    pub fn start(
        executor: Arc<dyn ActionExecutor>,
        bridge_timeout: Duration,
    ) -> io::Result<(Self, ExecutorBridge)> {
        let (handle_tx, handle_rx) = std_mpsc::channel::<io::Result<Handle>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("warden-chat".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = handle_tx.send(Err(e));
                        return;
                    }
                };
                if handle_tx.send(Ok(runtime.handle().clone())).is_err() {
                    return;
                }
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                debug!(log_type = "executor", "Chat runtime stopped");
            })?;

        let handle = handle_rx
            .recv()
            .map_err(|_| io::Error::other("chat runtime thread exited during startup"))??;
        let bridge = ExecutorBridge::spawn(&handle, executor, bridge_timeout);
        info!(log_type = "executor", "Chat runtime started");

        Ok((
            Self {
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            },
            bridge,
        ))
    }

    /// Stops the runtime. Calls still in flight on it are dropped, so callers
    /// settle their pending actions first.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(log_type = "executor", "Chat runtime thread panicked");
        }
    }
}

impl Drop for ChatRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use warden_moderation::{MockExecutor, executor::mock::ExecutorOperation};

    use super::*;

    #[test]
    fn test_calls_from_another_runtime_reach_the_executor() {
        let mock = MockExecutor::new();
        let (chat, bridge) =
            ChatRuntime::start(Arc::new(mock.clone()), Duration::from_secs(5)).unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime
            .block_on(bridge.unban("guild", "7", "Appeal accepted"))
            .unwrap();
        assert_eq!(mock.call_count(ExecutorOperation::Unban), 1);

        chat.shutdown();
        let err = runtime
            .block_on(bridge.unban("guild", "7", "again"))
            .unwrap_err();
        assert!(matches!(err, warden_moderation::ExecutorError::Unavailable(_)));
    }
}
