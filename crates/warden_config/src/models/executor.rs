use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// How long a caller waits for a platform action and its log entry.
    pub timeout_secs: u64,

    /// Upper bound for any single call handed to the chat runtime.
    pub bridge_timeout_secs: u64,

    pub resolve_timeout_ms: u64,
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            bridge_timeout_secs: 30,
            resolve_timeout_ms: 1000,
        }
    }
}
