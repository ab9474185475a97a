use std::fmt;

use serde::{Deserialize, Serialize};
use warden_moderation::{ModerationConfig, StorageConfig};

use super::{executor::ExecutorConfig, logging::LoggingConfig};
use crate::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Bot token for the chat platform.
    pub token: Option<String>,

    pub api_base_url: String,

    /// Community every moderation action and reversal runs against.
    pub main_community_id: String,

    pub appeal_channel_id: Option<String>,

    pub appeal_invite_link: Option<String>,

    pub storage: StorageConfig,

    pub executor: ExecutorConfig,

    pub logging: LoggingConfig,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            main_community_id: String::new(),
            appeal_channel_id: None,
            appeal_invite_link: None,
            storage: StorageConfig::default(),
            executor: ExecutorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl WardenConfig {
    pub fn moderation_config(&self) -> ModerationConfig {
        ModerationConfig {
            main_community_id: self.main_community_id.clone(),
            appeal_channel_id: self.appeal_channel_id.clone(),
            appeal_invite_link: self.appeal_invite_link.clone(),
            action_timeout: self.executor.timeout(),
            resolve_timeout: self.executor.resolve_timeout(),
        }
    }

    /// Token for talking to the platform. Only commands that touch the
    /// platform need one.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("no bot token configured".to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "executor.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.executor.bridge_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "executor.bridge_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.executor.bridge_timeout_secs < self.executor.timeout_secs {
            return Err(ConfigError::Invalid(
                "executor.bridge_timeout_secs must not be shorter than executor.timeout_secs"
                    .to_string(),
            ));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_base_url is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for WardenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WardenConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("main_community_id", &self.main_community_id)
            .field("appeal_channel_id", &self.appeal_channel_id)
            .field("appeal_invite_link", &self.appeal_invite_link)
            .field("storage", &self.storage)
            .field("executor", &self.executor)
            .field("logging", &self.logging)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_moderation_config_from_executor_settings() {
        let config = WardenConfig {
            main_community_id: "123".to_string(),
            executor: ExecutorConfig {
                timeout_secs: 5,
                bridge_timeout_secs: 20,
                resolve_timeout_ms: 250,
            },
            ..WardenConfig::default()
        };

        let moderation = config.moderation_config();
        assert_eq!(moderation.main_community_id, "123");
        assert_eq!(moderation.action_timeout, Duration::from_secs(5));
        assert_eq!(moderation.resolve_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_debug_hides_token() {
        let config = WardenConfig {
            token: Some("super-secret".to_string()),
            ..WardenConfig::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_blank_token_is_missing() {
        let config = WardenConfig {
            token: Some("  ".to_string()),
            ..WardenConfig::default()
        };
        assert!(config.require_token().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = WardenConfig::default();
        assert!(config.validate().is_ok());
        config.executor.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bridge_bound_shorter_than_action_wait_rejected() {
        let mut config = WardenConfig::default();
        config.executor.timeout_secs = 10;
        config.executor.bridge_timeout_secs = 10;
        assert!(config.validate().is_ok());

        config.executor.bridge_timeout_secs = 5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bridge_timeout_secs"));
    }
}
