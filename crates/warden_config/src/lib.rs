pub mod error;
pub mod models;
pub mod provider;

pub use error::ConfigError;
pub use models::executor::ExecutorConfig;
pub use models::logging::LoggingConfig;
pub use models::warden::{DEFAULT_API_BASE_URL, WardenConfig};
pub use provider::file::{DEFAULT_CONFIG_PATH, FileProvider, TOKEN_ENV_VAR};
pub use warden_moderation::{CorruptionPolicy, StorageConfig, StorageType};
