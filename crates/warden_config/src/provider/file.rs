use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::{ConfigError, WardenConfig};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const TOKEN_ENV_VAR: &str = "WARDEN_TOKEN";

/// Loads [`WardenConfig`] from a YAML file.
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file and applies environment overrides. A missing file gives
    /// the defaults; a file that does not parse is an error.
    pub fn try_load_config(&self) -> Result<WardenConfig, ConfigError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(&self, env: F) -> Result<WardenConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => {
                warn!(
                    log_type = "config",
                    "Configuration file {} is empty, using defaults",
                    self.path.display()
                );
                WardenConfig::default()
            }
            Ok(content) => {
                yaml_decoder(&content).map_err(|source| ConfigError::Parse {
                    path: self.path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    log_type = "config",
                    "Configuration file {} not found, using defaults",
                    self.path.display()
                );
                WardenConfig::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if let Some(token) = env(TOKEN_ENV_VAR).filter(|token| !token.trim().is_empty()) {
            debug!(log_type = "config", "Using bot token from {}", TOKEN_ENV_VAR);
            config.token = Some(token);
        }

        config.validate()?;
        info!(
            log_type = "config",
            "Loaded configuration from {}",
            self.path.display()
        );
        Ok(config)
    }
}

impl Default for FileProvider {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

fn yaml_decoder<T: DeserializeOwned>(content: &str) -> Result<T, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use tempfile::TempDir;
    use warden_moderation::{CorruptionPolicy, StorageType};

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let provider = FileProvider::new(temp_dir.path().join("config.yaml"));

        let config = provider.load_with_env(no_env).unwrap();
        assert_eq!(config, WardenConfig::default());
        assert_eq!(config.api_base_url, "https://discord.com/api/v10");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "main_community_id: '1100'\n\
             appeal_channel_id: '2200'\n\
             storage:\n  logs_path: data/logs.json\n  on_corruption: quarantine\n\
             executor:\n  timeout_secs: 3\n\
             logging:\n  debug: true\n  log_types:\n    storage: warn\n",
        )
        .unwrap();

        let config = FileProvider::new(&config_path)
            .load_with_env(no_env)
            .unwrap();
        assert_eq!(config.main_community_id, "1100");
        assert_eq!(config.appeal_channel_id.as_deref(), Some("2200"));
        assert_eq!(config.storage.storage_type, StorageType::File);
        assert_eq!(config.storage.logs_path, PathBuf::from("data/logs.json"));
        assert_eq!(config.storage.appeals_path, PathBuf::from("appeals.json"));
        assert_eq!(config.storage.on_corruption, CorruptionPolicy::Quarantine);
        assert_eq!(config.executor.timeout(), Duration::from_secs(3));
        assert_eq!(config.executor.resolve_timeout_ms, 1000);
        assert!(config.logging.debug);
        assert_eq!(config.logging.log_types["storage"], "warn");
    }

    #[test]
    fn test_env_token_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "token: from-file\n").unwrap();
        let provider = FileProvider::new(&config_path);

        let config = provider.load_with_env(no_env).unwrap();
        assert_eq!(config.token.as_deref(), Some("from-file"));

        let config = provider
            .load_with_env(|key| (key == TOKEN_ENV_VAR).then(|| "from-env".to_string()))
            .unwrap();
        assert_eq!(config.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_unparseable_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "storage: [not, a, map]\n").unwrap();

        let err = FileProvider::new(&config_path)
            .load_with_env(no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_storage_type_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "storage:\n  storage_type: redis\n").unwrap();

        assert!(
            FileProvider::new(&config_path)
                .load_with_env(no_env)
                .is_err()
        );
    }
}
