//! Storage traits and backend selection for the log and appeal stores

use std::{cmp::Ordering, fmt::Debug, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    Appeal, LogEntry, LogFilter, ModerationError, NewLogEntry,
    file::{FileAppealStorage, FileLogStorage},
    memory::{MemoryAppealStorage, MemoryLogStorage},
};

/// Append-only journal of moderation actions.
#[async_trait]
pub trait LogStorageBackend: Send + Sync + Debug {
    /// Assigns the next id, stores the entry at the head and returns it.
    async fn append(&self, entry: NewLogEntry) -> Result<LogEntry, ModerationError>;

    /// All matching entries, newest timestamp first.
    async fn list(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, ModerationError>;

    async fn get(&self, id: &str) -> Result<Option<LogEntry>, ModerationError>;
}

#[async_trait]
pub trait AppealStorageBackend: Send + Sync + Debug {
    async fn append(&self, appeal: Appeal) -> Result<(), ModerationError>;

    /// All appeals in storage order (newest first).
    async fn list(&self) -> Result<Vec<Appeal>, ModerationError>;

    /// Removes every appeal matching the pair. Returns whether anything was removed.
    async fn remove(&self, user_id: &str, log_id: &str) -> Result<bool, ModerationError>;

    async fn contains(&self, user_id: &str, log_id: &str) -> Result<bool, ModerationError> {
        Ok(self
            .list()
            .await?
            .iter()
            .any(|appeal| appeal.matches(user_id, log_id)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Memory,
    #[default]
    File,
}

/// What a file store does with data it cannot parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptionPolicy {
    /// Start over with an empty sequence; the next write replaces the file.
    #[default]
    Reset,
    /// Move the unreadable file aside, then start over with an empty sequence.
    Quarantine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub storage_type: StorageType,
    pub logs_path: PathBuf,
    pub appeals_path: PathBuf,
    pub on_corruption: CorruptionPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::File,
            logs_path: PathBuf::from("logs.json"),
            appeals_path: PathBuf::from("appeals.json"),
            on_corruption: CorruptionPolicy::Reset,
        }
    }
}

/// Handles to both stores, shared by every caller in the process.
#[derive(Clone, Debug)]
pub struct ModerationStorage {
    logs: Arc<dyn LogStorageBackend>,
    appeals: Arc<dyn AppealStorageBackend>,
}

impl ModerationStorage {
    pub async fn new(config: &StorageConfig) -> Result<Self, ModerationError> {
        match config.storage_type {
            StorageType::Memory => {
                info!(log_type = "storage", "Initializing in-memory moderation storage");
                warn!(
                    log_type = "storage",
                    "In-memory moderation storage is not persistent and will be lost on restart"
                );
                Ok(Self::memory())
            }
            StorageType::File => {
                info!(
                    log_type = "storage",
                    "Initializing file-based moderation storage (logs: {}, appeals: {})",
                    config.logs_path.display(),
                    config.appeals_path.display()
                );
                let logs = FileLogStorage::new(&config.logs_path, config.on_corruption).await?;
                let appeals =
                    FileAppealStorage::new(&config.appeals_path, config.on_corruption).await?;
                Ok(Self::from_backends(Arc::new(logs), Arc::new(appeals)))
            }
        }
    }

    pub fn memory() -> Self {
        Self::from_backends(
            Arc::new(MemoryLogStorage::new()),
            Arc::new(MemoryAppealStorage::new()),
        )
    }

    pub fn from_backends(
        logs: Arc<dyn LogStorageBackend>,
        appeals: Arc<dyn AppealStorageBackend>,
    ) -> Self {
        Self { logs, appeals }
    }

    pub fn logs(&self) -> &Arc<dyn LogStorageBackend> {
        &self.logs
    }

    pub fn appeals(&self) -> &Arc<dyn AppealStorageBackend> {
        &self.appeals
    }
}

/// `max(numeric ids) + 1`; missing or non-numeric ids are ignored.
pub fn next_log_id(entries: &[LogEntry]) -> String {
    let max_id = entries
        .iter()
        .filter_map(LogEntry::numeric_id)
        .max()
        .unwrap_or(0);
    (max_id + 1).to_string()
}

pub(crate) fn insert_log_entry(entries: &mut Vec<LogEntry>, entry: NewLogEntry) -> LogEntry {
    let entry = entry.into_entry(next_log_id(entries));
    entries.insert(0, entry.clone());
    entry
}

/// Stable sort by timestamp, newest first. Entries without a timestamp go last.
pub fn sort_newest_first(entries: &mut [LogEntry]) {
    entries.sort_by(
        |a, b| match (a.timestamp.is_empty(), b.timestamp.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => b.timestamp.cmp(&a.timestamp),
        },
    );
}

pub(crate) fn filtered_newest_first(entries: &[LogEntry], filter: &LogFilter) -> Vec<LogEntry> {
    let mut matching: Vec<LogEntry> = entries
        .iter()
        .filter(|entry| filter.matches(entry))
        .cloned()
        .collect();
    sort_newest_first(&mut matching);
    matching
}

pub(crate) fn remove_appeals(appeals: &mut Vec<Appeal>, user_id: &str, log_id: &str) -> usize {
    let before = appeals.len();
    appeals.retain(|appeal| !appeal.matches(user_id, log_id));
    before - appeals.len()
}
