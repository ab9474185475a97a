//! In-memory stores, for tests and throwaway deployments

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    Appeal, LogEntry, LogFilter, ModerationError, NewLogEntry,
    storage::{
        AppealStorageBackend, LogStorageBackend, filtered_newest_first, insert_log_entry,
        remove_appeals,
    },
};

#[derive(Debug, Clone, Default)]
pub struct MemoryLogStorage {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLogStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }
}

#[async_trait]
impl LogStorageBackend for MemoryLogStorage {
    async fn append(&self, entry: NewLogEntry) -> Result<LogEntry, ModerationError> {
        let mut entries = self.entries.lock().await;
        Ok(insert_log_entry(&mut entries, entry))
    }

    async fn list(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, ModerationError> {
        let entries = self.entries.lock().await;
        Ok(filtered_newest_first(&entries, filter))
    }

    async fn get(&self, id: &str) -> Result<Option<LogEntry>, ModerationError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().find(|entry| entry.id == id).cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAppealStorage {
    appeals: Arc<Mutex<Vec<Appeal>>>,
}

impl MemoryAppealStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppealStorageBackend for MemoryAppealStorage {
    async fn append(&self, appeal: Appeal) -> Result<(), ModerationError> {
        self.appeals.lock().await.insert(0, appeal);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Appeal>, ModerationError> {
        Ok(self.appeals.lock().await.clone())
    }

    async fn remove(&self, user_id: &str, log_id: &str) -> Result<bool, ModerationError> {
        let mut appeals = self.appeals.lock().await;
        Ok(remove_appeals(&mut appeals, user_id, log_id) > 0)
    }
}
