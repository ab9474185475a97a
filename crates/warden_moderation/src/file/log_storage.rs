use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    LogEntry, LogFilter, ModerationError, NewLogEntry,
    storage::{CorruptionPolicy, LogStorageBackend, filtered_newest_first, insert_log_entry},
};

use super::JsonArrayFile;

/// File-based moderation log
#[derive(Debug)]
pub struct FileLogStorage {
    file: JsonArrayFile<LogEntry>,
}

impl FileLogStorage {
    pub async fn new(
        path: impl AsRef<Path>,
        on_corruption: CorruptionPolicy,
    ) -> Result<Self, ModerationError> {
        Ok(Self {
            file: JsonArrayFile::new(path, on_corruption).await?,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Entries exactly as stored, without re-sorting.
    pub async fn raw_entries(&self) -> Vec<LogEntry> {
        self.file.read().await
    }
}

#[async_trait]
impl LogStorageBackend for FileLogStorage {
    async fn append(&self, entry: NewLogEntry) -> Result<LogEntry, ModerationError> {
        let entry = self
            .file
            .update(|entries| (insert_log_entry(entries, entry), true))
            .await?;
        debug!(
            log_type = "storage",
            "Appended log entry {} ({} for {})", entry.id, entry.action, entry.user_id
        );
        Ok(entry)
    }

    async fn list(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, ModerationError> {
        let entries = self.file.read().await;
        Ok(filtered_newest_first(&entries, filter))
    }

    async fn get(&self, id: &str) -> Result<Option<LogEntry>, ModerationError> {
        let entries = self.file.read().await;
        Ok(entries.into_iter().find(|entry| entry.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActionType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");

        let storage = FileLogStorage::new(&path, CorruptionPolicy::Reset)
            .await
            .unwrap();
        storage
            .append(NewLogEntry::new(ActionType::Ban, "111", "spam"))
            .await
            .unwrap();
        storage
            .append(NewLogEntry::new(ActionType::Kick, "222", ""))
            .await
            .unwrap();
        let before = storage.raw_entries().await;

        let reloaded = FileLogStorage::new(&path, CorruptionPolicy::Reset)
            .await
            .unwrap();
        assert_eq!(reloaded.raw_entries().await, before);
        assert_eq!(before[0].id, "2");
        assert_eq!(before[1].id, "1");
    }

    #[tokio::test]
    async fn test_reads_legacy_file_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(
            &path,
            r#"[
    {"type": "ban", "user_id": "42", "reason": "No reason given", "timestamp": "2024-05-01 10:00:00", "id": "9"},
    {"type": "kick", "user_id": "43", "reason": "x", "timestamp": "2024-04-01 10:00:00"}
]"#,
        )
        .unwrap();

        let storage = FileLogStorage::new(&path, CorruptionPolicy::Reset)
            .await
            .unwrap();
        let entry = storage
            .append(NewLogEntry::new(ActionType::Unban, "42", "Appeal accepted"))
            .await
            .unwrap();
        assert_eq!(entry.id, "10");

        assert_eq!(storage.get("9").await.unwrap().unwrap().user_id, "42");
        assert!(storage.get("11").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mixed_id_types_keep_every_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(
            &path,
            r#"[
    {"id": "7", "type": "ban", "user_id": "42", "reason": "spam", "timestamp": "2024-05-01 10:00:00"},
    {"id": 8, "type": "kick", "user_id": "43", "reason": null, "timestamp": "2024-05-02 10:00:00"},
    {"id": null, "type": "ban", "user_id": "44", "reason": "x", "timestamp": "2024-05-03 10:00:00"}
]"#,
        )
        .unwrap();

        let storage = FileLogStorage::new(&path, CorruptionPolicy::Reset)
            .await
            .unwrap();
        let entry = storage
            .append(NewLogEntry::new(ActionType::Unban, "42", "Appeal accepted"))
            .await
            .unwrap();
        assert_eq!(entry.id, "9");
        assert_eq!(storage.raw_entries().await.len(), 4);
        assert_eq!(storage.get("8").await.unwrap().unwrap().user_id, "43");
    }

    #[tokio::test]
    async fn test_corrupt_log_starts_over_at_one() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(&path, "garbage").unwrap();

        let storage = FileLogStorage::new(&path, CorruptionPolicy::Reset)
            .await
            .unwrap();
        assert!(storage.list(&LogFilter::new()).await.unwrap().is_empty());

        let entry = storage
            .append(NewLogEntry::new(ActionType::Ban, "1", ""))
            .await
            .unwrap();
        assert_eq!(entry.id, "1");
        assert_eq!(storage.raw_entries().await.len(), 1);
    }
}
