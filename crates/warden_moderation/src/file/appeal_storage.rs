use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    Appeal, ModerationError,
    storage::{AppealStorageBackend, CorruptionPolicy, remove_appeals},
};

use super::JsonArrayFile;

/// File-based appeal queue
#[derive(Debug)]
pub struct FileAppealStorage {
    file: JsonArrayFile<Appeal>,
}

impl FileAppealStorage {
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
}

#[async_trait]
impl AppealStorageBackend for FileAppealStorage {
    async fn append(&self, appeal: Appeal) -> Result<(), ModerationError> {
        debug!(
            log_type = "storage",
            "Storing appeal from {} for log {}", appeal.user_id, appeal.log_id
        );
        self.file
            .update(|appeals| {
                appeals.insert(0, appeal);
                ((), true)
            })
            .await
    }

    async fn list(&self) -> Result<Vec<Appeal>, ModerationError> {
        Ok(self.file.read().await)
    }

    async fn remove(&self, user_id: &str, log_id: &str) -> Result<bool, ModerationError> {
        let removed = self
            .file
            .update(|appeals| {
                let removed = remove_appeals(appeals, user_id, log_id);
                (removed, removed > 0)
            })
            .await?;
        debug!(
            log_type = "storage",
            "Removed {} appeal(s) from {} for log {}", removed, user_id, log_id
        );
        Ok(removed > 0)
    }
}
