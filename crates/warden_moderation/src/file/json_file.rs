use std::{
    io,
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{ModerationError, storage::CorruptionPolicy};

/// A JSON array on disk, read and rewritten whole.
///
/// Every access goes through one mutex, so a read-modify-write never
/// interleaves with another on the same file. Writes land in a temporary
/// file next to the target and are renamed over it.
#[derive(Debug)]
pub struct JsonArrayFile<T> {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    on_corruption: CorruptionPolicy,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonArrayFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub async fn new(
        path: impl AsRef<Path>,
        on_corruption: CorruptionPolicy,
    ) -> Result<Self, ModerationError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                error!(
                    log_type = "storage",
                    "Failed to create directories {}: {}",
                    parent.display(),
                    e
                );
                ModerationError::Io(e)
            })?;
        }

        Ok(Self {
            path,
            lock: Arc::new(Mutex::new(())),
            on_corruption,
            _marker: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Vec<T> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Loads the array, lets `apply` mutate it and persists the result when
    /// `apply` reports a change. Nothing is written if `apply` leaves it as is.
    pub async fn update<R>(
        &self,
        apply: impl FnOnce(&mut Vec<T>) -> (R, bool),
    ) -> Result<R, ModerationError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await;
        let (result, changed) = apply(&mut items);
        if changed {
            self.write(&items).await?;
        }
        Ok(result)
    }

    async fn load(&self) -> Vec<T> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(
                    log_type = "storage",
                    "{} does not exist yet, starting empty",
                    self.path.display()
                );
                return Vec::new();
            }
            Err(e) => {
                error!(
                    log_type = "storage",
                    "Failed to read {}: {}, continuing with an empty store",
                    self.path.display(),
                    e
                );
                return Vec::new();
            }
        };

        if content.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str(&content) {
            Ok(items) => items,
            Err(e) => {
                error!(
                    log_type = "storage",
                    "Failed to parse {}: {}, continuing with an empty store",
                    self.path.display(),
                    e
                );
                if self.on_corruption == CorruptionPolicy::Quarantine {
                    self.quarantine().await;
                }
                Vec::new()
            }
        }
    }

    async fn quarantine(&self) {
        let mut target = self.path.clone().into_os_string();
        target.push(format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S")));
        let target = PathBuf::from(target);

        match fs::rename(&self.path, &target).await {
            Ok(()) => warn!(
                log_type = "storage",
                "Moved unreadable {} to {}",
                self.path.display(),
                target.display()
            ),
            Err(e) => error!(
                log_type = "storage",
                "Failed to quarantine {}: {}",
                self.path.display(),
                e
            ),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
    }

    fn encode(items: &[T]) -> Result<Vec<u8>, ModerationError> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        items.serialize(&mut serializer).map_err(|e| {
            error!(log_type = "storage", "Failed to serialize store: {}", e);
            ModerationError::Serialization(e.to_string())
        })?;
        Ok(buffer)
    }

    async fn write(&self, items: &[T]) -> Result<(), ModerationError> {
        let content = Self::encode(items)?;
        let temp_path = self.temp_path();

        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&content).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &self.path).await
        }
        .await;

        if let Err(e) = result {
            error!(
                log_type = "storage",
                "Failed to write {}: {}",
                self.path.display(),
                e
            );
            if let Err(cleanup) = fs::remove_file(&temp_path).await
                && cleanup.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    log_type = "storage",
                    "Failed to remove temporary file {}: {}",
                    temp_path.display(),
                    cleanup
                );
            }
            return Err(ModerationError::Storage(format!(
                "failed to write {}: {}",
                self.path.display(),
                e
            )));
        }

        debug!(
            log_type = "storage",
            "Wrote {} entries to {}",
            items.len(),
            self.path.display()
        );
        Ok(())
    }
}
