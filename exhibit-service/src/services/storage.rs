use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::fs;

/// Subdirectory of the content root holding profile photos.
pub const PROFILE_PHOTO_DIR: &str = "users";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Backend(String),
}

/// Where an asset lives relative to the content root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Exhibit,
    ProfilePhoto,
}

impl AssetKind {
    /// Storage key for a stored file name of this kind.
    pub fn key(self, file_name: &str) -> String {
        match self {
            AssetKind::Exhibit => file_name.to_string(),
            AssetKind::ProfilePhoto => format!("{}/{}", PROFILE_PHOTO_DIR, file_name),
        }
    }
}

#[async_trait]
pub trait AssetStorage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;
    /// Deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Files under a local content root.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(base_path.join(PROFILE_PHOTO_DIR)).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl AssetStorage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(key = %key, "Asset already missing on delete");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Assets kept in memory. Deletes can be made to fail for exercising abort
/// paths.
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fail_deletes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AssetStorage for MemoryStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.files
            .lock()
            .map_err(|e| StorageError::Backend(format!("Memory storage mutex poisoned: {}", e)))?
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("delete of {} refused", key)));
        }
        self.files
            .lock()
            .map_err(|e| StorageError::Backend(format!("Memory storage mutex poisoned: {}", e)))?
            .remove(key);
        Ok(())
    }
}
