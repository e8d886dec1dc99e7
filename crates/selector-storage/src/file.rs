//! File-backed storage.
//!
//! All keys live in one JSON object at `<dir>/storage.json`. Every write
//! rewrites the whole document through a temp file and a rename, so a crash
//! leaves either the old or the new document on disk, never a torn one.
//! Writers are serialized by an async mutex.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use selector_core::error::StorageError;
use selector_core::traits::StorageService;
use tokio::sync::Mutex;
use tracing::debug;

/// File name of the storage document inside the data directory.
pub const STORAGE_FILE: &str = "storage.json";

#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open (creating the directory if needed) the storage under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            StorageError::Backend(format!("failed to create '{}': {e}", dir.display()))
        })?;

        Ok(Self {
            path: dir.join(STORAGE_FILE),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing JSON document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::Backend(format!("corrupted '{}': {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::Backend(format!(
                "failed to read '{}': {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_document(&self, document: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| StorageError::Backend(format!("failed to encode document: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, bytes).await.map_err(|e| {
            StorageError::Backend(format!("failed to write '{}': {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            StorageError::Backend(format!("failed to replace '{}': {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), keys = document.len(), "storage document written");
        Ok(())
    }
}

#[async_trait]
impl StorageService for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_document().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        document.insert(key.to_string(), value);
        self.write_document(&document).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        if document.remove(key).is_none() {
            return Ok(());
        }
        self.write_document(&document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert_eq!(storage.get_item("anything").await.unwrap(), None);
        assert!(!storage.path().exists());
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = FileStorage::open(dir.path()).unwrap();
            storage.set_item("a", "1".into()).await.unwrap();
            storage.set_item("b", "2".into()).await.unwrap();
            storage.remove_item("a").await.unwrap();
        }

        let reopened = FileStorage::open(dir.path()).unwrap();
        assert_eq!(reopened.get_item("a").await.unwrap(), None);
        assert_eq!(reopened.get_item("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("x").join("y");
        let storage = FileStorage::open(&nested).unwrap();
        storage.set_item("k", "v".into()).await.unwrap();
        assert!(nested.join(STORAGE_FILE).exists());
    }

    #[tokio::test]
    async fn corrupted_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORAGE_FILE), b"not json").unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        let err = storage.get_item("k").await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(msg) if msg.contains("corrupted")));
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = std::sync::Arc::new(FileStorage::open(dir.path()).unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let storage = std::sync::Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                storage.set_item(&format!("k{i}"), i.to_string()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..8 {
            assert_eq!(
                storage.get_item(&format!("k{i}")).await.unwrap(),
                Some(i.to_string())
            );
        }
    }
}
