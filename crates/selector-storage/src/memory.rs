//! In-memory storage. Everything is lost when the process exits.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use selector_core::error::StorageError;
use selector_core::traits::StorageService;

/// Thread-safe, in-memory implementation of [`StorageService`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.items.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Synchronous read, handy for assertions.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.items.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.write().remove(key);
        Ok(())
    }
}
