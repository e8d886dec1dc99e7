//! Namespaced JSON view over a [`StorageService`].
//!
//! Keys are stored as `segment:segment:key`. The selector keeps its own
//! state under the package namespace and hands each wallet backend a child
//! namespace of its module id.

use std::fmt;
use std::sync::Arc;

use selector_core::constants::NAMESPACE_SEPARATOR;
use selector_core::error::StorageError;
use selector_core::traits::StorageService;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct JsonStorage {
    storage: Arc<dyn StorageService>,
    namespace: Vec<String>,
}

impl JsonStorage {
    pub fn new(storage: Arc<dyn StorageService>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: vec![namespace.into()],
        }
    }

    /// A child view one namespace segment deeper.
    pub fn scoped(&self, segment: impl Into<String>) -> Self {
        let mut namespace = self.namespace.clone();
        namespace.push(segment.into());
        Self {
            storage: Arc::clone(&self.storage),
            namespace,
        }
    }

    /// Fully-qualified key as written to the backend.
    pub fn resolve_key(&self, key: &str) -> String {
        let mut full = self.namespace.join(&NAMESPACE_SEPARATOR.to_string());
        full.push(NAMESPACE_SEPARATOR);
        full.push_str(key);
        full
    }

    pub async fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let full = self.resolve_key(key);
        let Some(raw) = self.storage.get_item(&full).await? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Serialization {
                key: full,
                reason: e.to_string(),
            })
    }

    pub async fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let full = self.resolve_key(key);
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Serialization {
            key: full.clone(),
            reason: e.to_string(),
        })?;
        self.storage.set_item(&full, raw).await
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(&self.resolve_key(key)).await
    }
}

impl fmt::Debug for JsonStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonStorage")
            .field("namespace", &self.namespace)
            .finish()
    }
}
