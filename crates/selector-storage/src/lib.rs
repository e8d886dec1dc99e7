//! # selector-storage: durable key-value backends.
//!
//! - [`memory::MemoryStorage`]: process-local map, the default backend
//! - [`file::FileStorage`]: single JSON document on disk
//! - [`json::JsonStorage`]: serde codec plus `:`-joined key namespacing
//!   over any [`StorageService`](selector_core::traits::StorageService)

pub mod file;
pub mod json;
pub mod memory;

pub use file::FileStorage;
pub use json::JsonStorage;
pub use memory::MemoryStorage;
