//! Byte-oriented key/value persistence.
//!
//! Deposit state survives restarts through this layer. The trait is
//! deliberately small: callers serialize their own values and treat keys as
//! opaque UTF-8 paths. Two backends ship here, an in-memory map for tests
//! and a [`sled`] tree for production.

pub mod memory;
pub mod sled_store;

use std::sync::Arc;

use async_trait::async_trait;

pub use memory::MemoryKv;
pub use sled_store::SledKv;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The underlying store failed.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
}

/// Minimal async key/value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the value at `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DbError>;

    /// Writes `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), DbError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), DbError>;

    /// Returns all `(key, value)` pairs whose key starts with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, DbError>;
}

// Lets callers share one store between components as `Arc<dyn KvStore>`.
#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), DbError> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), DbError> {
        (**self).delete(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, DbError> {
        (**self).scan_prefix(prefix).await
    }
}
