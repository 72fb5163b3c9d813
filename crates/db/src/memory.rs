//! In-memory [`KvStore`] for tests and ephemeral runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{DbError, KvStore};

/// A [`KvStore`] backed by an in-process map. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryKv {
    // BTreeMap keeps scan_prefix ordered, matching the sled backend.
    inner: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        Ok(self.inner.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), DbError> {
        self.inner.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), DbError> {
        self.inner.lock().remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, DbError> {
        let inner = self.inner.lock();
        Ok(inner
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
