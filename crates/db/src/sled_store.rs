//! [`sled`]-backed [`KvStore`].

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::{DbError, KvStore};

/// A durable [`KvStore`] over a [`sled`] database.
///
/// Sled operations are fast enough to run inline on the async executor for
/// this workload (small values, low write rate); flushes are the only
/// potentially slow call and happen after each write to make deposit state
/// crash-safe.
#[derive(Debug, Clone)]
pub struct SledKv {
    db: sled::Db,
}

impl SledKv {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!(path = %path.display(), "opened deposit database");
        Ok(Self { db })
    }

    /// Wraps an already-open database handle.
    pub fn from_db(db: sled::Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KvStore for SledKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), DbError> {
        self.db.insert(key, value)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), DbError> {
        self.db.remove(key)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, DbError> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (k, v) = item?;
            // Keys are written by this crate's callers as UTF-8 paths.
            let key = String::from_utf8_lossy(&k).into_owned();
            out.push((key, v.to_vec()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let kv = SledKv::open(dir.path()).unwrap();
            kv.set("pegin/addr/tx", b"state").await.unwrap();
        }
        let kv = SledKv::open(dir.path()).unwrap();
        assert_eq!(
            kv.get("pegin/addr/tx").await.unwrap(),
            Some(b"state".to_vec())
        );
    }

    #[tokio::test]
    async fn scan_prefix_matches_memory_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let kv = SledKv::open(dir.path()).unwrap();
        kv.set("pegin/a/1", b"1").await.unwrap();
        kv.set("pegin/b/1", b"2").await.unwrap();

        let hits = kv.scan_prefix("pegin/a/").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "pegin/a/1");
    }
}
