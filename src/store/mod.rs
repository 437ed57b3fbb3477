//! Key-value stores consumed by the pipeline
//!
//! Every stage reads its inputs from and writes its outputs to named stores
//! keyed by string id. [`KvStore`] is the only interface the core sees; the
//! backends are:
//! - [`MemoryStore`]: ordered in-memory map
//! - [`RocksStore`]: one RocksDB column family per store, bincode values
//! - [`JsonStore`]: single JSON snapshot file, written on sync
//! - [`CachedStore`]: LRU read cache in front of any other store

pub mod cache;
pub mod json;
pub mod memory;
pub mod open;
pub mod rocks;

pub use cache::CachedStore;
pub use json::JsonStore;
pub use memory::MemoryStore;
pub use open::{open_store, probe_backend, OpenedStore, StoreBackend};
pub use rocks::RocksStore;

use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Binary serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Snapshot serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Column family error
    #[error("Column family error: {0}")]
    ColumnFamily(String),

    #[error("No usable store backend at {0}")]
    UnsupportedBackend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// String-keyed store of values
///
/// Keys enumerate in ascending order for every backend, so stages that walk
/// a store see the same sequence on every run.
pub trait KvStore<V>: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<V>>;

    fn set(&mut self, key: &str, value: V) -> StoreResult<()>;

    fn contains(&self, key: &str) -> StoreResult<bool>;

    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Get a value, failing with [`StoreError::NotFound`] if absent
    fn fetch(&self, key: &str) -> StoreResult<V> {
        self.get(key)?.ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn values(&self) -> StoreResult<Vec<V>> {
        self.keys()?.iter().map(|k| self.fetch(k)).collect()
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.keys()?.len())
    }

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Flush pending writes to the backing medium
    fn sync(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

impl<V, S: KvStore<V> + ?Sized> KvStore<V> for Box<S> {
    fn get(&self, key: &str) -> StoreResult<Option<V>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: V) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        (**self).contains(key)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys()
    }

    fn len(&self) -> StoreResult<usize> {
        (**self).len()
    }

    fn sync(&mut self) -> StoreResult<()> {
        (**self).sync()
    }
}
