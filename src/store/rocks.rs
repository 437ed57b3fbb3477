//! RocksDB store
//!
//! Each named store is one column family; values are bincode-encoded.

use super::{KvStore, StoreError, StoreResult};
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// RocksDB-backed store holding values of type `V`
pub struct RocksStore<V> {
    db: Arc<DB>,
    cf: String,
    _marker: PhantomData<fn() -> V>,
}

impl<V> RocksStore<V> {
    /// Open or create the database at `path` with column family `name`
    pub fn open(path: impl AsRef<Path>, name: &str) -> StoreResult<Self> {
        let path = path.as_ref();
        info!("Opening store {} at: {}", name, path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        // an existing database must be opened with all of its column families
        let mut names = DB::list_cf(&opts, path).unwrap_or_else(|_| vec!["default".to_string()]);
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        let cf_descriptors: Vec<ColumnFamilyDescriptor> =
            names.iter().map(|n| ColumnFamilyDescriptor::new(n, Self::cf_options())).collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(RocksStore { db: Arc::new(db), cf: name.to_string(), _marker: PhantomData })
    }

    /// Another store in the same database
    pub fn sibling<W>(&self, name: &str) -> StoreResult<RocksStore<W>> {
        self.db.cf_handle(name).ok_or_else(|| StoreError::ColumnFamily(name.to_string()))?;
        Ok(RocksStore { db: Arc::clone(&self.db), cf: name.to_string(), _marker: PhantomData })
    }

    fn cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn handle(&self) -> StoreResult<&rocksdb::ColumnFamily> {
        self.db.cf_handle(&self.cf).ok_or_else(|| StoreError::ColumnFamily(self.cf.clone()))
    }
}

impl<V: Serialize + DeserializeOwned> KvStore<V> for RocksStore<V> {
    fn get(&self, key: &str) -> StoreResult<Option<V>> {
        let cf = self.handle()?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: V) -> StoreResult<()> {
        let cf = self.handle()?;
        let bytes = bincode::serialize(&value)?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        let cf = self.handle()?;
        Ok(self.db.get_pinned_cf(cf, key.as_bytes())?.is_some())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let cf = self.handle()?;
        let mut keys = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }

    fn values(&self) -> StoreResult<Vec<V>> {
        let cf = self.handle()?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            values.push(bincode::deserialize(&value)?);
        }
        Ok(values)
    }

    fn sync(&mut self) -> StoreResult<()> {
        let cf = self.handle()?;
        self.db.flush_cf(cf)?;
        debug!("flushed store {}", self.cf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rocks_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prod-doc.db");

        {
            let mut store: RocksStore<Vec<String>> = RocksStore::open(&path, "prod-doc").unwrap();
            store.set("u2", vec!["d3".to_string()]).unwrap();
            store.set("u1", vec!["d1".to_string(), "d2".to_string()]).unwrap();
            store.sync().unwrap();
        }

        let store: RocksStore<Vec<String>> = RocksStore::open(&path, "prod-doc").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["u1", "u2"]);
        assert_eq!(store.fetch("u1").unwrap(), vec!["d1", "d2"]);
        assert!(!store.contains("u3").unwrap());
        assert_eq!(store.values().unwrap().len(), 2);
    }

    #[test]
    fn test_sibling_column_families() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("p_idx.db");
        RocksStore::<u8>::open(&path, "p_idx_s").unwrap();

        let store: RocksStore<String> = RocksStore::open(&path, "p_idx").unwrap();
        let mut state: RocksStore<u8> = store.sibling("p_idx_s").unwrap();
        state.set("x", 3).unwrap();
        assert_eq!(state.fetch("x").unwrap(), 3);
        assert!(store.sibling::<u8>("missing").is_err());
    }
}
