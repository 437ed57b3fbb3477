//! Backend negotiation
//!
//! A named store may already exist on disk in either format. The backend is
//! picked by looking at what is there, falling back to the caller's preference
//! for new stores.

use super::{JsonStore, KvStore, RocksStore, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    RocksDb,
    JsonSnapshot,
}

impl StoreBackend {
    /// Location of the named store under `base` for this backend
    pub fn path(&self, base: &Path, name: &str) -> PathBuf {
        match self {
            StoreBackend::RocksDb => base.join(format!("{}.db", name)),
            StoreBackend::JsonSnapshot => base.join(format!("{}.json", name)),
        }
    }
}

/// Decide which backend holds (or will hold) the named store.
///
/// Backends are tried in priority order: an existing RocksDB directory, then
/// an existing JSON snapshot, then `preferred`.
pub fn probe_backend(base: &Path, name: &str, preferred: StoreBackend) -> StoreBackend {
    let rocks = StoreBackend::RocksDb.path(base, name);
    if rocks.join("CURRENT").is_file() {
        return StoreBackend::RocksDb;
    }
    if StoreBackend::JsonSnapshot.path(base, name).is_file() {
        return StoreBackend::JsonSnapshot;
    }
    preferred
}

/// A store opened through [`open_store`]
pub enum OpenedStore<V: Serialize> {
    Rocks(RocksStore<V>),
    Json(JsonStore<V>),
}

impl<V: Serialize> OpenedStore<V> {
    pub fn backend(&self) -> StoreBackend {
        match self {
            OpenedStore::Rocks(_) => StoreBackend::RocksDb,
            OpenedStore::Json(_) => StoreBackend::JsonSnapshot,
        }
    }
}

/// Open the named store under `base` with the negotiated backend
pub fn open_store<V>(base: &Path, name: &str, preferred: StoreBackend) -> StoreResult<OpenedStore<V>>
where
    V: Serialize + DeserializeOwned,
{
    let backend = probe_backend(base, name, preferred);
    let path = backend.path(base, name);
    info!("{} opened ({:?})", path.display(), backend);
    Ok(match backend {
        StoreBackend::RocksDb => OpenedStore::Rocks(RocksStore::open(path, name)?),
        StoreBackend::JsonSnapshot => OpenedStore::Json(JsonStore::open(path)?),
    })
}

impl<V> KvStore<V> for OpenedStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn get(&self, key: &str) -> StoreResult<Option<V>> {
        match self {
            OpenedStore::Rocks(s) => s.get(key),
            OpenedStore::Json(s) => s.get(key),
        }
    }

    fn set(&mut self, key: &str, value: V) -> StoreResult<()> {
        match self {
            OpenedStore::Rocks(s) => s.set(key, value),
            OpenedStore::Json(s) => s.set(key, value),
        }
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        match self {
            OpenedStore::Rocks(s) => s.contains(key),
            OpenedStore::Json(s) => s.contains(key),
        }
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        match self {
            OpenedStore::Rocks(s) => s.keys(),
            OpenedStore::Json(s) => s.keys(),
        }
    }

    fn values(&self) -> StoreResult<Vec<V>> {
        match self {
            OpenedStore::Rocks(s) => s.values(),
            OpenedStore::Json(s) => s.values(),
        }
    }

    fn len(&self) -> StoreResult<usize> {
        match self {
            OpenedStore::Rocks(s) => s.len(),
            OpenedStore::Json(s) => s.len(),
        }
    }

    fn sync(&mut self) -> StoreResult<()> {
        match self {
            OpenedStore::Rocks(s) => s.sync(),
            OpenedStore::Json(s) => s.sync(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_prefers_existing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(probe_backend(dir.path(), "tag-cluster", StoreBackend::RocksDb), StoreBackend::RocksDb);

        let mut js: OpenedStore<u32> = open_store(dir.path(), "tag-cluster", StoreBackend::JsonSnapshot).unwrap();
        js.set("t", 1).unwrap();
        js.sync().unwrap();
        drop(js);

        assert_eq!(probe_backend(dir.path(), "tag-cluster", StoreBackend::RocksDb), StoreBackend::JsonSnapshot);
        let reopened: OpenedStore<u32> = open_store(dir.path(), "tag-cluster", StoreBackend::RocksDb).unwrap();
        assert_eq!(reopened.backend(), StoreBackend::JsonSnapshot);
        assert_eq!(reopened.fetch("t").unwrap(), 1);
    }

    #[test]
    fn test_probe_detects_rocksdb() {
        let dir = tempfile::tempdir().unwrap();
        let mut rs: OpenedStore<u32> = open_store(dir.path(), "p_idx", StoreBackend::RocksDb).unwrap();
        rs.set("a", 7).unwrap();
        drop(rs);
        assert_eq!(probe_backend(dir.path(), "p_idx", StoreBackend::JsonSnapshot), StoreBackend::RocksDb);
    }
}
