//! JSON snapshot store
//!
//! Holds the whole map in memory and rewrites the snapshot file on
//! [`KvStore::sync`] and on drop.

use super::{KvStore, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct JsonStore<V: Serialize> {
    path: PathBuf,
    map: BTreeMap<String, V>,
    dirty: bool,
}

impl<V: Serialize + DeserializeOwned> JsonStore<V> {
    /// Open a snapshot, starting empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let map = if path.exists() {
            serde_json::from_reader(BufReader::new(File::open(&path)?))?
        } else {
            BTreeMap::new()
        };
        debug!("opened snapshot {} ({} keys)", path.display(), map.len());
        Ok(JsonStore { path, map, dirty: false })
    }
}

impl<V: Serialize> JsonStore<V> {
    fn write(&mut self) -> StoreResult<()> {
        let tmp = self.path.with_extension("tmp");
        let mut w = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut w, &self.map)?;
        w.flush()?;
        drop(w);
        std::fs::rename(&tmp, &self.path)?;
        self.dirty = false;
        Ok(())
    }
}

impl<V> KvStore<V> for JsonStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn get(&self, key: &str) -> StoreResult<Option<V>> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: V) -> StoreResult<()> {
        self.map.insert(key.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.map.contains_key(key))
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.map.keys().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.map.len())
    }

    fn sync(&mut self) -> StoreResult<()> {
        if self.dirty {
            self.write()?;
        }
        Ok(())
    }
}

impl<V: Serialize> Drop for JsonStore<V> {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.write() {
                warn!("could not write snapshot {}: {}", self.path.display(), e);
            }
        }
    }
}
