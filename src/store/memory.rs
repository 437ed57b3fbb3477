//! In-memory store

use super::{KvStore, StoreResult};
use std::collections::BTreeMap;

/// Ordered in-memory map, for tests and scratch data
#[derive(Debug, Clone, Default)]
pub struct MemoryStore<V> {
    map: BTreeMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        MemoryStore { map: BTreeMap::new() }
    }

    pub fn into_inner(self) -> BTreeMap<String, V> {
        self.map
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for MemoryStore<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MemoryStore { map: iter.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }
}

impl<V: Clone + Send + Sync> KvStore<V> for MemoryStore<V> {
    fn get(&self, key: &str) -> StoreResult<Option<V>> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: V) -> StoreResult<()> {
        self.map.insert(key.to_string(), value);
        Ok(())
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.map.contains_key(key))
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.map.keys().cloned().collect())
    }

    fn values(&self) -> StoreResult<Vec<V>> {
        Ok(self.map.values().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.map.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_memory_store() {
        let mut store: MemoryStore<Vec<String>> = [("b", vec!["x".to_string()])].into_iter().collect();
        store.set("a", vec![]).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
        assert!(store.contains("b").unwrap());
        assert_eq!(store.fetch("b").unwrap(), vec!["x"]);
        assert!(matches!(store.fetch("c"), Err(StoreError::NotFound(k)) if k == "c"));
        assert_eq!(store.len().unwrap(), 2);
    }
}
