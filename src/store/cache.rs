//! LRU read cache decorator

use super::{KvStore, StoreResult};
use lru::LruCache;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Write-through store wrapper caching the most recently read values
pub struct CachedStore<S, V> {
    inner: S,
    cache: Mutex<LruCache<String, V>>,
    _marker: PhantomData<fn() -> V>,
}

impl<S, V> CachedStore<S, V> {
    pub fn new(inner: S, capacity: NonZeroUsize) -> Self {
        CachedStore { inner, cache: Mutex::new(LruCache::new(capacity)), _marker: PhantomData }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, V> KvStore<V> for CachedStore<S, V>
where
    S: KvStore<V>,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> StoreResult<Option<V>> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(v) = cache.get(key) {
                return Ok(Some(v.clone()));
            }
        }
        let value = self.inner.get(key)?;
        if let (Some(v), Ok(mut cache)) = (&value, self.cache.lock()) {
            cache.put(key.to_string(), v.clone());
        }
        Ok(value)
    }

    fn set(&mut self, key: &str, value: V) -> StoreResult<()> {
        if let Ok(cache) = self.cache.get_mut() {
            cache.put(key.to_string(), value.clone());
        }
        self.inner.set(key, value)
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        if let Ok(cache) = self.cache.lock() {
            if cache.contains(key) {
                return Ok(true);
            }
        }
        self.inner.contains(key)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys()
    }

    fn values(&self) -> StoreResult<Vec<V>> {
        self.inner.values()
    }

    fn len(&self) -> StoreResult<usize> {
        self.inner.len()
    }

    fn sync(&mut self) -> StoreResult<()> {
        self.inner.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_cache_is_write_through() {
        let mut store = CachedStore::new(MemoryStore::<u32>::new(), NonZeroUsize::new(1).unwrap());
        store.set("a", 1).unwrap();
        store.set("b", 2).unwrap();
        assert_eq!(store.inner().fetch("a").unwrap(), 1);
        assert_eq!(store.fetch("a").unwrap(), 1);
        assert_eq!(store.fetch("b").unwrap(), 2);
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
        assert!(store.get("c").unwrap().is_none());
    }
}
