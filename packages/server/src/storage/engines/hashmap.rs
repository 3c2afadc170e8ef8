//! In-memory [`StorageEngine`] implementation backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking.

use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::storage::engine::StorageEngine;

/// In-memory storage backed by [`DashMap`].
///
/// Readers never block each other; writers use the map's internal sharding.
#[derive(Debug)]
pub struct HashMapStorage<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
}

impl<K, V> HashMapStorage<K, V>
where
    K: Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> Default for HashMapStorage<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> StorageEngine<K, V> for HashMapStorage<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn put(&self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    fn put_unless(
        &self,
        key: K,
        value: V,
        conflicts: &dyn Fn(&V) -> bool,
    ) -> Result<Option<V>, V> {
        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                if conflicts(slot.get()) {
                    return Err(slot.get().clone());
                }
                Ok(Some(slot.insert(value)))
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(None)
            }
        }
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    fn remove_if(&self, key: &K, matches: &dyn Fn(&V) -> bool) -> Option<V> {
        self.entries.remove_if(key, |_, v| matches(v)).map(|(_, v)| v)
    }

    fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn snapshot(&self) -> Vec<V> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let storage = HashMapStorage::<String, u32>::new();
        assert!(storage.put("a".to_string(), 1).is_none());
        assert_eq!(storage.put("a".to_string(), 2), Some(1));
        assert_eq!(storage.get(&"a".to_string()), Some(2));
        assert!(storage.contains_key(&"a".to_string()));
        assert_eq!(storage.remove(&"a".to_string()), Some(2));
        assert!(storage.get(&"a".to_string()).is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn conditional_put_and_remove() {
        let storage = HashMapStorage::<u32, &str>::new();
        assert_eq!(storage.put_unless(1, "acme", &|v| *v != "acme"), Ok(None));
        assert_eq!(
            storage.put_unless(1, "acme-2", &|v| !v.starts_with("acme")),
            Ok(Some("acme"))
        );
        assert_eq!(storage.put_unless(1, "globex", &|v| *v != "globex"), Err("acme-2"));
        assert_eq!(storage.get(&1), Some("acme-2"));

        assert_eq!(storage.remove_if(&1, &|v| *v == "globex"), None);
        assert_eq!(storage.remove_if(&1, &|v| *v == "acme-2"), Some("acme-2"));
        assert!(storage.is_empty());
    }

    #[test]
    fn racing_first_writes_keep_one_owner() {
        for _ in 0..50 {
            let storage = std::sync::Arc::new(HashMapStorage::<u32, u32>::new());
            let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));
            let handles: Vec<_> = [1u32, 2]
                .into_iter()
                .map(|owner| {
                    let storage = std::sync::Arc::clone(&storage);
                    let barrier = std::sync::Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        storage.put_unless(7, owner, &|held| *held != owner).is_ok()
                    })
                })
                .collect();
            let wins = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(wins, 1);
        }
    }

    #[test]
    fn snapshot_and_clear() {
        let storage = HashMapStorage::<u32, u32>::new();
        for i in 0..5 {
            storage.put(i, i * 10);
        }
        let mut values = storage.snapshot();
        values.sort_unstable();
        assert_eq!(values, vec![0, 10, 20, 30, 40]);
        assert_eq!(storage.len(), 5);

        storage.clear();
        assert!(storage.is_empty());
        assert!(storage.snapshot().is_empty());
    }

    #[test]
    fn concurrent_writers() {
        let storage = std::sync::Arc::new(HashMapStorage::<u32, u32>::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let storage = std::sync::Arc::clone(&storage);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        storage.put(t * 100 + i, i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(storage.len(), 400);
    }
}
