//! Low-level entity storage trait.
//!
//! Defines [`StorageEngine`], the innermost storage layer underneath the
//! tenant-scoped repository. Engines know nothing about tenants: they store
//! whatever they are handed, keyed by entity id. Scoping is layered on top.

use std::hash::Hash;

/// Typed key-value entity storage.
///
/// All operations are synchronous. Wrapped in `Arc` for sharing across
/// request and worker tasks.
pub trait StorageEngine<K, V>: Send + Sync + 'static
where
    K: Eq + Hash,
{
    /// Insert or replace an entry by key. Returns the previous value if any.
    fn put(&self, key: K, value: V) -> Option<V>;

    /// Retrieve an entry by key, or `None` if not present.
    fn get(&self, key: &K) -> Option<V>;

    /// Insert `value` unless the current entry for `key` makes `conflicts`
    /// return true. The check and the write happen under one entry lock.
    ///
    /// Returns the replaced value on success and the conflicting entry,
    /// untouched, on refusal.
    fn put_unless(&self, key: K, value: V, conflicts: &dyn Fn(&V) -> bool)
        -> Result<Option<V>, V>;

    /// Remove an entry by key, returning the removed value.
    fn remove(&self, key: &K) -> Option<V>;

    /// Remove the entry for `key` only if `matches` holds for it, atomically.
    fn remove_if(&self, key: &K, matches: &dyn Fn(&V) -> bool) -> Option<V>;

    fn contains_key(&self, key: &K) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool;

    /// Clear all entries.
    fn clear(&self);

    /// Point-in-time snapshot of all values.
    ///
    /// The snapshot is mutation-tolerant (concurrent modifications do not fail).
    fn snapshot(&self) -> Vec<V>;
}
