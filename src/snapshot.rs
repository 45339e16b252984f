use std::{borrow::Borrow, fmt, sync::Arc};

use crate::DecayMapError;

/// A key-value pair copied out of a [`DecayMap`][decay-map] by
/// [`entry_set`][entry-set].
///
/// The entry is disconnected from the map: it holds a clone of the value, so it
/// neither keeps the entry alive nor observes later changes to the map.
///
/// [decay-map]: ./sync/struct.DecayMap.html
/// [entry-set]: ./sync/struct.DecayMap.html#method.entry_set
pub struct SnapshotEntry<K, V> {
    key: Arc<K>,
    value: V,
}

impl<K, V> SnapshotEntry<K, V> {
    pub(crate) fn new(key: Arc<K>, value: V) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_parts(self) -> (Arc<K>, V) {
        (self.key, self.value)
    }

    /// Always fails with [`DecayMapError::ReadOnlySnapshot`]. Snapshot entries
    /// cannot be written through; use [`DecayMap::put`][put] to update the map.
    ///
    /// [put]: ./sync/struct.DecayMap.html#method.put
    pub fn set_value(&mut self, _value: V) -> Result<V, DecayMapError> {
        Err(DecayMapError::ReadOnlySnapshot)
    }
}

impl<K, V: Clone> Clone for SnapshotEntry<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            value: self.value.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for SnapshotEntry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SnapshotEntry")
            .field(&self.key)
            .field(&self.value)
            .finish()
    }
}

/// A point-in-time, read-only snapshot of the live entries of a
/// [`DecayMap`][decay-map]. Keys are unique within a snapshot.
///
/// [decay-map]: ./sync/struct.DecayMap.html
pub struct EntrySet<K, V> {
    entries: Vec<SnapshotEntry<K, V>>,
}

impl<K, V> EntrySet<K, V> {
    pub(crate) fn new(entries: Vec<SnapshotEntry<K, V>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotEntry<K, V>> {
        self.entries.iter()
    }

    /// Returns the value of `key` as it was when the snapshot was taken.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries
            .iter()
            .find(|e| <K as Borrow<Q>>::borrow(&*e.key) == key)
            .map(|e| &e.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K, V> IntoIterator for EntrySet<K, V> {
    type Item = SnapshotEntry<K, V>;
    type IntoIter = std::vec::IntoIter<SnapshotEntry<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a EntrySet<K, V> {
    type Item = &'a SnapshotEntry<K, V>;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for EntrySet<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.key, &e.value)))
            .finish()
    }
}
