use std::collections::HashSet;
use std::hash::Hash;

/// Insertion-ordered map where the first value stored under a key is kept and
/// every later insert for that key is discarded, not merged.
#[derive(Debug, Clone)]
pub struct FirstWinsIndex<K, V> {
    seen: HashSet<K>,
    values: Vec<V>,
}

impl<K: Eq + Hash, V> Default for FirstWinsIndex<K, V> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            values: Vec::new(),
        }
    }
}

impl<K: Eq + Hash, V> FirstWinsIndex<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    /// Store `make()` under `key` unless the key is already present. The
    /// closure only runs for new keys. Returns whether anything was stored.
    pub fn insert_with<F>(&mut self, key: K, make: F) -> bool
    where
        F: FnOnce() -> V,
    {
        if !self.seen.insert(key) {
            return false;
        }
        self.values.push(make());
        true
    }

    /// Values in first-insertion order.
    pub fn into_values(self) -> Vec<V> {
        self.values
    }
}
