use std::fmt;
use std::hash::BuildHasher;
use std::hash::Hash;

use hashbrown::Equivalent;
use rustc_hash::FxBuildHasher;

use crate::IndexedSet;
use crate::SetIndex;

/// A map from keys to values, stored as an [IndexedSet] of keys together with
/// a vector of values at the index of their key.
///
/// Inherits the sizing behaviour of [IndexedSet]: it is created with an initial
/// size and maximum load percentage, and doubles when the load is exceeded.
pub struct Table<K, V, S = FxBuildHasher> {
    keys: IndexedSet<K, S>,
    values: Vec<Option<V>>,
}

impl<K, V, S: BuildHasher + Default> Table<K, V, S> {
    /// Creates an empty table with the default size and load percentage of [IndexedSet::new].
    pub fn new() -> Table<K, V, S> {
        Table {
            keys: IndexedSet::new(),
            values: Vec::new(),
        }
    }

    /// Creates an empty table, see [IndexedSet::with_capacity].
    pub fn with_capacity(initial_size: usize, max_load_percent: usize) -> Table<K, V, S> {
        Table {
            keys: IndexedSet::with_capacity(initial_size, max_load_percent),
            values: Vec::new(),
        }
    }
}

impl<K, V, S> Table<K, V, S> {
    /// Returns the number of mappings.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if there are no mappings.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the number of slots of the underlying hash table.
    pub fn capacity(&self) -> usize {
        self.keys.capacity()
    }

    /// Returns the keys in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.keys.elements()
    }

    /// Returns the values in the same order as [Table::keys].
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Returns the mappings in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.keys.iter().filter_map(|(index, key)| Some((key, self.value_at(index)?)))
    }

    /// Removes all mappings, keeping the current capacity.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
    }

    fn value_at(&self, index: SetIndex) -> Option<&V> {
        self.values.get(*index).and_then(Option::as_ref)
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Table<K, V, S> {
    /// Maps the key to the value, returns the previous value for an equal key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (index, _) = self.keys.insert(key);

        if self.values.len() <= *index {
            self.values.resize_with(*index + 1, || None);
        }

        self.values[*index].replace(value)
    }

    /// Returns the value mapped to the key, or None if there is no such mapping.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        self.value_at(self.keys.index(key)?)
    }

    /// Returns a mutable reference to the value mapped to the key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let index = self.keys.index(key)?;
        self.values.get_mut(*index).and_then(Option::as_mut)
    }

    /// Returns true iff there is a mapping for the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        self.keys.contains(key)
    }

    /// Removes the mapping for the key and returns its value, or None if there was no mapping.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let (index, _) = self.keys.take(key)?;
        self.values[*index].take()
    }
}

impl<K, V, S: BuildHasher + Default> Default for Table<K, V, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for Table<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::Rng;

    use hashcons_utilities::random_test;

    use super::*;

    #[test]
    fn test_table_resize_keeps_mappings() {
        let mut table: Table<u64, String> = Table::with_capacity(16, 75);
        assert_eq!(table.capacity(), 16);

        for key in 0..20 {
            assert_eq!(table.insert(key, format!("value {key}")), None);
        }

        assert!(table.capacity() > 16, "Inserting 20 keys exceeds 75% of 16 slots");
        for key in 0..20 {
            assert_eq!(table.get(&key), Some(&format!("value {key}")));
        }
    }

    #[test]
    fn test_table_overwrite_and_remove() {
        let mut table: Table<&str, u32> = Table::new();

        assert_eq!(table.insert("a", 1), None);
        assert_eq!(table.insert("a", 2), Some(1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("a"), Some(&2));

        if let Some(value) = table.get_mut("a") {
            *value += 10;
        }
        assert_eq!(table.get("a"), Some(&12));

        assert_eq!(table.remove("a"), Some(12));
        assert_eq!(table.remove("a"), None);
        assert_eq!(table.get("a"), None);
        assert!(table.is_empty());

        // The recycled index must not expose the removed value.
        table.insert("b", 5);
        assert_eq!(table.values().copied().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_random_table() {
        random_test(100, |rng| {
            let mut table: Table<u32, u32> = Table::with_capacity(2, 60);
            let mut expected: HashMap<u32, u32> = HashMap::new();

            for _ in 0..200 {
                let key = rng.random_range(0..50);
                if rng.random_bool(0.3) {
                    assert_eq!(table.remove(&key), expected.remove(&key));
                } else {
                    let value = rng.random();
                    assert_eq!(table.insert(key, value), expected.insert(key, value));
                }
            }

            assert_eq!(table.len(), expected.len());
            for (key, value) in &expected {
                assert_eq!(table.get(key), Some(value));
            }

            let mut keys: Vec<u32> = table.keys().copied().collect();
            keys.sort();
            let mut expected_keys: Vec<u32> = expected.keys().copied().collect();
            expected_keys.sort();
            assert_eq!(keys, expected_keys);

            table.clear();
            assert!(table.is_empty());
            assert_eq!(table.keys().count(), 0);
        })
    }
}
