use std::fmt;
use std::ops::Deref;
use std::ops::Index;

use hashcons_utilities::GenerationCounter;
use hashcons_utilities::GenerationalIndex;

/// The index of an object in a [ProtectionSet]. Remembers the generation of
/// its slot, so an index that outlived its object is recognised as stale.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProtectionIndex(GenerationalIndex<usize>);

impl Deref for ProtectionIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for ProtectionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtectionIndex({:?})", self.0)
    }
}

impl fmt::Display for ProtectionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registry that assigns an index to every object added to it, and reuses
/// the indices of removed objects. Objects cannot be looked up by value.
///
/// Every operation that takes a [ProtectionIndex] panics when the index is not
/// registered, either because it was already removed or because its slot has
/// since been handed out to another object.
#[derive(Debug, Default)]
pub struct ProtectionSet<T> {
    roots: Vec<Entry<T>>,
    free: Option<usize>,
    number_of_insertions: u64,
    size: usize,
    generation_counter: GenerationCounter,
}

#[derive(Debug)]
enum Entry<T> {
    Filled(T),
    Free(Option<usize>),
}

impl<T> ProtectionSet<T> {
    /// Creates a new empty protection set.
    pub fn new() -> Self {
        ProtectionSet {
            roots: Vec::new(),
            free: None,
            number_of_insertions: 0,
            size: 0,
            generation_counter: GenerationCounter::new(),
        }
    }

    /// Returns the number of insertions into the protection set.
    pub fn number_of_insertions(&self) -> u64 {
        self.number_of_insertions
    }

    /// Returns the largest number of objects that were registered at the same time.
    pub fn maximum_size(&self) -> usize {
        self.roots.len()
    }

    /// Returns the number of registered objects.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns an iterator over all registered objects and their indices.
    pub fn iter(&self) -> ProtSetIter<'_, T> {
        ProtSetIter {
            current: 0,
            protection_set: self,
        }
    }

    /// Returns whether the index refers to a registered object. Never panics.
    pub fn contains_root(&self, index: ProtectionIndex) -> bool {
        self.get(index).is_some()
    }

    /// Returns the object registered at the index, or None when the index is stale.
    pub fn get(&self, index: ProtectionIndex) -> Option<&T> {
        if !self.generation_counter.is_current(index.0) {
            return None;
        }

        match self.roots.get(*index) {
            Some(Entry::Filled(object)) => Some(object),
            _ => None,
        }
    }

    /// Registers the object and returns its index.
    pub fn protect(&mut self, object: T) -> ProtectionIndex {
        self.number_of_insertions += 1;
        self.size += 1;

        let index = match self.free {
            Some(first) => {
                self.free = match &self.roots[first] {
                    Entry::Free(next) => *next,
                    Entry::Filled(_) => panic!("The free list should not point to a filled entry"),
                };

                self.roots[first] = Entry::Filled(object);
                first
            }
            None => {
                self.roots.push(Entry::Filled(object));
                self.roots.len() - 1
            }
        };

        ProtectionIndex(self.generation_counter.create_index(index))
    }

    /// Removes the object registered at the given index and returns it.
    ///
    /// # Panics
    ///
    /// When the index is not registered.
    pub fn unprotect(&mut self, index: ProtectionIndex) -> T {
        let position = self.registered_position(index);

        self.size -= 1;
        let entry = std::mem::replace(&mut self.roots[position], Entry::Free(self.free));
        self.free = Some(position);

        match entry {
            Entry::Filled(object) => object,
            Entry::Free(_) => panic!("Index {index} does not point to a filled entry"),
        }
    }

    /// Replaces the object registered at the given index, returning the previous one.
    ///
    /// # Panics
    ///
    /// When the index is not registered.
    pub fn replace(&mut self, index: ProtectionIndex, object: T) -> T {
        let position = self.registered_position(index);
        match std::mem::replace(&mut self.roots[position], Entry::Filled(object)) {
            Entry::Filled(previous) => previous,
            Entry::Free(_) => panic!("Index {index} does not point to a filled entry"),
        }
    }

    /// Returns the position of a registered index, panics otherwise.
    fn registered_position(&self, index: ProtectionIndex) -> usize {
        let position = self.generation_counter.get_index(index.0);
        if !matches!(self.roots.get(position), Some(Entry::Filled(_))) {
            panic!("Index {index} is not registered in the protection set");
        }

        position
    }
}

impl<T> Index<ProtectionIndex> for ProtectionSet<T> {
    type Output = T;

    fn index(&self, index: ProtectionIndex) -> &Self::Output {
        match self.get(index) {
            Some(object) => object,
            None => panic!("Index {index} is not registered in the protection set"),
        }
    }
}

pub struct ProtSetIter<'a, T> {
    current: usize,
    protection_set: &'a ProtectionSet<T>,
}

impl<'a, T> Iterator for ProtSetIter<'a, T> {
    type Item = (ProtectionIndex, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while self.current < self.protection_set.roots.len() {
            let idx = self.current;
            self.current += 1;

            if let Entry::Filled(object) = &self.protection_set.roots[idx] {
                let index = ProtectionIndex(self.protection_set.generation_counter.recall_index(idx));
                return Some((index, object));
            }
        }

        None
    }
}

impl<'a, T> IntoIterator for &'a ProtectionSet<T> {
    type Item = (ProtectionIndex, &'a T);
    type IntoIter = ProtSetIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use hashcons_utilities::random_test;
    use hashcons_utilities::test_logger;

    use super::*;

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_random_protection_set() {
        random_test(100, |rng| {
            let mut protection_set = ProtectionSet::<usize>::new();

            let mut indices: Vec<ProtectionIndex> = Vec::new();
            for _ in 0..5000 {
                indices.push(protection_set.protect(rng.random_range(0..1000)));
            }

            for _ in 0..2500 {
                let index = indices.swap_remove(rng.random_range(0..indices.len()));
                assert!(protection_set.unprotect(index) < 1000);
                assert!(!protection_set.contains_root(index));
            }

            // Protect more to exercise the free list.
            for _ in 0..1000 {
                indices.push(protection_set.protect(rng.random_range(0..1000)));
            }

            for index in &indices {
                assert!(
                    protection_set.contains_root(*index),
                    "All indices that are not unprotected should occur in the protection set"
                );
            }

            assert_eq!(protection_set.iter().count(), 6000 - 2500);
            assert_eq!(protection_set.len(), 6000 - 2500);
            assert_eq!(protection_set.number_of_insertions(), 6000);
            assert_eq!(protection_set.maximum_size(), 5000);
        });
    }

    #[test]
    fn test_protection_set_basic() {
        test_logger();

        let mut set = ProtectionSet::<String>::new();

        let idx1 = set.protect(String::from("value1"));
        let idx2 = set.protect(String::from("value2"));

        assert!(set.contains_root(idx1));
        assert_eq!(set[idx1], "value1");
        assert_eq!(set[idx2], "value2");

        assert_eq!(set.replace(idx2, String::from("value2b")), "value2");
        assert_eq!(set[idx2], "value2b");

        assert_eq!(set.unprotect(idx1), "value1");
        assert!(!set.contains_root(idx1));
        assert!(set.contains_root(idx2));

        // The freed slot is reused, the old index stays invalid.
        let idx3 = set.protect(String::from("value3"));
        assert_eq!(*idx3, *idx1);
        assert!(!set.contains_root(idx1));
        assert_eq!(set[idx3], "value3");
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_protection_set_double_unprotect() {
        let mut set = ProtectionSet::<u32>::new();
        let index = set.protect(1);
        set.unprotect(index);
        set.unprotect(index);
    }

    #[test]
    #[should_panic(expected = "invalid index")]
    fn test_protection_set_stale_index() {
        let mut set = ProtectionSet::<u32>::new();
        let index = set.protect(1);
        set.unprotect(index);
        let _ = set.protect(2);

        set.replace(index, 3);
    }
}
