use std::fmt;
use std::hash::BuildHasher;
use std::hash::Hash;
use std::ops::Deref;
use std::ops::Index;

use hashbrown::Equivalent;
use rustc_hash::FxBuildHasher;

use hashcons_utilities::debug_trace;

/// The number of slots of a set created with [IndexedSet::new].
pub const DEFAULT_INITIAL_SIZE: usize = 16;

/// The load percentage above which a set created with [IndexedSet::new] doubles in size.
pub const DEFAULT_MAX_LOAD_PERCENT: usize = 75;

/// The dense index of an element in an [IndexedSet].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetIndex(usize);

impl Deref for SetIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for SetIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetIndex({})", self.0)
    }
}

impl fmt::Display for SetIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A set that assigns a unique, dense index to every element. Elements can be
/// looked up by index and indices by element.
///
/// The index of an element never changes while it is in the set. Removing an
/// element puts its index on a free list, and the most recently freed index is
/// handed out to the next new element.
///
/// The set is an open-addressed hash table with linear probing. Its slot array
/// has a power of two length and doubles whenever the number of elements
/// exceeds the maximum load percentage.
pub struct IndexedSet<T, S = FxBuildHasher> {
    /// The elements, at position equal to their index.
    elements: Vec<Element<T>>,
    /// The probing table, every occupied slot refers to a filled element.
    slots: Box<[Slot]>,
    /// The first free position in `elements`.
    free: Option<usize>,
    len: usize,
    tombstones: usize,
    max_load_percent: usize,
    hasher: S,
}

enum Element<T> {
    Filled { value: T, hash: u64 },
    Free(Option<usize>),
}

#[derive(Copy, Clone)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(usize),
}

impl<T, S: BuildHasher + Default> IndexedSet<T, S> {
    /// Creates an empty set with [DEFAULT_INITIAL_SIZE] slots and [DEFAULT_MAX_LOAD_PERCENT].
    pub fn new() -> IndexedSet<T, S> {
        Self::with_capacity(DEFAULT_INITIAL_SIZE, DEFAULT_MAX_LOAD_PERCENT)
    }

    /// Creates an empty set with at least `initial_size` slots that doubles in
    /// size when more than `max_load_percent` percent of its slots are in use.
    pub fn with_capacity(initial_size: usize, max_load_percent: usize) -> IndexedSet<T, S> {
        Self::with_capacity_and_hasher(initial_size, max_load_percent, S::default())
    }
}

impl<T, S> IndexedSet<T, S> {
    /// Same as [IndexedSet::with_capacity], but uses the given hasher.
    ///
    /// # Panics
    ///
    /// When `max_load_percent` is not in the range `1..=100`.
    pub fn with_capacity_and_hasher(initial_size: usize, max_load_percent: usize, hasher: S) -> IndexedSet<T, S> {
        assert!(
            (1..=100).contains(&max_load_percent),
            "The maximum load percentage must be between 1 and 100, got {max_load_percent}"
        );

        IndexedSet {
            elements: Vec::new(),
            slots: vec![Slot::Empty; initial_size.max(1).next_power_of_two()].into_boxed_slice(),
            free: None,
            len: 0,
            tombstones: 0,
            max_load_percent,
            hasher,
        }
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots of the hash table.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the load percentage above which the table doubles.
    pub fn max_load_percent(&self) -> usize {
        self.max_load_percent
    }

    /// Returns the element at the given index, if there is one.
    pub fn get(&self, index: SetIndex) -> Option<&T> {
        match self.elements.get(index.0) {
            Some(Element::Filled { value, .. }) => Some(value),
            _ => None,
        }
    }

    /// Removes all elements, keeping the current capacity. Indices start from zero again.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.slots.fill(Slot::Empty);
        self.free = None;
        self.len = 0;
        self.tombstones = 0;
    }

    /// Returns an iterator over the indices and elements, ordered by index.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            elements: self.elements.iter().enumerate(),
        }
    }

    /// Returns an iterator over the elements, ordered by index.
    pub fn elements(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter().map(|(_, element)| element)
    }

    /// Places the element in `elements`, reusing the most recently freed index.
    fn allocate(&mut self, value: T, hash: u64) -> usize {
        match self.free {
            Some(index) => {
                self.free = match &self.elements[index] {
                    Element::Free(next) => *next,
                    Element::Filled { .. } => panic!("The free list points to the filled element {index}"),
                };

                self.elements[index] = Element::Filled { value, hash };
                index
            }
            None => {
                self.elements.push(Element::Filled { value, hash });
                self.elements.len() - 1
            }
        }
    }

    /// Rebuilds the probing table with the given number of slots, dropping all tombstones.
    fn rebuild(&mut self, capacity: usize) {
        debug_trace!("Rebuilding indexed set from {} to {} slots", self.slots.len(), capacity);

        let mut slots = vec![Slot::Empty; capacity].into_boxed_slice();
        let mask = capacity - 1;
        for (index, element) in self.elements.iter().enumerate() {
            if let Element::Filled { hash, .. } = element {
                let mut position = *hash as usize & mask;
                while !matches!(slots[position], Slot::Empty) {
                    position = (position + 1) & mask;
                }

                slots[position] = Slot::Occupied(index);
            }
        }

        self.slots = slots;
        self.tombstones = 0;
    }

    /// Grows the table when the elements exceed the maximum load, or rebuilds
    /// it when the tombstones make probing too long.
    fn maintain_load(&mut self) {
        let capacity = self.slots.len();
        if self.len * 100 > capacity * self.max_load_percent || self.len == capacity {
            self.rebuild(capacity * 2);
        } else if (self.len + self.tombstones) * 100 > capacity * self.max_load_percent
            || self.len + self.tombstones == capacity
        {
            self.rebuild(capacity);
        }
    }
}

impl<T: Hash + Eq, S: BuildHasher> IndexedSet<T, S> {
    /// Inserts the given element into the set.
    ///
    /// Returns the index of the element and whether it was newly inserted. When
    /// an equal element is already present the given one is dropped.
    pub fn insert(&mut self, value: T) -> (SetIndex, bool) {
        let hash = self.hasher.hash_one(&value);

        match self.find(&value, hash) {
            Ok((_, index)) => (SetIndex(index), false),
            Err(position) => {
                let index = self.allocate(value, hash);
                if matches!(self.slots[position], Slot::Tombstone) {
                    self.tombstones -= 1;
                }

                self.slots[position] = Slot::Occupied(index);
                self.len += 1;
                self.maintain_load();

                (SetIndex(index), true)
            }
        }
    }

    /// Returns the index of the given element, or None if it is not in the set.
    pub fn index<Q>(&self, value: &Q) -> Option<SetIndex>
    where
        Q: Hash + Equivalent<T> + ?Sized,
    {
        let hash = self.hasher.hash_one(value);
        self.find(value, hash).ok().map(|(_, index)| SetIndex(index))
    }

    /// Returns true iff the set contains the given element.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        Q: Hash + Equivalent<T> + ?Sized,
    {
        self.index(value).is_some()
    }

    /// Removes the given element from the set, returns true iff it was present.
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        Q: Hash + Equivalent<T> + ?Sized,
    {
        self.take(value).is_some()
    }

    /// Removes the given element from the set and returns it together with the
    /// index it had.
    pub fn take<Q>(&mut self, value: &Q) -> Option<(SetIndex, T)>
    where
        Q: Hash + Equivalent<T> + ?Sized,
    {
        let hash = self.hasher.hash_one(value);
        let (position, index) = self.find(value, hash).ok()?;

        self.slots[position] = Slot::Tombstone;
        self.tombstones += 1;
        self.len -= 1;

        let element = std::mem::replace(&mut self.elements[index], Element::Free(self.free));
        self.free = Some(index);

        match element {
            Element::Filled { value, .. } => Some((SetIndex(index), value)),
            Element::Free(_) => panic!("Slot {position} refers to the free element {index}"),
        }
    }

    /// Returns `Ok((slot, index))` for the element equivalent to `value`, or
    /// `Err(slot)` with the slot where it should be inserted.
    fn find<Q>(&self, value: &Q, hash: u64) -> Result<(usize, usize), usize>
    where
        Q: Equivalent<T> + ?Sized,
    {
        let mask = self.slots.len() - 1;
        let mut position = hash as usize & mask;
        let mut first_tombstone = None;

        // Terminates since maintain_load keeps at least one slot empty.
        loop {
            match self.slots[position] {
                Slot::Empty => return Err(first_tombstone.unwrap_or(position)),
                Slot::Tombstone => {
                    first_tombstone.get_or_insert(position);
                }
                Slot::Occupied(index) => {
                    if let Element::Filled {
                        value: element,
                        hash: element_hash,
                    } = &self.elements[index]
                    {
                        if *element_hash == hash && value.equivalent(element) {
                            return Ok((position, index));
                        }
                    }
                }
            }

            position = (position + 1) & mask;
        }
    }
}

impl<T: Clone, S> IndexedSet<T, S> {
    /// Returns a vector containing all elements ordered by index.
    pub fn to_vec(&self) -> Vec<T> {
        self.elements().cloned().collect()
    }
}

impl<T, S: BuildHasher + Default> Default for IndexedSet<T, S> {
    fn default() -> IndexedSet<T, S> {
        IndexedSet::new()
    }
}

impl<T: fmt::Debug, S> fmt::Debug for IndexedSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter().map(|(index, value)| (index.0, value))).finish()
    }
}

impl<T, S> Index<SetIndex> for IndexedSet<T, S> {
    type Output = T;

    fn index(&self, index: SetIndex) -> &Self::Output {
        match self.get(index) {
            Some(value) => value,
            None => panic!("There is no element at index {index}"),
        }
    }
}

/// An iterator over the indices and elements of an [IndexedSet].
pub struct Iter<'a, T> {
    elements: std::iter::Enumerate<std::slice::Iter<'a, Element<T>>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (SetIndex, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        for (index, element) in self.elements.by_ref() {
            if let Element::Filled { value, .. } = element {
                return Some((SetIndex(index), value));
            }
        }

        None
    }
}

impl<'a, T, S> IntoIterator for &'a IndexedSet<T, S> {
    type Item = (SetIndex, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
