//! Indices that remember the generation of the slot they were handed out for,
//! so that using an index after its slot was recycled is detected.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::ops::Deref;

/// An index together with the generation of the slot it refers to.
///
/// The generation is always tracked: handing a stale index back to a
/// [GenerationCounter] is a programming error and panics, also in release builds.
#[derive(Copy, Clone)]
pub struct GenerationalIndex<I: Copy + Into<usize> = usize> {
    index: I,
    generation: u32,
}

impl<I: Copy + Into<usize>> Deref for GenerationalIndex<I> {
    type Target = I;

    fn deref(&self) -> &Self::Target {
        &self.index
    }
}

impl<I: Copy + Into<usize>> GenerationalIndex<I> {
    /// Returns the generation of the slot at the moment this index was created.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Keeps track of the current generation of every slot.
#[derive(Clone, Debug, Default)]
pub struct GenerationCounter {
    current_generation: Vec<u32>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index for the given slot, starting a new generation when the slot was used before.
    pub fn create_index<I>(&mut self, index: I) -> GenerationalIndex<I>
    where
        I: Copy + Into<usize>,
    {
        let slot = index.into();
        let generation = if self.current_generation.len() <= slot {
            self.current_generation.resize(slot + 1, 0);
            0
        } else {
            let generation = &mut self.current_generation[slot];
            *generation = generation.wrapping_add(1);
            *generation
        };

        GenerationalIndex { index, generation }
    }

    /// Returns an index for the given slot with its current generation.
    pub fn recall_index<I>(&self, index: I) -> GenerationalIndex<I>
    where
        I: Copy + Into<usize>,
    {
        GenerationalIndex {
            index,
            generation: self.current_generation[index.into()],
        }
    }

    /// Returns true iff the index belongs to the current generation of its slot.
    pub fn is_current<I>(&self, index: GenerationalIndex<I>) -> bool
    where
        I: Copy + Into<usize>,
    {
        self.current_generation
            .get(index.index.into())
            .is_some_and(|generation| *generation == index.generation)
    }

    /// Returns the underlying index.
    ///
    /// # Panics
    ///
    /// When the slot has been handed out again since the index was created.
    pub fn get_index<I>(&self, index: GenerationalIndex<I>) -> I
    where
        I: Copy + Into<usize> + fmt::Debug,
    {
        if !self.is_current(index) {
            panic!("Attempting to access an invalid index: {index:?}");
        }

        index.index
    }
}

impl<I> PartialEq for GenerationalIndex<I>
where
    I: Copy + Into<usize> + Eq,
{
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<I> Eq for GenerationalIndex<I> where I: Copy + Into<usize> + Eq {}

impl<I> Hash for GenerationalIndex<I>
where
    I: Copy + Into<usize> + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<I> fmt::Debug for GenerationalIndex<I>
where
    I: Copy + Into<usize> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GenerationalIndex(index: {:?}, generation: {})",
            self.index, self.generation
        )
    }
}

impl fmt::Display for GenerationalIndex<usize> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generational_index_equality() {
        let mut counter = GenerationCounter::new();
        let idx1 = counter.create_index(42usize);
        let idx2 = counter.create_index(42usize);
        let idx3 = counter.recall_index(42usize);
        let idx4 = counter.create_index(43usize);

        assert_ne!(idx1, idx2);
        assert_eq!(idx2, idx3);
        assert_ne!(idx2, idx4);
        assert_eq!(*idx1, *idx2);
    }

    #[test]
    fn test_generational_index_current() {
        let mut counter = GenerationCounter::new();
        let old = counter.create_index(3usize);
        assert!(counter.is_current(old));
        assert_eq!(counter.get_index(old), 3);

        let new = counter.create_index(3usize);
        assert!(!counter.is_current(old));
        assert!(counter.is_current(new));
    }

    #[test]
    #[should_panic(expected = "invalid index")]
    fn test_generational_index_stale() {
        let mut counter = GenerationCounter::new();
        let old = counter.create_index(0usize);
        let _ = counter.create_index(0usize);

        counter.get_index(old);
    }
}
