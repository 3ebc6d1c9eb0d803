//!
//! Lists of terms, built from list cells that end in the empty list.
//!
#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use delegate::delegate;
use itertools::Itertools;

use crate::ATerm;
use crate::ATermRef;
use crate::Term;
use crate::TermStore;
use crate::storage::TermIndex;

/// A term that is known to be a list.
///
/// # Details
///
/// A list is either the empty list `[]` or a list cell with a head and a tail,
/// where the tail is again a list. Operations never modify a list, but return
/// a new list that shares the unchanged suffix with the original.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ATermList {
    term: ATerm,
}

impl ATermList {
    /// Returns the empty list of the store.
    pub fn empty(store: &TermStore) -> ATermList {
        ATermList {
            term: store.empty_list(),
        }
    }

    /// Constructs the list with the given elements, in order.
    pub fn from_terms<T: Term>(store: &TermStore, elements: impl IntoIterator<Item = T>) -> ATermList {
        let elements = elements.into_iter().collect_vec();
        Self::with_prefix(store, &elements, store.empty_list())
    }

    /// Returns the list with the given element inserted at the front.
    pub fn cons(&self, element: &impl Term) -> ATermList {
        ATermList {
            term: self.store().cons(element, &self.term),
        }
    }

    /// Returns the first element, or None for the empty list.
    pub fn head(&self) -> Option<ATerm> {
        self.term.copy().list_cell().map(|(head, _)| head.protect())
    }

    /// Returns the list without its first element, or None for the empty list.
    pub fn tail(&self) -> Option<ATermList> {
        self.term
            .copy()
            .list_cell()
            .map(|(_, tail)| ATermList { term: tail.protect() })
    }

    /// Returns the number of elements, which takes linear time.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.term.is_empty_list()
    }

    /// Returns an iterator over the elements of the list.
    pub fn iter(&self) -> ATermListIter<'_> {
        ATermListIter {
            current: self.term.copy(),
        }
    }

    pub fn to_vec(&self) -> Vec<ATerm> {
        self.iter().map(|element| element.protect()).collect()
    }

    /// Returns the list with the given element added at the end.
    pub fn append(&self, element: &impl Term) -> ATermList {
        let elements = self.iter().collect_vec();
        let last = self.store().cons(element, &self.store().empty_list());
        Self::with_prefix(self.store(), &elements, last)
    }

    /// Returns the elements of this list followed by the elements of the other list.
    pub fn concat(&self, other: &ATermList) -> ATermList {
        let elements = self.iter().collect_vec();
        Self::with_prefix(self.store(), &elements, other.term.clone())
    }

    pub fn reverse(&self) -> ATermList {
        let mut result = ATermList::empty(self.store());
        for element in self.iter() {
            result = result.cons(&element);
        }

        result
    }

    /// Returns the element at the given position, or None when the list is shorter.
    pub fn element_at(&self, position: usize) -> Option<ATermRef<'_>> {
        self.iter().nth(position)
    }

    /// Returns the position of the first occurrence of the term at or after `start`.
    pub fn index_of(&self, term: &impl Term, start: usize) -> Option<usize> {
        let term = term.copy();
        self.iter()
            .enumerate()
            .skip(start)
            .find_map(|(position, element)| (element == term).then_some(position))
    }

    /// Returns the list without the first occurrence of the term. The list is
    /// returned unchanged when the term does not occur.
    pub fn remove_element(&self, term: &impl Term) -> ATermList {
        match self.index_of(term, 0) {
            Some(position) => self.remove_element_at(position),
            None => self.clone(),
        }
    }

    /// Returns the list without the element at the given position.
    ///
    /// # Panics
    ///
    /// When the position is not smaller than the length.
    pub fn remove_element_at(&self, position: usize) -> ATermList {
        let (prefix, suffix) = self.split_at(position);
        let Some(rest) = suffix.tail() else {
            panic!("Position {position} is out of range for a list of length {}", prefix.len());
        };

        Self::with_prefix(self.store(), &prefix, rest.term)
    }

    /// Returns the list in which the element at the given position is replaced by the term.
    ///
    /// # Panics
    ///
    /// When the position is not smaller than the length.
    pub fn replace_at(&self, position: usize, term: &impl Term) -> ATermList {
        let (prefix, suffix) = self.split_at(position);
        let Some(rest) = suffix.tail() else {
            panic!("Position {position} is out of range for a list of length {}", prefix.len());
        };

        Self::with_prefix(self.store(), &prefix, rest.cons(term).term)
    }

    /// Returns the elements at the positions `start..end`, where `end` is
    /// limited to the length of the list.
    ///
    /// # Panics
    ///
    /// When `start` is larger than `end`.
    pub fn slice(&self, start: usize, end: usize) -> ATermList {
        assert!(start <= end, "The slice {start}..{end} is empty");
        let elements = self.iter().skip(start).take(end - start).collect_vec();
        Self::with_prefix(self.store(), &elements, self.store().empty_list())
    }

    /// Returns the suffix of the list that starts at the given position, which
    /// shares all its cells with this list.
    ///
    /// # Panics
    ///
    /// When the position is larger than the length.
    pub fn tail_from(&self, start: usize) -> ATermList {
        let (prefix, suffix) = self.split_at(start);
        assert!(
            prefix.len() == start,
            "Position {start} is out of range for a list of length {}",
            prefix.len()
        );

        suffix
    }

    /// Returns the elements sorted by the comparison, the sort is stable.
    pub fn sort_by<F>(&self, mut compare: F) -> ATermList
    where
        F: FnMut(&ATermRef<'_>, &ATermRef<'_>) -> Ordering,
    {
        let mut elements = self.iter().collect_vec();
        elements.sort_by(|left, right| compare(left, right));
        Self::with_prefix(self.store(), &elements, self.store().empty_list())
    }

    /// Returns the first `position` elements, or fewer when the list is
    /// shorter, together with the remainder of the list.
    fn split_at(&self, position: usize) -> (Vec<ATermRef<'_>>, ATermList) {
        let mut prefix = Vec::with_capacity(position);
        let mut current = self.term.copy();

        while prefix.len() < position {
            match current.list_cell() {
                Some((head, tail)) => {
                    prefix.push(head);
                    current = tail;
                }
                None => break,
            }
        }

        (prefix, ATermList { term: current.protect() })
    }

    /// Puts the elements in front of the given list.
    fn with_prefix<T: Term>(store: &TermStore, prefix: &[T], tail: ATerm) -> ATermList {
        let mut term = tail;
        for element in prefix.iter().rev() {
            term = store.cons(element, &term);
        }

        ATermList { term }
    }
}

impl Term for ATermList {
    delegate! {
        to self.term {
            fn store(&self) -> &TermStore;
            fn index(&self) -> TermIndex;
            fn copy(&self) -> ATermRef<'_>;
        }
    }
}

impl From<ATerm> for ATermList {
    fn from(term: ATerm) -> Self {
        assert!(term.is_list(), "Term {term} is not a list");
        ATermList { term }
    }
}

impl From<ATermList> for ATerm {
    fn from(list: ATermList) -> Self {
        list.term
    }
}

impl<'a> IntoIterator for &'a ATermList {
    type Item = ATermRef<'a>;
    type IntoIter = ATermListIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for ATermList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.term)
    }
}

impl fmt::Debug for ATermList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}]", self.iter().format(", "))
    }
}

/// The iterator over the elements of an [ATermList].
pub struct ATermListIter<'a> {
    current: ATermRef<'a>,
}

impl<'a> Iterator for ATermListIter<'a> {
    type Item = ATermRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (head, tail) = self.current.list_cell()?;
        self.current = tail;
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use hashcons_utilities::random_test;

    use crate::StoreConfig;

    use super::*;

    fn manual_store() -> TermStore {
        TermStore::with_config(StoreConfig {
            automatic_reclamation: false,
            ..StoreConfig::default()
        })
    }

    fn ints(store: &TermStore, values: &[i64]) -> ATermList {
        ATermList::from_terms(store, values.iter().map(|value| store.int(*value)))
    }

    fn values(list: &ATermList) -> Vec<i64> {
        list.iter().map(|element| element.value()).collect()
    }

    #[test]
    fn test_list_term() {
        let store = manual_store();
        let list = ints(&store, &[1, 2, 3]);

        assert_eq!(list.head().map(|head| head.value()), Some(1));
        let tail = list.tail().unwrap();
        assert_eq!(tail.head().map(|head| head.value()), Some(2));
        assert_eq!(list.len(), 3);
        assert!(!list.is_empty());
        assert!(ATermList::empty(&store).head().is_none());
        assert_eq!(list.to_string(), "[1,2,3]");
        assert_eq!(format!("{list:?}"), "[1, 2, 3]");
        assert_eq!(list.cons(&store.int(0)), ints(&store, &[0, 1, 2, 3]));
    }

    #[test]
    fn test_list_operations() {
        let store = manual_store();
        let list = ints(&store, &[1, 2, 3, 2]);

        assert_eq!(values(&list.append(&store.int(5))), [1, 2, 3, 2, 5]);
        assert_eq!(values(&list.concat(&ints(&store, &[7, 8]))), [1, 2, 3, 2, 7, 8]);
        assert_eq!(values(&list.reverse()), [2, 3, 2, 1]);
        assert_eq!(list.element_at(2).map(|element| element.value()), Some(3));
        assert!(list.element_at(4).is_none());

        let two = store.int(2);
        assert_eq!(list.index_of(&two, 0), Some(1));
        assert_eq!(list.index_of(&two, 2), Some(3));
        assert_eq!(list.index_of(&store.int(9), 0), None);

        assert_eq!(values(&list.remove_element(&two)), [1, 3, 2]);
        assert_eq!(list.remove_element(&store.int(9)), list);
        assert_eq!(values(&list.remove_element_at(0)), [2, 3, 2]);
        assert_eq!(values(&list.replace_at(3, &store.int(4))), [1, 2, 3, 4]);
        assert_eq!(values(&list.slice(1, 3)), [2, 3]);
        assert_eq!(values(&list.slice(2, 10)), [3, 2]);
        assert_eq!(values(&list.tail_from(2)), [3, 2]);
        assert!(list.tail_from(4).is_empty());
        assert_eq!(
            values(&list.sort_by(|left, right| left.value().cmp(&right.value()))),
            [1, 2, 2, 3]
        );
    }

    #[test]
    fn test_list_suffix_is_shared() {
        let store = manual_store();
        let list = ints(&store, &[1, 2, 3, 4]);
        let terms = store.len();

        let updated = list.replace_at(1, &store.int(2));
        assert_eq!(updated, list);

        // Only the cells in front of the replaced element are new.
        let _updated = list.replace_at(1, &store.int(9));
        assert_eq!(store.len(), terms + 3);
    }

    #[test]
    fn test_random_list_operations() {
        random_test(100, |rng| {
            let store = manual_store();
            let elements: Vec<i64> = (0..rng.random_range(1..20)).map(|_| rng.random_range(0..5)).collect();
            let list = ints(&store, &elements);

            let position = rng.random_range(0..elements.len());
            let mut expected = elements.clone();
            expected.remove(position);
            assert_eq!(values(&list.remove_element_at(position)), expected);

            let mut expected = elements.clone();
            expected.reverse();
            assert_eq!(values(&list.reverse()), expected);

            let mut expected = elements.clone();
            expected.sort();
            assert_eq!(values(&list.sort_by(|left, right| left.value().cmp(&right.value()))), expected);
        });
    }

    #[test]
    fn test_arguments_as_list() {
        let store = manual_store();
        let f = store.symbol("f", 3);
        let term = store.application(&f, &[store.int(1), store.int(2), store.int(3)]);

        let list = store.arguments_list(&term);
        assert_eq!(values(&list), [1, 2, 3]);
        assert_eq!(store.application_from_list(&f, &list), term);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_remove_out_of_range() {
        let store = manual_store();
        ints(&store, &[1]).remove_element_at(1);
    }

    #[test]
    #[should_panic(expected = "is not a list")]
    fn test_list_from_non_list() {
        let store = manual_store();
        let _ = ATermList::from(store.int(1));
    }
}
