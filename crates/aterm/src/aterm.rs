use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;

use hashbrown::Equivalent;
use smallvec::SmallVec;

use crate::Symbol;
use crate::TermStore;
use crate::storage::NodeHead;
use crate::storage::TermIndex;
use crate::storage::TermPool;
use crate::symbol::write_symbol_name;

/// The kinds of terms in a [TermStore].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// An integer, see [Term::value].
    Int,
    /// The application of a function symbol to arguments, see [Term::symbol].
    Application,
    /// Either the empty list or a list cell, see [Term::head] and [Term::tail].
    List,
}

/// The interface shared by owned [ATerm]s and borrowed [ATermRef]s.
///
/// # Details
///
/// Only [Term::store], [Term::index] and [Term::copy] have to be implemented,
/// all other functions go through the borrowed term. The borrowed terms that
/// are returned live as long as the borrow of `self`, which is sound because a
/// term keeps a reference on each of its arguments.
pub trait Term {
    /// Returns the store that this term belongs to.
    fn store(&self) -> &TermStore;

    /// Returns the index of the term, which is unique within its store while the term is alive.
    fn index(&self) -> TermIndex;

    /// Returns a borrowed version of the term.
    fn copy(&self) -> ATermRef<'_>;

    /// Returns an owned version of the term.
    fn protect(&self) -> ATerm {
        self.copy().protect()
    }

    fn kind(&self) -> TermKind {
        self.copy().kind()
    }

    /// Returns the number of arguments, which is two for a list cell.
    fn arity(&self) -> usize {
        self.copy().arity()
    }

    /// Returns the argument at the given position, panics when it is out of range.
    fn arg(&self, position: usize) -> ATermRef<'_> {
        self.copy().arg(position)
    }

    /// Returns an iterator over the arguments.
    fn arguments(&self) -> ATermArgs<'_> {
        self.copy().arguments()
    }

    /// Returns the first element of a non-empty list.
    fn head(&self) -> ATermRef<'_> {
        self.copy().head()
    }

    /// Returns the remainder of a non-empty list.
    fn tail(&self) -> ATermRef<'_> {
        self.copy().tail()
    }

    /// Returns the value of an integer term.
    fn value(&self) -> i64 {
        self.copy().value()
    }

    /// Returns the function symbol of an application.
    fn symbol(&self) -> Symbol {
        self.copy().symbol()
    }

    fn is_int(&self) -> bool {
        self.copy().is_int()
    }

    fn is_application(&self) -> bool {
        self.copy().is_application()
    }

    /// Returns true iff the term is the empty list or a list cell.
    fn is_list(&self) -> bool {
        self.copy().is_list()
    }

    fn is_empty_list(&self) -> bool {
        self.copy().is_empty_list()
    }

    /// Returns an iterator over all subterms in preorder.
    fn iter(&self) -> TermIterator<'_> {
        self.copy().iter()
    }
}

/// A borrowed term, whose lifetime is bound by an owned term that keeps it alive.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ATermRef<'a> {
    store: &'a TermStore,
    index: TermIndex,
}

impl<'a> ATermRef<'a> {
    pub(crate) fn new(store: &'a TermStore, index: TermIndex) -> ATermRef<'a> {
        ATermRef { store, index }
    }

    pub fn store(self) -> &'a TermStore {
        self.store
    }

    pub fn index(self) -> TermIndex {
        self.index
    }

    /// Returns an owned term, which keeps the term alive after the borrow has ended.
    pub fn protect(self) -> ATerm {
        self.store.read().retain(self.index);
        ATerm::from_retained(self.store.clone(), self.index)
    }

    pub fn kind(self) -> TermKind {
        match self.node_head() {
            NodeHead::Int(_) => TermKind::Int,
            NodeHead::Application(_) => TermKind::Application,
            NodeHead::Cons | NodeHead::EmptyList => TermKind::List,
        }
    }

    pub fn arity(self) -> usize {
        self.store.read().arguments(self.index).len()
    }

    /// Returns the argument at the given position.
    ///
    /// # Panics
    ///
    /// When the position is not smaller than the arity.
    pub fn arg(self, position: usize) -> ATermRef<'a> {
        let argument = {
            let pool = self.store.read();
            let arguments = pool.arguments(self.index);
            arguments.get(position).copied().ok_or(arguments.len())
        };

        match argument {
            Ok(argument) => ATermRef::new(self.store, argument),
            Err(arity) => panic!(
                "Argument {position} is out of range for term {} with {arity} arguments",
                self.index
            ),
        }
    }

    pub fn arguments(self) -> ATermArgs<'a> {
        let arguments = SmallVec::from_slice(self.store.read().arguments(self.index));
        ATermArgs::new(self.store, arguments)
    }

    /// Returns the first element of the list.
    ///
    /// # Panics
    ///
    /// When the term is not a list cell.
    pub fn head(self) -> ATermRef<'a> {
        self.list_argument(0)
    }

    /// Returns the list without its first element.
    ///
    /// # Panics
    ///
    /// When the term is not a list cell.
    pub fn tail(self) -> ATermRef<'a> {
        self.list_argument(1)
    }

    /// Returns the value of the integer.
    ///
    /// # Panics
    ///
    /// When the term is not an integer.
    pub fn value(self) -> i64 {
        match self.node_head() {
            NodeHead::Int(value) => value,
            head => panic!("Term {} is not an integer, but {head:?}", self.index),
        }
    }

    /// Returns the function symbol of the application.
    ///
    /// # Panics
    ///
    /// When the term is not an application.
    pub fn symbol(self) -> Symbol {
        match self.node_head() {
            NodeHead::Application(symbol) => self.store.symbol_handle(symbol),
            head => panic!("Term {} is not an application, but {head:?}", self.index),
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self.node_head(), NodeHead::Int(_))
    }

    pub fn is_application(self) -> bool {
        matches!(self.node_head(), NodeHead::Application(_))
    }

    pub fn is_list(self) -> bool {
        matches!(self.node_head(), NodeHead::Cons | NodeHead::EmptyList)
    }

    pub fn is_empty_list(self) -> bool {
        self.node_head() == NodeHead::EmptyList
    }

    pub fn iter(self) -> TermIterator<'a> {
        TermIterator::new(self)
    }

    /// Returns the head and tail of a list cell, or None for any other term.
    pub(crate) fn list_cell(self) -> Option<(ATermRef<'a>, ATermRef<'a>)> {
        let pool = self.store.read();
        match pool.node(self.index).head() {
            NodeHead::Cons => {
                let cell = pool.arguments(self.index);
                Some((ATermRef::new(self.store, cell[0]), ATermRef::new(self.store, cell[1])))
            }
            _ => None,
        }
    }

    fn node_head(self) -> NodeHead {
        self.store.read().node(self.index).head()
    }

    fn list_argument(self, position: usize) -> ATermRef<'a> {
        let argument = {
            let pool = self.store.read();
            match pool.node(self.index).head() {
                NodeHead::Cons => Ok(pool.arguments(self.index)[position]),
                head => Err(head),
            }
        };

        match argument {
            Ok(argument) => ATermRef::new(self.store, argument),
            Err(head) => panic!("Term {} is not a non-empty list, but {head:?}", self.index),
        }
    }
}

impl Term for ATermRef<'_> {
    fn store(&self) -> &TermStore {
        self.store
    }

    fn index(&self) -> TermIndex {
        self.index
    }

    fn copy(&self) -> ATermRef<'_> {
        *self
    }
}

impl Hash for ATermRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state)
    }
}

impl PartialEq<ATerm> for ATermRef<'_> {
    fn eq(&self, other: &ATerm) -> bool {
        *self == other.copy()
    }
}

impl Equivalent<ATerm> for ATermRef<'_> {
    fn equivalent(&self, key: &ATerm) -> bool {
        *self == *key
    }
}

impl fmt::Display for ATermRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Rendered first so that no lock is held while writing to the formatter.
        let text = {
            let pool = self.store.read();
            let mut text = String::new();
            write_term(&mut text, &pool, self.index)?;
            text
        };

        f.write_str(&text)
    }
}

impl fmt::Debug for ATermRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// An owned term, which keeps one reference on the term in its store. Cloning
/// the term retains it and dropping releases it.
///
/// Equality, hashing and ordering use the identity of the term, which by
/// maximal sharing coincides with structural equality for terms of the same store.
pub struct ATerm {
    store: TermStore,
    index: TermIndex,
}

impl ATerm {
    /// Takes over a reference that has already been counted for this handle.
    pub(crate) fn from_retained(store: TermStore, index: TermIndex) -> ATerm {
        ATerm { store, index }
    }

    /// Returns a borrow of the term.
    pub fn get(&self) -> ATermRef<'_> {
        self.copy()
    }
}

impl Term for ATerm {
    fn store(&self) -> &TermStore {
        &self.store
    }

    fn index(&self) -> TermIndex {
        self.index
    }

    fn copy(&self) -> ATermRef<'_> {
        ATermRef::new(&self.store, self.index)
    }
}

impl Clone for ATerm {
    fn clone(&self) -> Self {
        self.store.read().retain(self.index);
        ATerm::from_retained(self.store.clone(), self.index)
    }
}

impl Drop for ATerm {
    fn drop(&mut self) {
        self.store.read().release(self.index);
    }
}

impl PartialEq for ATerm {
    fn eq(&self, other: &Self) -> bool {
        self.copy() == other.copy()
    }
}

impl PartialEq<ATermRef<'_>> for ATerm {
    fn eq(&self, other: &ATermRef<'_>) -> bool {
        self.copy() == *other
    }
}

impl Eq for ATerm {}

impl Hash for ATerm {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state)
    }
}

impl PartialOrd for ATerm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ATerm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index
            .cmp(&other.index)
            .then_with(|| self.store.address().cmp(&other.store.address()))
    }
}

impl fmt::Display for ATerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.copy())
    }
}

impl fmt::Debug for ATerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.copy())
    }
}

/// Blanket implementation allowing passing borrowed terms as references.
impl<T: Term + ?Sized> Term for &T {
    fn store(&self) -> &TermStore {
        (**self).store()
    }

    fn index(&self) -> TermIndex {
        (**self).index()
    }

    fn copy(&self) -> ATermRef<'_> {
        (**self).copy()
    }
}

/// A pending step of [write_term].
enum Pending {
    Term(TermIndex),
    Text(char),
}

/// Writes the term in the text format using an explicit stack, so that deeply
/// nested terms can be written.
fn write_term(f: &mut String, pool: &TermPool, index: TermIndex) -> fmt::Result {
    use std::fmt::Write;

    let mut stack = vec![Pending::Term(index)];

    while let Some(pending) = stack.pop() {
        let index = match pending {
            Pending::Text(c) => {
                f.write_char(c)?;
                continue;
            }
            Pending::Term(index) => index,
        };

        match pool.node(index).head() {
            NodeHead::Int(value) => write!(f, "{value}")?,
            NodeHead::Application(symbol) => {
                let symbol = pool.symbols().get(symbol);
                write_symbol_name(f, symbol.name(), symbol.is_quoted())?;

                let arguments = pool.arguments(index);
                if !arguments.is_empty() {
                    push_elements(&mut stack, ')', arguments.iter().copied());
                    f.write_char('(')?;
                }
            }
            NodeHead::Cons | NodeHead::EmptyList => {
                let mut elements = Vec::new();
                let mut current = index;
                while pool.node(current).head() == NodeHead::Cons {
                    let cell = pool.arguments(current);
                    elements.push(cell[0]);
                    current = cell[1];
                }

                push_elements(&mut stack, ']', elements);
                f.write_char('[')?;
            }
        }
    }

    Ok(())
}

/// Schedules the comma separated elements followed by the closing character.
fn push_elements<I>(stack: &mut Vec<Pending>, close: char, elements: I)
where
    I: IntoIterator<Item = TermIndex>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    stack.push(Pending::Text(close));

    let elements = elements.into_iter();
    let last = elements.len().saturating_sub(1);
    for (position, element) in elements.enumerate().rev() {
        if position < last {
            stack.push(Pending::Text(','));
        }
        stack.push(Pending::Term(element));
    }
}

/// An iterator over the arguments of a term.
pub struct ATermArgs<'a> {
    store: &'a TermStore,
    arguments: SmallVec<[TermIndex; 4]>,
    front: usize,
    back: usize,
}

impl<'a> ATermArgs<'a> {
    fn new(store: &'a TermStore, arguments: SmallVec<[TermIndex; 4]>) -> ATermArgs<'a> {
        let back = arguments.len();
        ATermArgs {
            store,
            arguments,
            front: 0,
            back,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.front == self.back
    }
}

impl<'a> Iterator for ATermArgs<'a> {
    type Item = ATermRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front < self.back {
            let argument = self.arguments[self.front];
            self.front += 1;
            Some(ATermRef::new(self.store, argument))
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for ATermArgs<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front < self.back {
            self.back -= 1;
            Some(ATermRef::new(self.store, self.arguments[self.back]))
        } else {
            None
        }
    }
}

impl ExactSizeIterator for ATermArgs<'_> {}

/// An iterator over all subterms of the given term in preorder traversal, i.e.,
/// for f(g(a), b) we visit f(g(a), b), g(a), a, b.
pub struct TermIterator<'a> {
    stack: Vec<ATermRef<'a>>,
}

impl<'a> TermIterator<'a> {
    pub fn new(term: ATermRef<'a>) -> TermIterator<'a> {
        TermIterator { stack: vec![term] }
    }
}

impl<'a> Iterator for TermIterator<'a> {
    type Item = ATermRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let term = self.stack.pop()?;
        self.stack.extend(term.arguments().rev());
        Some(term)
    }
}
