#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;
use std::sync::LazyLock;

use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use parking_lot::RwLockWriteGuard;
use smallvec::SmallVec;

use crate::ATerm;
use crate::ATermList;
use crate::Symbol;
use crate::Term;
use crate::storage::NodeHead;
use crate::storage::RootIndex;
use crate::storage::SymbolId;
use crate::storage::TermIndex;
use crate::storage::TermPool;
use crate::storage::TermPoolMetrics;

/// The process-wide store returned by [TermStore::global].
static GLOBAL_TERM_STORE: LazyLock<TermStore> = LazyLock::new(TermStore::new);

/// The settings of a [TermStore].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// The initial number of buckets, rounded up to a power of two.
    pub initial_buckets: usize,
    /// The number of buckets doubles when the number of terms exceeds this percentage of the buckets.
    pub max_load_percent: usize,
    /// Whether reclamation runs periodically during construction.
    pub automatic_reclamation: bool,
    /// The number of new terms after which automatic reclamation runs. Afterwards
    /// the countdown restarts at the larger of this value and the number of live
    /// terms, so that the cost of reclamation is amortised. An interval of one
    /// reclaims before every new term.
    pub reclaim_interval: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            initial_buckets: 1024,
            max_load_percent: 75,
            automatic_reclamation: true,
            reclaim_interval: 1000,
        }
    }
}

/// A handle to a store of maximally shared terms. Cloning the handle is cheap
/// and all clones refer to the same store.
///
/// Constructions, interning of new symbols, root registration and reclamation
/// take the write lock of the store. Inspection of terms and adjusting
/// reference counts only take the read lock.
#[derive(Clone)]
pub struct TermStore {
    shared: Arc<RwLock<TermPool>>,
}

impl TermStore {
    /// Creates a new store with the default configuration.
    pub fn new() -> TermStore {
        TermStore::with_config(StoreConfig::default())
    }

    /// Creates a new store with the given configuration.
    ///
    /// # Panics
    ///
    /// When the maximum load percentage is not in the range `1..=100`.
    pub fn with_config(config: StoreConfig) -> TermStore {
        TermStore {
            shared: Arc::new(RwLock::new(TermPool::new(config))),
        }
    }

    /// Returns the store shared by the whole process, created on first use.
    pub fn global() -> &'static TermStore {
        &GLOBAL_TERM_STORE
    }

    /// Returns true iff both handles refer to the same store.
    pub fn same_store(&self, other: &TermStore) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Creates or retrieves the unquoted function symbol with the given name and arity.
    pub fn symbol(&self, name: &str, arity: usize) -> Symbol {
        self.create_symbol(name, arity, false)
    }

    /// Creates or retrieves a function symbol whose name is printed between double quotes.
    pub fn quoted_symbol(&self, name: &str, arity: usize) -> Symbol {
        self.create_symbol(name, arity, true)
    }

    /// Creates or retrieves the function symbol with the given name, arity and quotation.
    pub fn create_symbol(&self, name: &str, arity: usize, quoted: bool) -> Symbol {
        let existing = {
            let pool = self.read();
            pool.symbols().lookup(name, arity, quoted).map(|id| {
                pool.symbols().retain(id);
                (id, pool.symbols().get(id).name().clone())
            })
        };

        let (id, name) = match existing {
            Some(existing) => existing,
            None => {
                let mut pool = self.write();
                let id = pool.symbols_mut().intern(name, arity, quoted);
                pool.symbols().retain(id);
                (id, pool.symbols().get(id).name().clone())
            }
        };

        Symbol::from_retained(self.clone(), id, name, arity, quoted)
    }

    /// Returns the name of the symbol in the given slot.
    ///
    /// # Panics
    ///
    /// When the slot is free. A slot that has been reused returns the name of the new symbol.
    pub fn symbol_name(&self, id: SymbolId) -> Arc<str> {
        self.read().symbols().get(id).name().clone()
    }

    /// Returns the arity of the symbol in the given slot, see [TermStore::symbol_name].
    pub fn symbol_arity(&self, id: SymbolId) -> usize {
        self.read().symbols().get(id).arity()
    }

    /// Returns whether the symbol in the given slot is quoted, see [TermStore::symbol_name].
    pub fn symbol_is_quoted(&self, id: SymbolId) -> bool {
        self.read().symbols().get(id).is_quoted()
    }

    /// Creates the term representing the given integer.
    pub fn int(&self, value: i64) -> ATerm {
        self.construct(NodeHead::Int(value), &[])
    }

    /// Creates the application of the symbol to the given arguments.
    ///
    /// # Panics
    ///
    /// When the number of arguments differs from the arity of the symbol, or
    /// when the symbol or an argument belongs to another store.
    pub fn application(&self, symbol: &Symbol, arguments: &[impl Term]) -> ATerm {
        self.check_symbol(symbol);

        let indices: SmallVec<[TermIndex; 8]> = arguments
            .iter()
            .map(|argument| {
                self.check_term(argument);
                argument.index()
            })
            .collect();

        self.construct(NodeHead::Application(symbol.id()), &indices)
    }

    /// Creates the application of the symbol to the arguments produced by the iterator.
    pub fn application_iter<I, T>(&self, symbol: &Symbol, arguments: I) -> ATerm
    where
        I: IntoIterator<Item = T>,
        T: Term,
    {
        let arguments: SmallVec<[T; 8]> = arguments.into_iter().collect();
        self.application(symbol, arguments.as_slice())
    }

    /// Creates the application of a symbol without arguments.
    pub fn constant(&self, symbol: &Symbol) -> ATerm {
        self.application(symbol, &[] as &[ATerm])
    }

    /// Creates the application of the symbol to the elements of the list.
    pub fn application_from_list(&self, symbol: &Symbol, list: &ATermList) -> ATerm {
        self.application_iter(symbol, list.iter())
    }

    /// Returns the arguments of the term as a list.
    pub fn arguments_list(&self, term: &impl Term) -> ATermList {
        self.check_term(term);
        ATermList::from_terms(self, term.arguments())
    }

    /// Returns the empty list.
    pub fn empty_list(&self) -> ATerm {
        let pool = self.read();
        let index = pool.empty_list();
        pool.retain(index);
        drop(pool);

        ATerm::from_retained(self.clone(), index)
    }

    /// Creates the list with the given head and tail.
    ///
    /// # Panics
    ///
    /// When the tail is not a list.
    pub fn cons(&self, head: &impl Term, tail: &impl Term) -> ATerm {
        self.check_term(head);
        self.check_term(tail);
        self.construct(NodeHead::Cons, &[head.index(), tail.index()])
    }

    /// Returns the term equal to `term`, except that the argument at `position` is `argument`.
    ///
    /// # Panics
    ///
    /// When `position` is not smaller than the arity of the term.
    pub fn set_argument(&self, term: &impl Term, position: usize, argument: &impl Term) -> ATerm {
        self.check_term(term);
        self.check_term(argument);

        let index = self.write().set_argument(term.index(), position, argument.index());
        ATerm::from_retained(self.clone(), index)
    }

    /// Increments the reference count of the term. Must be balanced by a call to [TermStore::release].
    pub fn retain(&self, term: &impl Term) {
        self.check_term(term);
        self.read().retain(term.index());
    }

    /// Decrements the reference count of the term.
    ///
    /// # Panics
    ///
    /// When the reference count drops below zero.
    pub fn release(&self, term: &impl Term) {
        self.check_term(term);
        self.read().release(term.index());
    }

    /// Returns the reference count of the term, which counts handles, parent terms and explicit retains.
    pub fn reference_count(&self, term: &impl Term) -> usize {
        self.check_term(term);
        self.read().node(term.index()).reference_count()
    }

    /// Registers the term as a root. The term is not reclaimed, even without
    /// handles, until the root is removed with [TermStore::unprotect].
    pub fn protect(&self, term: &impl Term) -> RootIndex {
        self.check_term(term);
        self.write().protect(term.index())
    }

    /// Removes the root.
    ///
    /// # Panics
    ///
    /// When the root is not registered, which includes roots that were already removed.
    pub fn unprotect(&self, root: RootIndex) {
        self.write().unprotect(root);
    }

    /// Lets the root refer to the given term instead.
    ///
    /// # Panics
    ///
    /// When the root is not registered.
    pub fn replace_root(&self, root: RootIndex, term: &impl Term) {
        self.check_term(term);
        self.write().replace_root(root, term.index());
    }

    /// Returns a handle to the term the root refers to.
    ///
    /// # Panics
    ///
    /// When the root is not registered.
    pub fn root_term(&self, root: RootIndex) -> ATerm {
        let pool = self.read();
        let index = pool.root(root);
        pool.retain(index);
        drop(pool);

        ATerm::from_retained(self.clone(), index)
    }

    /// Frees all terms without references that are not roots, returns the number of freed terms.
    pub fn reclaim(&self) -> usize {
        self.write().reclaim()
    }

    /// Enables or disables automatic reclamation during construction.
    pub fn set_automatic_reclamation(&self, enabled: bool) {
        self.write().set_automatic_reclamation(enabled);
    }

    /// Returns the configuration of the store.
    pub fn config(&self) -> StoreConfig {
        *self.read().config()
    }

    /// Returns the number of terms in the store, including the empty list and
    /// unreferenced terms that have not been reclaimed yet.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Always false, since the store contains at least the empty list.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns the number of function symbols.
    pub fn symbol_count(&self) -> usize {
        self.read().symbols().len()
    }

    /// Returns the number of registered roots.
    pub fn root_count(&self) -> usize {
        self.read().root_count()
    }

    /// Returns the number of buckets of the hash table.
    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    /// Returns the metrics of the store, can be formatted and written to output.
    pub fn metrics(&self) -> TermPoolMetrics {
        self.read().metrics()
    }

    /// Identifies the store, used to order terms of different stores.
    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.shared) as *const () as usize
    }

    /// Takes the read lock. Never hold it while creating or dropping handles.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, TermPool> {
        self.shared.read_recursive()
    }

    /// Takes the write lock.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, TermPool> {
        self.shared.write()
    }

    /// Returns a new handle for the symbol in the given slot.
    pub(crate) fn symbol_handle(&self, id: SymbolId) -> Symbol {
        let pool = self.read();
        let symbol = pool.symbols().get(id);
        let (name, arity, quoted) = (symbol.name().clone(), symbol.arity(), symbol.is_quoted());
        pool.symbols().retain(id);
        drop(pool);

        Symbol::from_retained(self.clone(), id, name, arity, quoted)
    }

    /// Decrements the reference count of the symbol and frees it when it becomes unreferenced.
    pub(crate) fn release_symbol(&self, id: SymbolId) {
        let unused = self.read().symbols().release(id);
        if unused {
            // The symbol may have been looked up again in the meantime.
            self.write().symbols_mut().free_if_unused(id);
        }
    }

    fn construct(&self, head: NodeHead, arguments: &[TermIndex]) -> ATerm {
        let index = self.write().find_or_insert(head, arguments);
        ATerm::from_retained(self.clone(), index)
    }

    fn check_term(&self, term: &impl Term) {
        assert!(self.same_store(term.store()), "Term {} belongs to another store", term.index());
    }

    fn check_symbol(&self, symbol: &Symbol) {
        assert!(
            self.same_store(symbol.store()),
            "Symbol {} belongs to another store",
            symbol.name()
        );
    }
}

impl Default for TermStore {
    fn default() -> Self {
        TermStore::new()
    }
}

impl PartialEq for TermStore {
    fn eq(&self, other: &Self) -> bool {
        self.same_store(other)
    }
}

impl Eq for TermStore {}

impl fmt::Debug for TermStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TermStore({})", self.metrics())
    }
}
