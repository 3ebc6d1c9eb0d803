#![forbid(unsafe_code)]

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::time::Instant;

use log::debug;
use rustc_hash::FxHasher;
use smallvec::SmallVec;

use hashcons_collections::ProtectionIndex;
use hashcons_collections::ProtectionSet;
use hashcons_utilities::LargeFormatter;
use hashcons_utilities::debug_trace;

use crate::StoreConfig;
use crate::storage::Node;
use crate::storage::NodeHead;
use crate::storage::NodePool;
use crate::storage::SymbolPool;
use crate::storage::TermIndex;

/// The index of a registered root, see [TermPool::protect].
pub type RootIndex = ProtectionIndex;

/// The unique table of all terms, together with the function symbols and the
/// registered roots.
///
/// Every node is linked into the chain of the bucket selected by its hash. A
/// node holds a reference on each of its arguments and on its function symbol,
/// so a node with reference count zero is not reachable from any handle or
/// other node. Reclamation frees these nodes, unless they are registered as a root.
pub struct TermPool {
    nodes: NodePool,
    /// The first node of every chain, the length is a power of two.
    buckets: Vec<Option<TermIndex>>,
    symbols: SymbolPool,
    roots: ProtectionSet<TermIndex>,

    /// The empty list, which is never reclaimed.
    empty_list: TermIndex,

    config: StoreConfig,

    /// The number of new nodes until the next automatic reclamation.
    reclaim_countdown: usize,

    number_of_reclaims: u64,
    number_of_resizes: u64,

    /// Reused between reclamation passes to avoid reallocations.
    dead: Vec<TermIndex>,
}

impl TermPool {
    /// Creates a pool that only contains the empty list.
    pub fn new(config: StoreConfig) -> TermPool {
        assert!(
            (1..=100).contains(&config.max_load_percent),
            "The maximum load percentage must be between 1 and 100, got {}",
            config.max_load_percent
        );

        let mut nodes = NodePool::new();
        let mut buckets = vec![None; config.initial_buckets.max(1).next_power_of_two()];

        // Its reference count of one is never released.
        let hash = node_hash(&NodeHead::EmptyList, &[]);
        let bucket = hash as usize & (buckets.len() - 1);
        let empty_list = nodes.allocate(NodeHead::EmptyList, &[], hash, None);
        buckets[bucket] = Some(empty_list);

        TermPool {
            nodes,
            buckets,
            symbols: SymbolPool::new(),
            roots: ProtectionSet::new(),
            empty_list,
            config,
            reclaim_countdown: config.reclaim_interval.max(1),
            number_of_reclaims: 0,
            number_of_resizes: 0,
            dead: Vec::new(),
        }
    }

    /// Returns the canonical node with the given head and arguments, inserting it
    /// when it does not exist yet. The reference count of the returned node is
    /// incremented for the caller.
    ///
    /// All arguments must be live nodes of this pool.
    pub fn find_or_insert(&mut self, head: NodeHead, arguments: &[TermIndex]) -> TermIndex {
        self.check_shape(head, arguments);

        if self.config.automatic_reclamation && self.reclaim_countdown == 0 {
            self.reclaim();
        }

        let hash = node_hash(&head, arguments);
        let bucket = self.bucket(hash);

        let mut current = self.buckets[bucket];
        while let Some(index) = current {
            let node = self.nodes.get(index);
            if node.hash() == hash && node.head() == head && self.nodes.arguments(node) == arguments {
                node.retain();
                return index;
            }

            current = node.next();
        }

        for argument in arguments {
            self.nodes.get(*argument).retain();
        }

        if let NodeHead::Application(symbol) = head {
            self.symbols.retain(symbol);
        }

        let index = self.nodes.allocate(head, arguments, hash, self.buckets[bucket]);
        self.buckets[bucket] = Some(index);
        self.reclaim_countdown = self.reclaim_countdown.saturating_sub(1);
        debug_trace!("Created term {index} with head {head:?} and arguments {arguments:?}");

        if self.nodes.len() * 100 > self.buckets.len() * self.config.max_load_percent {
            self.resize();
        }

        index
    }

    /// Returns the canonical node equal to the given one, except that the argument at
    /// `position` is replaced by `argument`. The result is retained for the caller.
    pub fn set_argument(&mut self, index: TermIndex, position: usize, argument: TermIndex) -> TermIndex {
        let node = self.nodes.get(index);
        let head = node.head();

        let mut arguments: SmallVec<[TermIndex; 8]> = SmallVec::from_slice(self.nodes.arguments(node));
        assert!(
            position < arguments.len(),
            "Argument {position} is out of range for term {index} with {} arguments",
            arguments.len()
        );

        arguments[position] = argument;
        self.find_or_insert(head, &arguments)
    }

    /// Increments the reference count of the node.
    pub fn retain(&self, index: TermIndex) {
        debug_trace!("Retain term {index}");
        self.nodes.get(index).retain();
    }

    /// Decrements the reference count of the node. The node itself is only freed by [TermPool::reclaim].
    ///
    /// # Panics
    ///
    /// When the reference count was already zero.
    pub fn release(&self, index: TermIndex) {
        debug_trace!("Release term {index}");
        if self.nodes.get(index).release().is_none() {
            panic!("The reference count of term {index} dropped below zero");
        }
    }

    /// Registers the node as a root, it is never reclaimed until it is unprotected.
    pub fn protect(&mut self, index: TermIndex) -> RootIndex {
        self.nodes.get(index);
        let root = self.roots.protect(index);
        debug_trace!("Protected term {index} as root {root}");
        root
    }

    /// Removes the root and returns the node it referred to.
    ///
    /// # Panics
    ///
    /// When the root is not registered.
    pub fn unprotect(&mut self, root: RootIndex) -> TermIndex {
        let index = self.roots.unprotect(root);
        debug_trace!("Unprotected root {root} of term {index}");
        index
    }

    /// Lets the root refer to another node, returns the node it referred to before.
    pub fn replace_root(&mut self, root: RootIndex, index: TermIndex) -> TermIndex {
        self.nodes.get(index);
        self.roots.replace(root, index)
    }

    /// Returns the node the root refers to.
    pub fn root(&self, root: RootIndex) -> TermIndex {
        self.roots[root]
    }

    /// Frees every node that has a reference count of zero and is not a root, and
    /// every function symbol that is no longer referenced as a consequence.
    /// Returns the number of freed nodes.
    pub fn reclaim(&mut self) -> usize {
        let start = Instant::now();
        let number_of_symbols = self.symbols.len();

        for (_, root) in self.roots.iter() {
            self.nodes.get_mut(*root).set_marked(true);
        }

        // Unlink all nodes that are unreferenced at the start of the pass.
        let mut dead = std::mem::take(&mut self.dead);
        for bucket in 0..self.buckets.len() {
            let mut previous: Option<TermIndex> = None;
            let mut current = self.buckets[bucket];

            while let Some(index) = current {
                let node = self.nodes.get(index);
                current = node.next();

                if node.reference_count() == 0 && !node.is_marked() {
                    match previous {
                        Some(previous) => self.nodes.get_mut(previous).set_next(current),
                        None => self.buckets[bucket] = current,
                    }

                    dead.push(index);
                } else {
                    previous = Some(index);
                }
            }
        }

        // Freeing a node releases its arguments, which can make them unreferenced in turn.
        let mut freed = 0;
        while let Some(index) = dead.pop() {
            let (head, arguments) = self.nodes.free(index);
            freed += 1;
            debug_trace!("Reclaimed term {index}");

            for argument in arguments {
                let node = self.nodes.get(argument);
                let Some(remaining) = node.release() else {
                    panic!("The reference count of term {argument} dropped below zero");
                };

                if remaining == 0 && !node.is_marked() {
                    self.unlink(argument);
                    dead.push(argument);
                }
            }

            if let NodeHead::Application(symbol) = head {
                if self.symbols.release(symbol) {
                    self.symbols.free_if_unused(symbol);
                }
            }
        }

        for (_, root) in self.roots.iter() {
            self.nodes.get_mut(*root).set_marked(false);
        }

        self.dead = dead;
        self.number_of_reclaims += 1;
        self.reclaim_countdown = if self.config.reclaim_interval <= 1 {
            1
        } else {
            self.config.reclaim_interval.max(self.nodes.len())
        };

        debug!(
            "Reclamation: {} terms and {} symbols removed in {}ms, {} roots",
            LargeFormatter(freed),
            LargeFormatter(number_of_symbols - self.symbols.len()),
            start.elapsed().as_millis(),
            LargeFormatter(self.roots.len())
        );
        debug!("{}", self.metrics());

        freed
    }

    /// Enables or disables automatic reclamation during construction.
    pub fn set_automatic_reclamation(&mut self, enabled: bool) {
        self.config.automatic_reclamation = enabled;
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the node at the given index, panics when it has been reclaimed.
    pub fn node(&self, index: TermIndex) -> &Node {
        self.nodes.get(index)
    }

    /// Returns the arguments of the node at the given index.
    pub fn arguments(&self, index: TermIndex) -> &[TermIndex] {
        self.nodes.arguments(self.nodes.get(index))
    }

    /// Returns true iff the node is a list cell or the empty list.
    pub fn is_list(&self, index: TermIndex) -> bool {
        matches!(self.nodes.get(index).head(), NodeHead::Cons | NodeHead::EmptyList)
    }

    pub fn empty_list(&self) -> TermIndex {
        self.empty_list
    }

    pub fn symbols(&self) -> &SymbolPool {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolPool {
        &mut self.symbols
    }

    /// Returns the number of live terms, including the empty list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false, since the empty list is always present.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Returns the metrics of the term pool, can be formatted and written to output.
    pub fn metrics(&self) -> TermPoolMetrics {
        TermPoolMetrics {
            terms: self.nodes.len(),
            node_capacity: self.nodes.capacity(),
            argument_capacity: self.nodes.argument_capacity(),
            symbols: self.symbols.len(),
            roots: self.roots.len(),
            buckets: self.buckets.len(),
            reclaims: self.number_of_reclaims,
            resizes: self.number_of_resizes,
        }
    }

    fn bucket(&self, hash: u64) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    /// Doubles the number of buckets and relinks every node by its stored hash.
    fn resize(&mut self) {
        let start = Instant::now();
        let old_capacity = self.buckets.len();
        let capacity = old_capacity * 2;

        let mut buckets = vec![None; capacity];
        for (index, node) in self.nodes.iter_mut() {
            let bucket = node.hash() as usize & (capacity - 1);
            node.set_next(buckets[bucket]);
            buckets[bucket] = Some(index);
        }

        self.buckets = buckets;
        self.number_of_resizes += 1;

        debug!(
            "Resized the term table from {} to {} buckets for {} terms in {}ms",
            LargeFormatter(old_capacity),
            LargeFormatter(capacity),
            LargeFormatter(self.nodes.len()),
            start.elapsed().as_millis()
        );
    }

    /// Removes the node from the chain of its bucket.
    fn unlink(&mut self, index: TermIndex) {
        let node = self.nodes.get(index);
        let bucket = self.bucket(node.hash());
        let next = node.next();

        if self.buckets[bucket] == Some(index) {
            self.buckets[bucket] = next;
            return;
        }

        let mut current = self.buckets[bucket];
        while let Some(candidate) = current {
            let successor = self.nodes.get(candidate).next();
            if successor == Some(index) {
                self.nodes.get_mut(candidate).set_next(next);
                return;
            }

            current = successor;
        }

        panic!("Term {index} is not linked into bucket {bucket}");
    }

    /// Checks that the arguments match the head of the node.
    fn check_shape(&self, head: NodeHead, arguments: &[TermIndex]) {
        match head {
            NodeHead::Application(symbol) => {
                let symbol = self.symbols.get(symbol);
                assert_eq!(
                    symbol.arity(),
                    arguments.len(),
                    "Symbol {} has arity {}, but {} arguments were given",
                    symbol.name(),
                    symbol.arity(),
                    arguments.len()
                );
            }
            NodeHead::Cons => {
                assert_eq!(arguments.len(), 2, "A list cell has a head and a tail");
                assert!(self.is_list(arguments[1]), "The tail of a list cell must be a list");
            }
            NodeHead::Int(_) | NodeHead::EmptyList => {
                assert!(arguments.is_empty(), "Integers and the empty list have no arguments");
            }
        }
    }
}

/// Combines the head with the indices of the arguments, in order.
fn node_hash(head: &NodeHead, arguments: &[TermIndex]) -> u64 {
    let mut hasher = FxHasher::default();
    head.hash(&mut hasher);
    for argument in arguments {
        argument.hash(&mut hasher);
    }

    hasher.finish()
}

/// A snapshot of the sizes of a [TermPool].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermPoolMetrics {
    pub terms: usize,
    pub node_capacity: usize,
    pub argument_capacity: usize,
    pub symbols: usize,
    pub roots: usize,
    pub buckets: usize,
    pub reclaims: u64,
    pub resizes: u64,
}

impl fmt::Display for TermPoolMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "There are {} terms (capacity {}, {} argument slots), {} symbols and {} roots in {} buckets, after {} reclamations and {} resizes",
            LargeFormatter(self.terms),
            LargeFormatter(self.node_capacity),
            LargeFormatter(self.argument_capacity),
            LargeFormatter(self.symbols),
            LargeFormatter(self.roots),
            LargeFormatter(self.buckets),
            LargeFormatter(self.reclaims),
            LargeFormatter(self.resizes)
        )
    }
}

#[cfg(test)]
mod tests {
    use hashcons_utilities::test_logger;

    use super::*;

    fn manual_pool(initial_buckets: usize) -> TermPool {
        TermPool::new(StoreConfig {
            initial_buckets,
            automatic_reclamation: false,
            ..StoreConfig::default()
        })
    }

    #[test]
    fn test_pool_resize_relinks_all_nodes() {
        test_logger();

        let mut pool = manual_pool(2);
        let indices: Vec<TermIndex> = (0..100).map(|value| pool.find_or_insert(NodeHead::Int(value), &[])).collect();

        assert!(pool.capacity() >= 128);
        assert_eq!(pool.len(), 101);
        assert!(pool.metrics().resizes > 0);

        for (value, index) in indices.iter().enumerate() {
            assert_eq!(pool.find_or_insert(NodeHead::Int(value as i64), &[]), *index);
        }
    }

    #[test]
    fn test_pool_reclaim_cascades() {
        test_logger();

        let mut pool = manual_pool(16);
        let f = pool.symbols_mut().intern("f", 1, false);
        let a = pool.find_or_insert(NodeHead::Int(0), &[]);

        // Every level only keeps the level below it alive.
        let mut term = a;
        for _ in 0..10 {
            let parent = pool.find_or_insert(NodeHead::Application(f), &[term]);
            pool.release(term);
            term = parent;
        }

        assert_eq!(pool.len(), 12);
        assert_eq!(pool.reclaim(), 0);

        pool.release(term);
        assert_eq!(pool.reclaim(), 11);
        assert_eq!(pool.len(), 1);

        // Nodes freed the symbol when they were reclaimed.
        assert_eq!(pool.symbols().len(), 0);
    }

    #[test]
    fn test_pool_roots_survive() {
        let mut pool = manual_pool(16);
        let one = pool.find_or_insert(NodeHead::Int(1), &[]);
        let list = pool.find_or_insert(NodeHead::Cons, &[one, pool.empty_list()]);
        pool.release(one);

        let root = pool.protect(list);
        pool.release(list);

        assert_eq!(pool.reclaim(), 0);
        assert_eq!(pool.root(root), list);
        assert_eq!(pool.arguments(list), &[one, pool.empty_list()]);

        pool.unprotect(root);
        assert_eq!(pool.reclaim(), 2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    #[should_panic(expected = "must be a list")]
    fn test_pool_cons_requires_list_tail() {
        let mut pool = manual_pool(16);
        let one = pool.find_or_insert(NodeHead::Int(1), &[]);
        pool.find_or_insert(NodeHead::Cons, &[one, one]);
    }
}
