#![forbid(unsafe_code)]

use std::fmt;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use smallvec::SmallVec;

use crate::storage::SymbolId;

/// The index of a node in the [NodePool]. Every term is identified by the index of its node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TermIndex(u32);

impl TermIndex {
    /// Returns the position of the node in the pool.
    pub fn value(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TermIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Distinguishes the kinds of nodes, the arguments are stored separately.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum NodeHead {
    /// An integer, without arguments.
    Int(i64),
    /// An application of the symbol to as many arguments as its arity.
    Application(SymbolId),
    /// A list cell, its arguments are the head and the tail.
    Cons,
    /// The empty list, without arguments.
    EmptyList,
}

/// A node of the term graph.
pub struct Node {
    head: NodeHead,
    arguments: ArgumentChunk,
    hash: u64,
    /// The next node in the same bucket.
    next: Option<TermIndex>,
    reference_count: AtomicUsize,
    /// Only set during reclamation, for nodes that are roots.
    marked: bool,
}

impl Node {
    pub fn head(&self) -> NodeHead {
        self.head
    }

    /// Returns the hash of the head and arguments, as computed on insertion.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn next(&self) -> Option<TermIndex> {
        self.next
    }

    pub fn set_next(&mut self, next: Option<TermIndex>) {
        self.next = next;
    }

    pub fn reference_count(&self) -> usize {
        self.reference_count.load(Ordering::Acquire)
    }

    pub fn retain(&self) {
        self.reference_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrements the reference count and returns the remaining count, or None
    /// when the count was already zero.
    pub fn release(&self) -> Option<usize> {
        self.reference_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn set_marked(&mut self, marked: bool) {
        self.marked = marked;
    }
}

/// Identifies the arguments of a node in the [ArgumentArena].
#[derive(Copy, Clone, Debug)]
struct ArgumentChunk {
    arity: u32,
    chunk: u32,
}

/// Stores the arguments of all nodes, grouped by arity. The size class for
/// arity `n` is a single vector in which chunk `c` occupies the positions
/// `c * n .. (c + 1) * n`. Freed chunks are reused by the next node of the same arity.
#[derive(Default)]
struct ArgumentArena {
    classes: Vec<SizeClass>,
}

#[derive(Default)]
struct SizeClass {
    slots: Vec<TermIndex>,
    free: Vec<u32>,
}

impl ArgumentArena {
    fn allocate(&mut self, arguments: &[TermIndex]) -> ArgumentChunk {
        let arity = arguments.len();
        if arity == 0 {
            return ArgumentChunk { arity: 0, chunk: 0 };
        }

        if self.classes.len() <= arity {
            self.classes.resize_with(arity + 1, SizeClass::default);
        }

        let class = &mut self.classes[arity];
        let chunk = match class.free.pop() {
            Some(chunk) => {
                let start = chunk as usize * arity;
                class.slots[start..start + arity].copy_from_slice(arguments);
                chunk
            }
            None => {
                let chunk = class.slots.len() / arity;
                class.slots.extend_from_slice(arguments);
                to_u32(chunk, "argument chunk")
            }
        };

        ArgumentChunk {
            arity: to_u32(arity, "arity"),
            chunk,
        }
    }

    fn get(&self, chunk: ArgumentChunk) -> &[TermIndex] {
        let arity = chunk.arity as usize;
        if arity == 0 {
            return &[];
        }

        let start = chunk.chunk as usize * arity;
        &self.classes[arity].slots[start..start + arity]
    }

    fn free(&mut self, chunk: ArgumentChunk) {
        if chunk.arity > 0 {
            self.classes[chunk.arity as usize].free.push(chunk.chunk);
        }
    }

    /// Returns the number of argument positions that have been allocated.
    fn capacity(&self) -> usize {
        self.classes.iter().map(|class| class.slots.len()).sum()
    }
}

/// Storage for the nodes of the term graph. Freed nodes are put on a free
/// list and their index is reused for the next allocated node.
#[derive(Default)]
pub struct NodePool {
    nodes: Vec<NodeSlot>,
    free: Option<TermIndex>,
    arguments: ArgumentArena,
    len: usize,
}

enum NodeSlot {
    Filled(Node),
    Free(Option<TermIndex>),
}

impl NodePool {
    pub fn new() -> NodePool {
        NodePool::default()
    }

    /// Returns the number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of node slots, live or free.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of argument positions, live or free.
    pub fn argument_capacity(&self) -> usize {
        self.arguments.capacity()
    }

    /// Allocates a node with a reference count of one.
    pub fn allocate(
        &mut self,
        head: NodeHead,
        arguments: &[TermIndex],
        hash: u64,
        next: Option<TermIndex>,
    ) -> TermIndex {
        let node = Node {
            head,
            arguments: self.arguments.allocate(arguments),
            hash,
            next,
            reference_count: AtomicUsize::new(1),
            marked: false,
        };

        self.len += 1;
        match self.free {
            Some(index) => {
                self.free = match &self.nodes[index.value()] {
                    NodeSlot::Free(next) => *next,
                    NodeSlot::Filled(_) => panic!("The free list points to the live node {index}"),
                };

                self.nodes[index.value()] = NodeSlot::Filled(node);
                index
            }
            None => {
                let index = TermIndex(to_u32(self.nodes.len(), "node index"));
                self.nodes.push(NodeSlot::Filled(node));
                index
            }
        }
    }

    /// Returns the node at the given index.
    ///
    /// # Panics
    ///
    /// When the node has been freed.
    pub fn get(&self, index: TermIndex) -> &Node {
        match self.nodes.get(index.value()) {
            Some(NodeSlot::Filled(node)) => node,
            _ => panic!("Term {index} refers to a reclaimed node"),
        }
    }

    pub fn get_mut(&mut self, index: TermIndex) -> &mut Node {
        match self.nodes.get_mut(index.value()) {
            Some(NodeSlot::Filled(node)) => node,
            _ => panic!("Term {index} refers to a reclaimed node"),
        }
    }

    /// Returns the arguments of the given node.
    pub fn arguments(&self, node: &Node) -> &[TermIndex] {
        self.arguments.get(node.arguments)
    }

    /// Frees the node and its arguments, returns its head and a copy of its arguments.
    pub fn free(&mut self, index: TermIndex) -> (NodeHead, SmallVec<[TermIndex; 4]>) {
        let slot = std::mem::replace(&mut self.nodes[index.value()], NodeSlot::Free(self.free));
        let NodeSlot::Filled(node) = slot else {
            panic!("Term {index} is freed twice");
        };

        let arguments = SmallVec::from_slice(self.arguments.get(node.arguments));
        self.arguments.free(node.arguments);
        self.free = Some(index);
        self.len -= 1;

        (node.head, arguments)
    }

    /// Returns all live nodes.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TermIndex, &mut Node)> + '_ {
        self.nodes
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                NodeSlot::Filled(node) => Some((TermIndex(index as u32), node)),
                NodeSlot::Free(_) => None,
            })
    }
}

/// Converts a size into the 32 bits used to index nodes. Running out of indices is fatal.
fn to_u32(value: usize, what: &str) -> u32 {
    match u32::try_from(value) {
        Ok(value) => value,
        Err(_) => panic!("The node pool is exhausted, {what} {value} does not fit in 32 bits"),
    }
}
