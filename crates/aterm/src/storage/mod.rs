//! The storage behind a [crate::TermStore].
//!
//! Terms are nodes in a [NodePool] and are identified by their [TermIndex]. The
//! arguments of a node are stored in a separate arena with one size class per
//! arity. The [TermPool] links every node into a hash table, which guarantees
//! that structurally equal terms share a single node, and keeps the function
//! symbols in a [SymbolPool].
//!
//! Nothing in this module takes locks, the [crate::TermStore] wraps the
//! [TermPool] in a read-write lock. Reference counts are atomic so that they can
//! be adjusted while holding the read lock.

mod node_pool;
mod symbol_pool;
mod term_pool;

pub use node_pool::*;
pub use symbol_pool::*;
pub use term_pool::*;
