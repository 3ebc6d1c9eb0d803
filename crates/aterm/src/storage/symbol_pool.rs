#![forbid(unsafe_code)]

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use hashbrown::Equivalent;
use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

/// The slot of a function symbol in the [SymbolPool]. Only valid while the
/// symbol is referenced: the slot of a symbol whose reference count drops to
/// zero is reused for the next new symbol.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn value(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pool for maximal sharing of function symbols. Ensures that function symbols
/// with the same name, arity and quotation are stored in the same slot.
#[derive(Default)]
pub struct SymbolPool {
    symbols: Vec<SymbolSlot>,
    free: Option<SymbolId>,
    /// Unique table from the contents of a symbol to its slot.
    index: HashMap<SymbolKey, SymbolId, FxBuildHasher>,
}

enum SymbolSlot {
    Filled(SharedSymbol),
    Free(Option<SymbolId>),
}

impl SymbolPool {
    pub fn new() -> SymbolPool {
        SymbolPool::default()
    }

    /// Returns the symbol with the given contents, if it exists.
    pub fn lookup(&self, name: &str, arity: usize, quoted: bool) -> Option<SymbolId> {
        self.index.get(&SymbolLookup { name, arity, quoted }).copied()
    }

    /// Returns the slot of the symbol with the given contents, creating it with a
    /// reference count of zero when it does not exist yet.
    pub fn intern(&mut self, name: &str, arity: usize, quoted: bool) -> SymbolId {
        if let Some(id) = self.lookup(name, arity, quoted) {
            return id;
        }

        let name: Arc<str> = Arc::from(name);
        let symbol = SharedSymbol {
            name: name.clone(),
            arity,
            quoted,
            reference_count: AtomicUsize::new(0),
        };

        let id = match self.free {
            Some(id) => {
                self.free = match &self.symbols[id.value()] {
                    SymbolSlot::Free(next) => *next,
                    SymbolSlot::Filled(_) => panic!("The free list points to the live symbol {id}"),
                };

                self.symbols[id.value()] = SymbolSlot::Filled(symbol);
                id
            }
            None => {
                let Ok(slot) = u32::try_from(self.symbols.len()) else {
                    panic!("The symbol pool is exhausted");
                };

                self.symbols.push(SymbolSlot::Filled(symbol));
                SymbolId(slot)
            }
        };

        self.index.insert(SymbolKey { name, arity, quoted }, id);
        id
    }

    /// Returns the symbol in the given slot.
    ///
    /// # Panics
    ///
    /// When the slot is free.
    pub fn get(&self, id: SymbolId) -> &SharedSymbol {
        match self.symbols.get(id.value()) {
            Some(SymbolSlot::Filled(symbol)) => symbol,
            _ => panic!("Symbol {id} has been freed"),
        }
    }

    pub fn retain(&self, id: SymbolId) {
        self.get(id).reference_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrements the reference count of the symbol, returns true when it dropped to zero.
    pub fn release(&self, id: SymbolId) -> bool {
        let symbol = self.get(id);
        match symbol
            .reference_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
        {
            Ok(previous) => previous == 1,
            Err(_) => panic!("The reference count of symbol {} dropped below zero", symbol.name),
        }
    }

    /// Frees the slot when the symbol is still unreferenced, returns true iff it was freed.
    pub fn free_if_unused(&mut self, id: SymbolId) -> bool {
        let unused = match self.symbols.get(id.value()) {
            Some(SymbolSlot::Filled(symbol)) if symbol.reference_count() == 0 => {
                self.index.remove(&SymbolLookup {
                    name: &symbol.name,
                    arity: symbol.arity,
                    quoted: symbol.quoted,
                });
                true
            }
            _ => false,
        };

        if unused {
            self.symbols[id.value()] = SymbolSlot::Free(self.free);
            self.free = Some(id);
        }

        unused
    }

    /// Returns the number of symbols in the pool.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the number of slots, used or free.
    pub fn capacity(&self) -> usize {
        self.symbols.len()
    }
}

/// A function symbol with its reference count.
pub struct SharedSymbol {
    name: Arc<str>,
    arity: usize,
    quoted: bool,
    reference_count: AtomicUsize,
}

impl SharedSymbol {
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Returns true iff the name is printed between double quotes.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    pub fn reference_count(&self) -> usize {
        self.reference_count.load(Ordering::Acquire)
    }
}

/// The key of the unique table.
#[derive(Hash, PartialEq, Eq)]
struct SymbolKey {
    name: Arc<str>,
    arity: usize,
    quoted: bool,
}

/// A cheap way to look up a [SymbolKey] without allocating the name.
#[derive(Hash)]
struct SymbolLookup<'a> {
    name: &'a str,
    arity: usize,
    quoted: bool,
}

impl Equivalent<SymbolKey> for SymbolLookup<'_> {
    fn equivalent(&self, key: &SymbolKey) -> bool {
        self.arity == key.arity && self.quoted == key.quoted && self.name == &*key.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_sharing() {
        let mut pool = SymbolPool::new();

        let f1 = pool.intern("f", 2, false);
        let f2 = pool.intern("f", 2, false);
        let f3 = pool.intern("f", 1, false);
        let f4 = pool.intern("f", 2, true);

        assert_eq!(f1, f2);
        assert_ne!(f1, f3);
        assert_ne!(f1, f4);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.lookup("f", 1, false), Some(f3));
        assert_eq!(pool.lookup("g", 1, false), None);
    }

    #[test]
    fn test_symbol_slot_reuse() {
        let mut pool = SymbolPool::new();

        let f = pool.intern("f", 2, false);
        pool.retain(f);
        assert!(!pool.free_if_unused(f), "A referenced symbol is never freed");

        assert!(pool.release(f));
        assert!(pool.free_if_unused(f));
        assert_eq!(pool.lookup("f", 2, false), None);
        assert!(pool.is_empty());

        let g = pool.intern("g", 0, false);
        assert_eq!(g, f, "The slot of the freed symbol is reused");
        assert_eq!(&**pool.get(g).name(), "g");
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    #[should_panic(expected = "dropped below zero")]
    fn test_symbol_release_underflow() {
        let mut pool = SymbolPool::new();
        let f = pool.intern("f", 0, false);
        pool.release(f);
    }

    #[test]
    #[should_panic(expected = "has been freed")]
    fn test_symbol_stale_id() {
        let mut pool = SymbolPool::new();
        let f = pool.intern("f", 0, false);
        pool.free_if_unused(f);

        pool.get(f);
    }
}
