use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use crate::TermStore;
use crate::storage::SymbolId;

/// A function symbol of a [TermStore], identified by its name, arity and
/// whether its name is quoted.
///
/// The handle holds one reference on the symbol: cloning retains it and
/// dropping releases it. A symbol without handles and without terms using it
/// is removed from the store immediately, and its slot is reused.
pub struct Symbol {
    store: TermStore,
    id: SymbolId,
    name: Arc<str>,
    arity: usize,
    quoted: bool,
}

impl Symbol {
    /// Takes over a reference that has already been counted for this handle.
    pub(crate) fn from_retained(store: TermStore, id: SymbolId, name: Arc<str>, arity: usize, quoted: bool) -> Symbol {
        Symbol {
            store,
            id,
            name,
            arity,
            quoted,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Returns true iff the name is printed between double quotes.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Returns the slot of the symbol in the store, which is valid while this handle exists.
    pub fn id(&self) -> SymbolId {
        self.id
    }

    /// Returns the store that this symbol belongs to.
    pub fn store(&self) -> &TermStore {
        &self.store
    }
}

impl Clone for Symbol {
    fn clone(&self) -> Self {
        self.store.read().symbols().retain(self.id);
        Symbol::from_retained(self.store.clone(), self.id, self.name.clone(), self.arity, self.quoted)
    }
}

impl Drop for Symbol {
    fn drop(&mut self) {
        self.store.release_symbol(self.id);
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.store.same_store(&other.store)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_symbol_name(f, &self.name, self.quoted)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_symbol_name(f, &self.name, self.quoted)?;
        write!(f, "/{}", self.arity)
    }
}

/// Writes the name, between double quotes and with escapes when it is quoted.
pub(crate) fn write_symbol_name(f: &mut impl fmt::Write, name: &str, quoted: bool) -> fmt::Result {
    if !quoted {
        return f.write_str(name);
    }

    f.write_char('"')?;
    for character in name.chars() {
        match character {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            character => f.write_char(character)?,
        }
    }
    f.write_char('"')
}

#[cfg(test)]
mod tests {
    use crate::StoreConfig;
    use crate::Term;

    use super::*;

    fn manual_store() -> TermStore {
        TermStore::with_config(StoreConfig {
            automatic_reclamation: false,
            ..StoreConfig::default()
        })
    }

    #[test]
    fn test_symbol_interning() {
        let store = manual_store();

        let f = store.symbol("f", 2);
        let g = store.symbol("f", 2);
        assert_eq!(f, g);
        assert_eq!(f.id(), g.id());
        assert_ne!(f, store.symbol("f", 1));
        assert_ne!(f, store.quoted_symbol("f", 2));

        assert_eq!(f.name(), "f");
        assert_eq!(f.arity(), 2);
        assert_eq!(format!("{f:?}"), "f/2");
    }

    #[test]
    fn test_symbol_freed_without_handles() {
        let store = manual_store();

        let f = store.symbol("f", 0);
        let copy = f.clone();
        drop(f);
        assert_eq!(store.symbol_count(), 1);

        drop(copy);
        assert_eq!(store.symbol_count(), 0);

        let g = store.symbol("g", 1);
        assert_eq!(store.symbol_count(), 1);
        assert_eq!(&*store.symbol_name(g.id()), "g");
    }

    #[test]
    fn test_symbol_kept_by_terms() {
        let store = manual_store();

        let term = store.constant(&store.symbol("c", 0));
        assert_eq!(store.symbol_count(), 1);

        let symbol = term.symbol();
        assert_eq!(symbol.name(), "c");
        drop(symbol);
        drop(term);
        assert_eq!(store.symbol_count(), 1, "Only reclamation removes the node");

        store.reclaim();
        assert_eq!(store.symbol_count(), 0);
    }

    #[test]
    fn test_quoted_symbol_display() {
        let store = manual_store();

        assert_eq!(store.symbol("f", 0).to_string(), "f");
        assert_eq!(store.quoted_symbol("a b", 0).to_string(), "\"a b\"");
        assert_eq!(store.quoted_symbol("say \"hi\"\n", 0).to_string(), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(store.quoted_symbol("\\", 1).to_string(), "\"\\\\\"");
    }
}
