//! Containers keyed by terms. Since terms hash and compare by their identity,
//! lookups never compare the structure of terms.

use hashcons_collections::IndexedSet;
use hashcons_collections::Table;

use crate::ATerm;

/// A map from terms to terms.
pub type ATermTable = Table<ATerm, ATerm>;

/// A set of terms in which every term has a stable index.
pub type ATermIndexedSet = IndexedSet<ATerm>;

#[cfg(test)]
mod tests {
    use rand::Rng;

    use hashcons_utilities::random_test;

    use crate::StoreConfig;
    use crate::Term;
    use crate::TermStore;
    use crate::random_term;

    use super::*;

    fn manual_store() -> TermStore {
        TermStore::with_config(StoreConfig {
            automatic_reclamation: false,
            ..StoreConfig::default()
        })
    }

    #[test]
    fn test_indexed_set_removal() {
        let store = manual_store();
        let f = store.symbol("f", 2);
        let term = store.application(&f, &[store.int(1), store.int(2)]);

        let mut set = ATermIndexedSet::new();
        let (index, inserted) = set.insert(term.clone());
        assert!(inserted);
        assert_eq!(set.index(&term), Some(index));
        assert_eq!(set.insert(term.clone()), (index, false));

        assert!(set.remove(&term));
        assert_eq!(set.index(&term), None);
        assert!(!set.remove(&term));
    }

    #[test]
    fn test_indexed_set_borrowed_lookup() {
        let store = manual_store();
        let term = store.parse("f(a, b)").unwrap();

        let mut set = ATermIndexedSet::new();
        let (index, _) = set.insert(term.arg(1).protect());
        assert_eq!(set.index(&term.arg(1)), Some(index));
        assert!(!set.contains(&term.arg(0)));
    }

    #[test]
    fn test_table_resize() {
        let store = manual_store();
        let mut table = ATermTable::with_capacity(16, 75);
        assert_eq!(table.capacity(), 16);

        let keys: Vec<ATerm> = (0..20).map(|value| store.int(value)).collect();
        for (position, key) in keys.iter().enumerate() {
            assert_eq!(table.insert(key.clone(), store.int(100 + position as i64)), None);
        }

        assert!(table.capacity() > 16);
        for (position, key) in keys.iter().enumerate() {
            assert_eq!(table.get(key).map(|value| value.value()), Some(100 + position as i64));
        }
    }

    #[test]
    fn test_table_overwrite() {
        let store = manual_store();
        let mut table = ATermTable::new();
        let key = store.parse("g(1)").unwrap();

        assert_eq!(table.insert(key.clone(), store.int(1)), None);
        assert_eq!(table.insert(key.clone(), store.int(2)), Some(store.int(1)));
        assert_eq!(table.len(), 1);

        assert_eq!(table.remove(&key), Some(store.int(2)));
        assert!(table.get(&key).is_none());

        table.insert(key, store.int(3));
        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn test_random_indexed_set_bijection() {
        random_test(100, |rng| {
            let store = TermStore::new();
            let mut set = ATermIndexedSet::new();

            for _ in 0..50 {
                let term = random_term(rng, &store, &[("f".into(), 2), ("g".into(), 1)], &["a".to_string()], 5);
                let (index, inserted) = set.insert(term.clone());
                assert_eq!(set.insert(term.clone()), (index, false));
                assert_eq!(set.get(index), Some(&term));

                if inserted && rng.random_bool(0.2) {
                    assert!(set.remove(&term));
                    assert_eq!(set.index(&term), None);
                }
            }

            for (index, term) in set.iter() {
                assert_eq!(set.index(term), Some(index));
            }
        });
    }

    #[test]
    fn test_containers_keep_terms_alive() {
        let store = manual_store();
        let mut set = ATermIndexedSet::new();
        set.insert(store.parse("h(2)").unwrap());

        assert_eq!(store.reclaim(), 0);
        set.clear();
        assert_eq!(store.reclaim(), 2);
    }
}
