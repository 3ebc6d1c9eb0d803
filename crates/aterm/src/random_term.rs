#![forbid(unsafe_code)]

use rand::Rng;
use rand::prelude::IteratorRandom;
use rustc_hash::FxHashSet;

use crate::ATerm;
use crate::TermStore;

/// Create a random term consisting of the given symbols and constants. Performs
/// iterations number of constructions, where every construction picks its
/// arguments among the constants and the terms constructed so far. The
/// result is the last constructed term, or a constant when no construction is performed.
///
/// # Panics
///
/// When there are no constants, or when there are iterations but no symbols.
pub fn random_term(
    rng: &mut impl Rng,
    store: &TermStore,
    symbols: &[(String, usize)],
    constants: &[String],
    iterations: usize,
) -> ATerm {
    assert!(!constants.is_empty(), "We need constants to be able to create a term");
    assert!(
        iterations == 0 || !symbols.is_empty(),
        "We need symbols to be able to construct terms"
    );

    let mut subterms: FxHashSet<ATerm> = constants
        .iter()
        .map(|name| store.constant(&store.symbol(name, 0)))
        .collect();

    let symbols: Vec<_> = symbols.iter().map(|(name, arity)| store.symbol(name, *arity)).collect();

    let mut result = None;
    for _ in 0..iterations {
        let Some(symbol) = symbols.iter().choose(rng) else {
            break;
        };

        let arguments: Vec<ATerm> = (0..symbol.arity())
            .filter_map(|_| subterms.iter().choose(rng).cloned())
            .collect();

        let term = store.application(symbol, &arguments);

        // Make this term available as another subterm that can be used.
        subterms.insert(term.clone());
        result = Some(term);
    }

    match result {
        Some(term) => term,
        None => store.constant(&store.symbol(&constants[0], 0)),
    }
}

#[cfg(test)]
mod tests {
    use hashcons_utilities::random_test;

    use crate::Term;

    use super::*;

    #[test]
    fn test_random_term_uses_symbols() {
        random_test(10, |rng| {
            let store = TermStore::new();
            let term = random_term(rng, &store, &[("f".into(), 2)], &["a".to_string(), "b".to_string()], 10);

            assert_eq!(term.symbol().name(), "f");
            for subterm in term.iter() {
                assert!(["f", "a", "b"].contains(&subterm.symbol().name()));
            }
        });
    }
}
