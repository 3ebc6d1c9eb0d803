//!
//! Benchmarks for the construction, inspection and reclamation of terms, where
//! a number of threads share a single store.
//!

use std::array::from_fn;
use std::collections::VecDeque;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::BatchSize;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use hashcons_aterm::ATerm;
use hashcons_aterm::ATermRef;
use hashcons_aterm::StoreConfig;
use hashcons_aterm::Term;
use hashcons_aterm::TermStore;

/// Sets the number of threads for all the benchmarks.
pub const THREADS: [usize; 4] = [1, 2, 4, 8];

/// Executes a function across multiple threads and measures total execution time.
/// The main thread executes with id 0, while additional threads get ids 1..number_of_threads-1.
fn benchmark_threads<F>(number_of_threads: usize, f: F)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    debug_assert!(number_of_threads > 0, "Number of threads must be greater than 0");

    let f = Arc::new(f);

    let mut handles = Vec::with_capacity(number_of_threads - 1);
    for id in 1..number_of_threads {
        let f_clone = f.clone();
        handles.push(thread::spawn(move || {
            f_clone(id);
        }));
    }

    f(0);

    for handle in handles {
        handle.join().expect("Thread panicked during benchmark");
    }
}

/// Creates a store in which reclamation only happens on demand.
fn manual_store() -> TermStore {
    TermStore::with_config(StoreConfig {
        automatic_reclamation: false,
        ..StoreConfig::default()
    })
}

/// Creates a nested function application where f_0 = c and f_i = f(f_{i-1}, ..., f_{i-1}). The parameter `depth` sets `i` and `c` is given by `leaf_name`.
fn create_nested_function<const ARITY: usize>(store: &TermStore, function_name: &str, leaf_name: &str, depth: usize) -> ATerm {
    let f_symbol = store.symbol(function_name, ARITY);
    let c_symbol = store.symbol(leaf_name, 0);

    let mut term = store.constant(&c_symbol);
    for _ in 0..depth {
        let next = store.application(&f_symbol, &from_fn::<_, ARITY, _>(|_| term.copy()));
        term = next;
    }

    term
}

/// Counts the number of subterms in a term, without sharing.
fn inspect(term: ATermRef<'_>, iterations: usize) -> u64 {
    let mut queue: VecDeque<ATermRef<'_>> = VecDeque::new();

    let mut count = 0;
    for _ in 0..iterations {
        queue.push_back(term);

        while let Some(current) = queue.pop_front() {
            for argument in current.arguments() {
                count += 1;
                queue.push_back(argument);
            }
        }
    }

    count
}

// In these benchmarks all threads construct or inspect the same term.
fn benchmark_shared_creation(c: &mut Criterion) {
    const SIZE: usize = 100000;

    for num_threads in THREADS {
        let store = manual_store();

        c.bench_function(&format!("shared_creation_{num_threads}"), |b| {
            b.iter(|| {
                let store = store.clone();
                benchmark_threads(num_threads, move |_id| {
                    black_box(create_nested_function::<2>(&store, "f", "c", SIZE));
                });
            });
        });
    }
}

fn benchmark_shared_inspect(c: &mut Criterion) {
    const SIZE: usize = 16;
    const ITERATIONS: usize = 100;

    let store = manual_store();
    let shared_term = Arc::new(create_nested_function::<2>(&store, "f", "c", SIZE));
    assert_eq!(inspect(shared_term.copy(), 1), (1 << (SIZE + 1)) - 2);

    for num_threads in THREADS {
        c.bench_function(&format!("shared_inspect_{num_threads}"), |b| {
            b.iter(|| {
                let term = shared_term.clone();
                benchmark_threads(num_threads, move |_id| {
                    black_box(inspect(term.copy(), ITERATIONS / num_threads));
                });
            });
        });
    }
}

fn benchmark_shared_lookup(c: &mut Criterion) {
    let _ = env_logger::try_init();

    const SIZE: usize = 100000;
    const ITERATIONS: usize = 16;

    let store = manual_store();

    // Keep one instance, so that every construction finds an existing term.
    let term = create_nested_function::<2>(&store, "f", "c", SIZE);

    for num_threads in THREADS {
        c.bench_function(&format!("shared_lookup_{num_threads}"), |b| {
            b.iter(|| {
                let store = store.clone();
                benchmark_threads(num_threads, move |_id| {
                    for _ in 0..ITERATIONS / num_threads {
                        black_box(create_nested_function::<2>(&store, "f", "c", SIZE));
                    }
                });
            })
        });
    }

    drop(term);
}

// In these benchmarks every thread constructs its own terms in the shared store.
fn benchmark_unique_creation(c: &mut Criterion) {
    const SIZE: usize = 100000;

    for num_threads in THREADS {
        let store = manual_store();

        c.bench_function(&format!("unique_creation_{num_threads}"), |b| {
            b.iter(|| {
                let store = store.clone();
                benchmark_threads(num_threads, move |id| {
                    black_box(create_nested_function::<2>(
                        &store,
                        "f",
                        &format!("c{id}"),
                        SIZE / num_threads,
                    ));
                });
            });
        });
    }
}

fn benchmark_reclaim(c: &mut Criterion) {
    let _ = env_logger::try_init();

    const SIZE: usize = 100000;

    c.bench_function("reclaim", |b| {
        b.iter_batched(
            || {
                let store = manual_store();
                drop(create_nested_function::<3>(&store, "f", "c", SIZE));
                store
            },
            |store| black_box(store.reclaim()),
            BatchSize::PerIteration,
        );
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = benchmark_shared_creation,
        benchmark_unique_creation,
        benchmark_shared_inspect,
        benchmark_shared_lookup,
        benchmark_reclaim,
);
criterion_main!(benches);
