//! Benchmarks for lock/unlock pair matching and the mutex operator.
//!
//! Pair matching compares every lock with every unlock of the same function, so the
//! cost grows with the number of critical sections per function:
//! - Matching over many small functions
//! - Matching inside one function with many sections
//! - A full removal run

extern crate syncmut;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;
use syncmut::prelude::*;

/// Builds `functions` functions with `sections` critical sections each, every section
/// on its own global mutex.
fn build_module(functions: usize, sections: usize) -> Module {
    let mut module = Module::new("bench");
    let lock = module.declare("pthread_mutex_lock", Type::I32);
    let unlock = module.declare("pthread_mutex_unlock", Type::I32);

    for i in 0..functions {
        let mut f = module.build_function(format!("worker{i}"), Type::Void);
        f.block("entry");
        for s in 0..sections {
            let mutex = Value::global(format!("m{s}"));
            f.call(lock, vec![mutex.clone()]).unwrap();
            f.store(Value::global("shared"), Value::int(32, true, 1))
                .unwrap();
            f.call(unlock, vec![mutex]).unwrap();
        }
        f.ret(None).unwrap();
        f.finish();
    }
    module
}

/// Benchmark matching over 200 functions with 4 sections each.
fn bench_pairs_many_functions(c: &mut Criterion) {
    let module = build_module(200, 4);

    c.bench_function("pairs_many_functions", |b| {
        b.iter(|| {
            let ctx = MutationContext::new();
            let index = PairIndex::build(black_box(&module), &IdentityAlias, &ctx).unwrap();
            black_box(index.total())
        });
    });
}

/// Benchmark matching inside a single function with 100 sections.
fn bench_pairs_one_large_function(c: &mut Criterion) {
    let module = build_module(1, 100);

    c.bench_function("pairs_one_large_function", |b| {
        b.iter(|| {
            let ctx = MutationContext::new();
            let index = PairIndex::build(black_box(&module), &IdentityAlias, &ctx).unwrap();
            black_box(index.total())
        });
    });
}

/// Benchmark removing every pair of the first category.
fn bench_mutex_remove_all(c: &mut Criterion) {
    let module = build_module(20, 4);
    let positions: Vec<usize> = (0..80).flat_map(|i| [0, i]).collect();
    let op = MutexMutator::new(MutexConfig::remove(positions)).unwrap();

    c.bench_function("mutex_remove_all", |b| {
        b.iter_batched(
            || module.clone(),
            |mut module| {
                let outcome = run_pass(&op, &mut module, &IdentityAlias).unwrap();
                black_box(outcome.modified)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_pairs_many_functions,
    bench_pairs_one_large_function,
    bench_mutex_remove_all
);
criterion_main!(benches);
