//! Compares pooled handle creation against `std::rc::Rc` on the system
//! allocator.

use std::hint::black_box;
use std::rc::Rc;

use criterion::{Criterion, criterion_group, criterion_main};
use refc::refc_factory;

refc_factory! {
    /// Allocates the benchmark payloads.
    struct BenchFactory(u64);
}

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("refc");

    group.bench_function("create_drop", |b| {
        let factory = BenchFactory::new();

        b.iter(|| {
            drop(black_box(factory.create(black_box(42_u64))));
        });
    });

    group.bench_function("clone_drop", |b| {
        let factory = BenchFactory::new();
        let handle = factory.create(42_u64);

        b.iter(|| {
            drop(black_box(handle.clone()));
        });
    });

    group.bench_function("rc_baseline", |b| {
        b.iter(|| {
            drop(black_box(Rc::new(black_box(42_u64))));
        });
    });

    group.finish();
}

criterion_group!(benches, entrypoint);
criterion_main!(benches);
