//! Compares driver-served cell allocation against boxing on the system
//! allocator, including the free-list recycling path.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use shape_pool::RawShapeDriver;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("shape_pool");

    group.bench_function("allocate_deallocate", |b| {
        let mut driver = RawShapeDriver::new();
        let id = driver.class_of::<[u64; 3]>();

        b.iter(|| {
            let cell = driver.allocate(black_box(id));

            // SAFETY: The cell came from allocate() with this id and holds
            // no value needing drop.
            unsafe { driver.deallocate(black_box(cell), id) };
        });
    });

    group.bench_function("box_baseline", |b| {
        b.iter(|| {
            drop(black_box(Box::new(black_box([42_u64; 3]))));
        });
    });

    group.finish();
}

criterion_group!(benches, entrypoint);
criterion_main!(benches);
