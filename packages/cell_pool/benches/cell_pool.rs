//! Compares pooled cell allocation against boxing on the system allocator.

use std::hint::black_box;

use cell_pool::CellPool;
use criterion::{Criterion, criterion_group, criterion_main};
use new_zealand::nz;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("cell_pool");

    group.bench_function("allocate_deallocate", |b| {
        let mut pool = CellPool::<u64>::builder().slab_capacity(nz!(1024)).build();

        b.iter(|| {
            let cell = pool.allocate(1);

            // SAFETY: The cell is valid for writes of u64.
            unsafe { cell.write(black_box(42)) };

            // SAFETY: The cell came from this pool; u64 needs no drop.
            unsafe { pool.deallocate(black_box(cell), 1) };
        });
    });

    group.bench_function("box_baseline", |b| {
        b.iter(|| {
            drop(black_box(Box::new(black_box(42_u64))));
        });
    });

    group.finish();
}

criterion_group!(benches, entrypoint);
criterion_main!(benches);
