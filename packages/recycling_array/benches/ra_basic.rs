//! Basic benchmarks for the `recycling_array` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use alloc_tracker::Allocator;
use criterion::{Criterion, criterion_group, criterion_main};
use recycling_array::{DynamicArray, RecyclingArray};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = usize;
const TEST_VALUE: TestItem = 1024;

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("ra_basic");

    let mut allocs_op = allocs.operation("dynamic_add_one");
    group.bench_function("dynamic_add_one", |b| {
        b.iter_custom(|iters| {
            let mut arrays = iter::repeat_with(DynamicArray::<TestItem>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for array in &mut arrays {
                _ = black_box(array.add(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("recycling_add_one");
    group.bench_function("recycling_add_one", |b| {
        b.iter_custom(|iters| {
            let mut arrays = iter::repeat_with(RecyclingArray::<TestItem>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for array in &mut arrays {
                _ = black_box(array.add(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("recycling_remove_one");
    group.bench_function("recycling_remove_one", |b| {
        b.iter_custom(|iters| {
            let mut arrays = iter::repeat_with(RecyclingArray::<TestItem>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            for array in &mut arrays {
                array.add(TEST_VALUE).unwrap();
            }

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for array in &mut arrays {
                _ = black_box(array.remove(black_box(0)));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("recycling_reuse_one");
    group.bench_function("recycling_reuse_one", |b| {
        b.iter_custom(|iters| {
            let mut array = RecyclingArray::<TestItem>::new();
            array.add(TEST_VALUE).unwrap();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let value = array.remove(black_box(0)).unwrap();
                _ = black_box(array.add(black_box(value)));
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("ra_slow");

    let mut allocs_op = allocs.operation("dynamic_add_10k");
    group.bench_function("dynamic_add_10k", |b| {
        b.iter_custom(|iters| {
            let mut arrays = iter::repeat_with(DynamicArray::<TestItem>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for array in &mut arrays {
                for _ in 0..10_000 {
                    _ = black_box(array.add(black_box(TEST_VALUE)));
                }
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("forward_10_back_5_times_1000");
    group.bench_function("forward_10_back_5_times_1000", |b| {
        // We add 10 items, remove the first 5 and repeat this 1000 times.
        // This stresses the free list bookkeeping of the recycling array.
        b.iter_custom(|iters| {
            let mut arrays = iter::repeat_with(RecyclingArray::<TestItem>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let mut to_remove = Vec::with_capacity(5);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for array in &mut arrays {
                for _ in 0..1000 {
                    to_remove.clear();

                    // Add the 5 that we will later remove.
                    for _ in 0..5 {
                        to_remove.push(array.add(black_box(TEST_VALUE)).unwrap());
                    }

                    // Add the 5 that we will keep.
                    for _ in 0..5 {
                        _ = black_box(array.add(black_box(TEST_VALUE)));
                    }

                    // Remove the first 5.
                    for &index in &to_remove {
                        _ = black_box(array.remove(index).unwrap());
                    }
                }
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("iterate_10k_half_reclaimed");
    group.bench_function("iterate_10k_half_reclaimed", |b| {
        b.iter_custom(|iters| {
            let mut array = RecyclingArray::<TestItem>::new();

            for value in 0..10_000 {
                array.add(value).unwrap();
            }

            for index in (0..10_000).step_by(2) {
                array.remove(index).unwrap();
            }

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(array.iter().copied().sum::<TestItem>());
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
