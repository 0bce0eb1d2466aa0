//! Performance benchmarks for the tracker core.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use loomtrack::{reduce, validate, Action, AppState, DeliveryCandidate, Origin, ProductionEntry};

fn seeded_state(entries: u32) -> AppState {
    let batch = (0..entries)
        .map(|i| {
            ProductionEntry::new(format!("{}", 1000 + i), "10", "120", "15/8/25").unwrap()
        })
        .collect();
    reduce(
        &AppState::default(),
        &Action::AddProductionEntries(batch),
        Origin::Local,
    )
}

/// Benchmark a single-entry add against collections of varying size
/// (every dispatch clones the snapshot, so this measures the
/// whole-state-copy cost too).
fn bench_reducer_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer_add");

    for size in [100u32, 500, 2000] {
        group.bench_with_input(
            BenchmarkId::new("existing_entries", size),
            &size,
            |b, &size| {
                let state = seeded_state(size);
                let batch =
                    vec![ProductionEntry::new("999999", "10", "120", "15/8/25").unwrap()];
                b.iter(|| {
                    black_box(reduce(
                        &state,
                        &Action::AddProductionEntries(batch.clone()),
                        Origin::Local,
                    ));
                });
            },
        );
    }

    group.finish();
}

/// Benchmark delivery validation lookups at varying collection sizes.
fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for size in [100u32, 500, 2000] {
        group.bench_with_input(
            BenchmarkId::new("production_entries", size),
            &size,
            |b, &size| {
                let state = seeded_state(size);
                // Worst case: the match is the last entry.
                let candidate = DeliveryCandidate::new(format!("{}", 1000 + size - 1), "120");
                b.iter(|| {
                    black_box(validate(
                        &candidate,
                        &state.production_entries,
                        &state.delivery_entries,
                        None,
                    ))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_reducer_add, bench_validate);
criterion_main!(benches);
