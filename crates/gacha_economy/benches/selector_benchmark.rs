//! Benchmark for weighted selection.
//!
//! Run with: cargo bench --package gacha_economy --bench selector_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gacha_economy::{CatalogEntry, WeightedSelector};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn create_catalog(size: usize) -> Vec<CatalogEntry> {
    (0..size)
        .map(|i| {
            // Rarity-like spread: most entries common, a few rare.
            let weight = match i % 10 {
                0 => 1,
                1 | 2 => 10,
                _ => 70,
            };
            CatalogEntry::new(format!("entry-{i}"), format!("Entry {i}"), weight)
        })
        .collect()
}

fn benchmark_single_draw(c: &mut Criterion) {
    let catalog = create_catalog(100);
    let selector = WeightedSelector::new(&catalog).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(1);

    c.bench_function("single_draw_100_entries", |b| {
        b.iter(|| black_box(selector.draw_index(&mut rng)));
    });
}

fn benchmark_catalog_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("draw_10k");
    group.throughput(Throughput::Elements(10_000));

    for size in [4usize, 64, 1024] {
        let catalog = create_catalog(size);
        let selector = WeightedSelector::new(&catalog).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let mut rng = ChaCha20Rng::seed_from_u64(7);
            b.iter(|| black_box(selector.select(&mut rng, 10_000)));
        });
    }

    group.finish();
}

fn benchmark_table_build(c: &mut Criterion) {
    let catalog = create_catalog(1024);
    c.bench_function("build_table_1024_entries", |b| {
        b.iter(|| black_box(WeightedSelector::new(black_box(&catalog)).unwrap()));
    });
}

criterion_group!(
    benches,
    benchmark_single_draw,
    benchmark_catalog_sizes,
    benchmark_table_build
);
criterion_main!(benches);
