//! Benchmarks for the set oracle, the hot path of dealer validation.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trey::{Oracle, SetOracle};

fn bench_test_set(c: &mut Criterion) {
    let oracle = SetOracle::new(3, 4);
    c.bench_function("test_set", |b| {
        b.iter(|| oracle.test_set(black_box(&[0, 40, 80])));
    });
}

fn bench_find_one_set_on_table(c: &mut Criterion) {
    let oracle = SetOracle::new(3, 4);
    let table: Vec<usize> = (0..12).map(|i| i * 7 % 81).collect();
    c.bench_function("find_one_set_on_table", |b| {
        b.iter(|| oracle.find_sets(black_box(&table), 1));
    });
}

fn bench_find_all_sets_on_table(c: &mut Criterion) {
    let oracle = SetOracle::new(3, 4);
    let table: Vec<usize> = (0..12).map(|i| i * 7 % 81).collect();
    c.bench_function("find_all_sets_on_table", |b| {
        b.iter(|| oracle.find_sets(black_box(&table), usize::MAX));
    });
}

fn bench_find_one_set_in_full_deck(c: &mut Criterion) {
    let oracle = SetOracle::new(3, 4);
    let deck: Vec<usize> = (0..81).collect();
    c.bench_function("find_one_set_in_full_deck", |b| {
        b.iter(|| oracle.find_sets(black_box(&deck), 1));
    });
}

criterion_group!(
    benches,
    bench_test_set,
    bench_find_one_set_on_table,
    bench_find_all_sets_on_table,
    bench_find_one_set_in_full_deck
);
criterion_main!(benches);
