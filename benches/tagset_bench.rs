//! Benchmarks for the tagset algebra
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tagstore::tagset::*;

fn candidate(i: usize, width: usize) -> Tagset {
    (0..width)
        .map(|n| Tag::new(format!("name{}", n), format!("{}", (i + n) % 7)))
        .collect()
}

fn bench_subset(c: &mut Criterion) {
    let mut group = c.benchmark_group("subset");

    for width in [4, 16, 64] {
        let target = candidate(3, width);
        let pattern = Tagset::new().tag("name1", "4").wildcard("name2");

        group.bench_function(format!("is_subset_of_{}", width), |b| {
            b.iter(|| black_box(&pattern).is_subset_of(black_box(&target)))
        });
    }

    group.finish();
}

fn bench_permutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("permutation");

    for size in [4, 16, 64] {
        let candidates: Vec<Tagset> = (0..size).map(|i| candidate(i, 8)).collect();
        // Queries mirror the candidates in reverse order, so a full matching exists
        let queries: Vec<Tagset> = (0..size)
            .rev()
            .map(|i| Tagset::new().tag("name0", format!("{}", i % 7)).tag("name1", format!("{}", (i + 1) % 7)))
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("permutation_is_superset_{}", size), |b| {
            b.iter(|| permutation_is_superset(black_box(&candidates), black_box(&queries)))
        });
    }

    group.finish();
}

fn bench_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("text");
    let text = "kind=temperature,room=kitchen,unit=C,sensor=a\\,b,site=lab\\=1";

    group.bench_function("parse", |b| {
        b.iter(|| parse_tagset(black_box(text)).unwrap())
    });

    let tagset = parse_tagset(text).unwrap();
    group.bench_function("format", |b| b.iter(|| format_tagset(black_box(&tagset))));

    group.finish();
}

criterion_group!(benches, bench_subset, bench_permutation, bench_text);
criterion_main!(benches);
