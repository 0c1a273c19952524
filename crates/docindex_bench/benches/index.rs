//! Index update and query benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docindex_bench::{batch_records, document_records};
use docindex_core::{Condition, IndexService, Operator, Query};
use docindex_kv::InMemoryEngine;

/// Benchmark indexing fresh documents.
fn bench_apply_new(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_new");

    for fields in [1, 8, 32].iter() {
        group.throughput(Throughput::Elements(*fields as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fields), fields, |b, &fields| {
            let service = IndexService::new(InMemoryEngine::new());
            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                let records = document_records(&format!("doc-{n}"), fields, 16);
                let stats = service
                    .apply_index("bench", black_box(records), false, false)
                    .unwrap();
                black_box(stats);
            });
        });
    }
    group.finish();
}

/// Benchmark re-indexing an unchanged document.
fn bench_apply_unchanged(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_unchanged");

    for fields in [1, 8, 32].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(fields), fields, |b, &fields| {
            let service = IndexService::new(InMemoryEngine::new());
            let records = document_records("doc-1", fields, 16);
            service
                .apply_index("bench", records.clone(), false, false)
                .unwrap();
            b.iter(|| {
                let stats = service
                    .apply_index("bench", black_box(records.clone()), false, false)
                    .unwrap();
                black_box(stats);
            });
        });
    }
    group.finish();
}

/// Benchmark a partial update touching one field.
fn bench_partial_update(c: &mut Criterion) {
    c.bench_function("partial_update", |b| {
        let service = IndexService::new(InMemoryEngine::new());
        service
            .apply_index("bench", document_records("doc-1", 32, 16), false, false)
            .unwrap();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let record = docindex_core::FieldRecord::new(
                "doc-1",
                "profile",
                "field_1",
                format!("v{n}"),
            );
            let stats = service
                .apply_index("bench", vec![record], true, false)
                .unwrap();
            black_box(stats);
        });
    });
}

/// Benchmark range queries over a populated namespace.
fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let service = IndexService::new(InMemoryEngine::new());
    service
        .apply_index("bench", batch_records(2000, 4, 8), false, false)
        .unwrap();

    for limit in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*limit as u64));
        group.bench_with_input(BenchmarkId::new("ge", limit), limit, |b, &limit| {
            let query =
                Query::new("profile", Condition::new("field_1", Operator::Ge, "m")).limit(limit);
            b.iter(|| {
                let page = service.query_keys("bench", black_box(&query)).unwrap();
                black_box(page);
            });
        });
    }

    group.bench_function("ge_sharded", |b| {
        let query = Query::new("profile", Condition::new("field_0", Operator::Ge, ""))
            .shard("region", "eu")
            .limit(100);
        b.iter(|| {
            let page = service.query_keys("bench", black_box(&query)).unwrap();
            black_box(page);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_apply_new,
    bench_apply_unchanged,
    bench_partial_update,
    bench_query,
);

criterion_main!(benches);
