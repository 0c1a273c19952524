//! Posting key codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docindex_bench::random_value;
use docindex_core::index::codec::{
    decode_ancestor, decode_posting, encode_ancestor, encode_posting, ShardRef,
};
use docindex_core::Code;

/// Benchmark posting encoding.
fn bench_encode_posting(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_posting");

    for len in [8, 64, 512].iter() {
        group.throughput(Throughput::Bytes(*len as u64));
        group.bench_with_input(BenchmarkId::new("unsharded", len), len, |b, &len| {
            let value = random_value(len);
            b.iter(|| {
                let key = encode_posting(Code(7), "doc-000001", black_box(&value), None).unwrap();
                black_box(key);
            });
        });
        group.bench_with_input(BenchmarkId::new("sharded", len), len, |b, &len| {
            let value = random_value(len);
            let shard = ShardRef {
                code: Code(3),
                value: "eu-west",
            };
            b.iter(|| {
                let key =
                    encode_posting(Code(7), "doc-000001", black_box(&value), Some(shard)).unwrap();
                black_box(key);
            });
        });
    }

    // Values that need escaping
    group.bench_function("escaped", |b| {
        let value = "a\u{0}b\u{1}c".repeat(16);
        b.iter(|| {
            let key = encode_posting(Code(7), "doc-000001", black_box(&value), None).unwrap();
            black_box(key);
        });
    });

    group.finish();
}

/// Benchmark posting decoding.
fn bench_decode_posting(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_posting");

    for len in [8, 64, 512].iter() {
        group.throughput(Throughput::Bytes(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, &len| {
            let shard = ShardRef {
                code: Code(3),
                value: "eu-west",
            };
            let key = encode_posting(Code(7), "doc-000001", &random_value(len), Some(shard))
                .unwrap();
            b.iter(|| {
                let decoded = decode_posting(black_box(&key)).unwrap();
                black_box(decoded);
            });
        });
    }
    group.finish();
}

/// Benchmark ancestor record round trips.
fn bench_ancestor(c: &mut Criterion) {
    let mut group = c.benchmark_group("ancestor");

    for count in [1, 16, 256].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let keys: Vec<Vec<u8>> = (0..count)
                .map(|i| {
                    encode_posting(Code(i as u64 + 1), "doc-000001", &random_value(16), None)
                        .unwrap()
                })
                .collect();
            b.iter(|| {
                let data = encode_ancestor(black_box(&keys));
                let back = decode_ancestor(&data).unwrap();
                black_box(back);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_encode_posting,
    bench_decode_posting,
    bench_ancestor,
);

criterion_main!(benches);
