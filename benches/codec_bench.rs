//! Criterion benchmarks for DenseBit
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use densebit::{BatchDecoder, BatchEncoder, StreamDecoder, StreamEncoder};

fn sample_sequences(count: usize, len: usize, max_value: u64) -> Vec<Vec<u64>> {
    (0..count)
        .map(|s| {
            (0..len)
                .map(|i| ((s * 7919 + i * 104_729) as u64) % (max_value + 1))
                .collect()
        })
        .collect()
}

fn bench_batch_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_encode");

    for bits in [3u32, 11, 31].iter() {
        let max_value = (1u64 << bits) - 1;
        let sequences = sample_sequences(100, 64, max_value);
        group.throughput(Throughput::Elements(100 * 64));

        group.bench_with_input(BenchmarkId::new("fixed", bits), &sequences, |b, sequences| {
            b.iter(|| {
                let mut encoder = BatchEncoder::new(max_value, 64, false).unwrap();
                for sequence in sequences {
                    encoder.encode_sequence(black_box(sequence)).unwrap();
                }
                black_box(encoder.finish().unwrap());
            });
        });

        group.bench_with_input(
            BenchmarkId::new("delimited", bits),
            &sequences,
            |b, sequences| {
                b.iter(|| {
                    let mut encoder = BatchEncoder::new(max_value, 0, true).unwrap();
                    for sequence in sequences {
                        encoder.encode_sequence(black_box(sequence)).unwrap();
                    }
                    black_box(encoder.finish().unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_batch_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_decode");

    for bits in [3u32, 11, 31].iter() {
        let max_value = (1u64 << bits) - 1;
        let mut encoder = BatchEncoder::new(max_value, 0, true).unwrap();
        for sequence in sample_sequences(100, 64, max_value) {
            encoder.encode_sequence(&sequence).unwrap();
        }
        let bytes = encoder.finish().unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("delimited", bits), &bytes, |b, bytes| {
            b.iter(|| {
                let mut decoder = BatchDecoder::new(black_box(&bytes[..]), true).unwrap();
                black_box(decoder.decode_all().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let values: Vec<u64> = (0..100_000u64).map(|i| (i * 31) % 1000).collect();
    let mut encoded = Vec::new();
    {
        let mut encoder = StreamEncoder::new(&mut encoded, 999, true).unwrap();
        encoder.extend(values.iter().copied()).unwrap();
    }

    c.bench_function("stream_encode_100k", |b| {
        let mut out = Vec::with_capacity(encoded.len());
        b.iter(|| {
            out.clear();
            let mut encoder = StreamEncoder::new(&mut out, 999, true).unwrap();
            encoder.extend(black_box(values.iter().copied())).unwrap();
            encoder.finish().unwrap();
        });
    });

    c.bench_function("stream_decode_100k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            StreamDecoder::new(black_box(&encoded[..]), true)
                .unwrap()
                .decode(|v| sum += v)
                .unwrap();
            black_box(sum);
        });
    });
}

criterion_group!(benches, bench_batch_encode, bench_batch_decode, bench_stream);
criterion_main!(benches);
