//! Batch operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stridekv_bench::{generate_entries, pack_tape, shuffled_keys};
use stridekv_core::{
    Database, Key, Lengths, Options, ReadRequest, ScanRequest, SizeRequest, Strided, ValueView,
    WriteRequest,
};

fn populated(count: usize, payload: usize) -> Database {
    let db = Database::open_in_memory().unwrap();
    let entries = generate_entries(count, payload);
    let keys: Vec<Key> = entries.iter().map(|(k, _)| *k).collect();
    let values: Vec<&[u8]> = entries.iter().map(|(_, v)| v.as_slice()).collect();
    db.write(None, &WriteRequest::puts(&keys, &values), Options::NONE)
        .unwrap();
    db
}

/// Benchmark batched head writes from per-task slices.
fn bench_batch_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_write");

    for batch_size in [1, 16, 256, 4096].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = Database::open_in_memory().unwrap();
                let entries = generate_entries(batch_size, 64);
                let keys: Vec<Key> = entries.iter().map(|(k, _)| *k).collect();
                let values: Vec<&[u8]> = entries.iter().map(|(_, v)| v.as_slice()).collect();

                b.iter(|| {
                    let request = WriteRequest::puts(black_box(&keys), black_box(&values));
                    db.write(None, &request, Options::NONE).unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark writes that slice every value out of one shared tape.
fn bench_tape_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("tape_write");

    for batch_size in [16, 256, 4096].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = Database::open_in_memory().unwrap();
                let entries = generate_entries(batch_size, 64);
                let keys: Vec<Key> = entries.iter().map(|(k, _)| *k).collect();
                let values: Vec<Vec<u8>> = entries.into_iter().map(|(_, v)| v).collect();
                let (tape, offsets, lengths) = pack_tape(&values);

                b.iter(|| {
                    let view = ValueView::new(Strided::repeat(Some(tape.as_slice())))
                        .with_offsets(Strided::slice(&offsets))
                        .with_lengths(Lengths::Explicit(Strided::slice(&lengths)));
                    let request = WriteRequest::new(keys.len(), Strided::slice(&keys)).with_values(view);
                    db.write(None, black_box(&request), Options::NONE).unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark batched point reads into a reused arena.
fn bench_batch_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_read");

    for batch_size in [1, 16, 256, 4096].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = populated(10_000, 64);
                let keys: Vec<Key> = shuffled_keys(10_000).into_iter().take(batch_size).collect();
                let mut arena = db.new_arena();

                b.iter(|| {
                    let request = ReadRequest::from_keys(black_box(&keys));
                    let out = db.read(None, &request, Options::NONE, &mut arena).unwrap();
                    black_box(out.tape().len());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark length-only reads, which skip copying values.
fn bench_read_lengths(c: &mut Criterion) {
    let db = populated(10_000, 1024);
    let keys = shuffled_keys(1024);
    let mut arena = db.new_arena();

    c.bench_function("read_lengths_1024", |b| {
        b.iter(|| {
            let request = ReadRequest::from_keys(black_box(&keys));
            let out = db
                .read(None, &request, Options::READ_LENGTHS, &mut arena)
                .unwrap();
            black_box(out.lengths().len());
        });
    });
}

/// Benchmark transactional reads with tracking and a commit.
fn bench_tracked_transaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracked_transaction");

    for batch_size in [16, 256].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = populated(10_000, 64);
                let keys: Vec<Key> = shuffled_keys(10_000).into_iter().take(batch_size).collect();
                let values: Vec<&[u8]> = vec![&b"updated"[..]; batch_size];
                let mut arena = db.new_arena();
                let mut txn = db.begin(0, Options::NONE).unwrap();

                b.iter(|| {
                    db.read(
                        Some(&mut txn),
                        &ReadRequest::from_keys(&keys),
                        Options::TRACK_READS,
                        &mut arena,
                    )
                    .unwrap();
                    db.write(Some(&mut txn), &WriteRequest::puts(&keys, &values), Options::NONE)
                        .unwrap();
                    txn.commit(Options::NONE).unwrap();
                    txn.reset(0, Options::NONE).unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark ordered scans.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for limit in [10u32, 100, 1000].iter() {
        group.throughput(Throughput::Elements(u64::from(*limit)));
        group.bench_with_input(BenchmarkId::from_parameter(limit), limit, |b, &limit| {
            let db = populated(10_000, 64);
            let mut arena = db.new_arena();

            b.iter(|| {
                let request = ScanRequest::single(black_box(5_000), limit);
                let out = db.scan(None, &request, Options::NONE, &mut arena).unwrap();
                black_box(out.keys(0).len());
            });
        });
    }
    group.finish();
}

/// Benchmark range size estimates.
fn bench_size(c: &mut Criterion) {
    let db = populated(10_000, 64);
    let mut arena = db.new_arena();

    c.bench_function("size_full_range", |b| {
        b.iter(|| {
            let request = SizeRequest::single(black_box(Key::MIN), Key::MAX);
            let out = db.size(None, &request, Options::NONE, &mut arena).unwrap();
            black_box(out.get(0));
        });
    });
}

criterion_group!(
    benches,
    bench_batch_write,
    bench_tape_write,
    bench_batch_read,
    bench_read_lengths,
    bench_tracked_transaction,
    bench_scan,
    bench_size,
);
criterion_main!(benches);
