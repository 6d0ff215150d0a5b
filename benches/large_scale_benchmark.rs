use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use forkmerge::prelude::*;
use forkmerge::record;
use rand::Rng;
use std::hint::black_box;
use std::time::Duration;

fn bench_1m_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("1M Records");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(90)); // Increase time for large sort setup overhead

    let mut rng = rand::rng();
    let count = 1_000_000;

    let input: Vec<Record> = (0..count)
        .map(|_| {
            let len = rng.random_range(8..24);
            let name: String = (0..len).map(|_| rng.random_range(b'a'..=b'z') as char).collect();
            record![name, rng.random_range(0..1_000)]
        })
        .collect();
    group.throughput(Throughput::Elements(count as u64));

    let keys = [SortKey::asc(1), SortKey::asc(0)];
    let pool = WorkerPool::new().unwrap();

    group.bench_function("forkmerge (serial)", |b| {
        b.iter_batched(
            || input.clone(),
            |data| sort(black_box(data), &keys, Mode::Serial).unwrap(),
            BatchSize::LargeInput,
        )
    });

    group.bench_function("forkmerge (parallel)", |b| {
        b.iter_batched(
            || input.clone(),
            |data| sort(black_box(data), &keys, Mode::Parallel(&pool)).unwrap(),
            BatchSize::LargeInput,
        )
    });

    group.finish();
    pool.shutdown();
}

criterion_group!(benches, bench_1m_records);
criterion_main!(benches);
