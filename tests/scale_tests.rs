use forkmerge::prelude::*;
use forkmerge::record;
use rand::Rng;
use std::time::Instant;

fn random_records(count: usize) -> Vec<Record> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            let name_len = rng.random_range(4..12);
            let name: String = (0..name_len)
                .map(|_| rng.random_range(b'a'..=b'z') as char)
                .collect();
            record![name, rng.random_range(0..1_000_000), rng.random_range(0.0..1e6)]
        })
        .collect()
}

#[test]
fn test_sort_200k_serial_vs_parallel() {
    let count = 200_000;
    println!("Generating {} random records...", count);
    let input = random_records(count);
    let keys = [SortKey::asc(1), SortKey::desc(0)];

    let start = Instant::now();
    let serial = sort(input.clone(), &keys, Mode::Serial).unwrap();
    println!("Serial sort: {:?}", start.elapsed());

    let pool = WorkerPool::new().unwrap();
    let start = Instant::now();
    let parallel = sort(input, &keys, Mode::Parallel(&pool)).unwrap();
    println!("Parallel sort ({} workers): {:?}", pool.workers(), start.elapsed());
    pool.shutdown();

    assert_eq!(parallel.len(), count);
    for i in 0..count - 1 {
        let (a, b) = (&parallel[i], &parallel[i + 1]);
        assert!(a[1].try_cmp(&b[1]).unwrap().is_le(), "Sort failed at index {}", i);
    }
    assert_eq!(serial, parallel);
}

#[test]
#[ignore]
fn test_sort_10m_parallel() {
    // WARNING: several GB of RAM. Each record is an Arc'd slice of three values.
    let count = 10_000_000;
    println!("Generating {} random records... (Expect high RAM usage)", count);
    let input = random_records(count);

    let pool = WorkerPool::new().unwrap();
    let start = Instant::now();
    let sorted = sort(input, &[SortKey::asc(0), SortKey::asc(2)], Mode::Parallel(&pool)).unwrap();
    println!("Sorted 10M records in {:?}", start.elapsed());
    pool.shutdown();

    // Verify sample
    for i in (0..count - 1).step_by(10_000) {
        let (a, b) = (&sorted[i], &sorted[i + 1]);
        assert!(a[0].try_cmp(&b[0]).unwrap().is_le(), "Sort failed at index {}", i);
    }
}
