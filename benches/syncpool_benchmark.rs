use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use syncpool::{FairRwLock, JobGroup, WorkerPool};

// submit-and-wait throughput for tiny jobs
pub fn pool_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_bench");
    for &threads in &[1, 4, 8] {
        let pool = WorkerPool::new(threads).unwrap();
        group.bench_with_input(BenchmarkId::new("submit_wait", threads), &1000, |b, i| {
            b.iter(|| {
                let counter = Arc::new(AtomicUsize::new(0));
                for _ in 0..*i {
                    let counter = Arc::clone(&counter);
                    pool.submit(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    });
                }
                pool.wait_for_completion();
            })
        });
        group.bench_with_input(BenchmarkId::new("job_group", threads), &1000, |b, i| {
            b.iter(|| {
                let jobs = JobGroup::new(&pool);
                for _ in 0..*i {
                    jobs.submit(|| {});
                }
                jobs.wait_for_completion();
            })
        });
    }
    group.finish();
}

// read-mostly traffic with one writer every `ratio` operations
pub fn lock_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_bench");
    let pool = WorkerPool::new(4).unwrap();
    for &ratio in &[2usize, 10, 100] {
        group.bench_with_input(BenchmarkId::new("read_write", ratio), &ratio, |b, &ratio| {
            b.iter(|| {
                let value = Arc::new(FairRwLock::new(0u64));
                for worker in 0..4 {
                    let value = Arc::clone(&value);
                    pool.submit(move || {
                        for op in 0..1000usize {
                            if (op + worker) % ratio == 0 {
                                *value.write() += 1;
                            } else {
                                criterion::black_box(*value.read());
                            }
                        }
                    });
                }
                pool.wait_for_completion();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, pool_bench, lock_bench);
criterion_main!(benches);
