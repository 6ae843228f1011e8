// Pool throughput benchmarks.
//
// Measures acquire/release overhead with a resource whose lifecycle calls
// do no work, so only pool bookkeeping is timed.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cistern_pool::{BoxError, Pool, PoolConfig, Resource, ResourceFactory, SharedCache};
use criterion::{Criterion, criterion_group, criterion_main};

struct NoOpResource(String);

impl Resource for NoOpResource {
    fn id(&self) -> &str {
        &self.0
    }

    async fn is_valid(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct NoOpFactory {
    next: AtomicU64,
}

impl ResourceFactory for NoOpFactory {
    type Resource = NoOpResource;

    fn name(&self) -> &str {
        "bench-noop"
    }

    async fn create(&self) -> Result<NoOpResource, BoxError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(NoOpResource(format!("noop-{n}")))
    }
}

fn pool_config(max_size: usize) -> PoolConfig {
    PoolConfig {
        min_size: max_size,
        max_size,
        wait_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn single_thread_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");
    let pool = rt
        .block_on(Pool::new(NoOpFactory::default(), pool_config(8)))
        .expect("failed to create pool");

    c.bench_function("single_thread_acquire_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let lease = pool.acquire().await.unwrap();
                black_box(lease.id().len());
                pool.release(lease).await
            })
        });
    });
}

fn contended_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("failed to build runtime");
    let pool = rt
        .block_on(Pool::new(NoOpFactory::default(), pool_config(4)))
        .expect("failed to create pool");

    c.bench_function("contended_16_tasks_4_slots", |b| {
        b.iter(|| {
            rt.block_on(async {
                let tasks: Vec<_> = (0..16)
                    .map(|_| {
                        let pool = pool.clone();
                        tokio::spawn(async move {
                            let lease = pool.acquire().await.unwrap();
                            pool.release(lease).await
                        })
                    })
                    .collect();
                for task in tasks {
                    black_box(task.await.unwrap());
                }
            })
        });
    });
}

fn shared_cache_hits(c: &mut Criterion) {
    let cache: SharedCache<u32, String> = SharedCache::new();
    for key in 0..64 {
        cache.get_or_create(key, |k| format!("style-{k}"));
    }

    c.bench_function("shared_cache_hit", |b| {
        let mut key = 0u32;
        b.iter(|| {
            key = (key + 1) % 64;
            black_box(cache.get_or_create(key, |_| unreachable!()));
        });
    });
}

criterion_group!(benches, single_thread_throughput, contended_throughput, shared_cache_hits);
criterion_main!(benches);
