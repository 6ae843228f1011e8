//! Property tests for pool invariants.
//!
//! After any sequence of acquires, releases and breakages the live count
//! stays within `max_size` and `in_use` matches the leases actually held.

use std::time::Duration;

use cistern_pool::testing::MockFactory;
use cistern_pool::{Lease, Pool, PoolConfig};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Acquire,
    Release,
    BreakAndRelease,
    Maintain,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Acquire),
        3 => Just(Op::Release),
        1 => Just(Op::BreakAndRelease),
        1 => Just(Op::Maintain),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn live_count_never_exceeds_max(
        max_size in 1usize..6,
        min_fraction in 0usize..=100,
        replenish in any::<bool>(),
        ops in proptest::collection::vec(op(), 1..40),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let min_size = max_size * min_fraction / 100;
            let config = PoolConfig {
                min_size,
                max_size,
                wait_timeout: Duration::ZERO,
                replenish_on_discard: replenish,
                ..Default::default()
            };
            let factory = MockFactory::new("prop");
            let pool = Pool::new(factory.clone(), config).await.unwrap();
            let mut held: Vec<Lease<MockFactory>> = Vec::new();

            for op in &ops {
                match op {
                    Op::Acquire => match pool.acquire().await {
                        Ok(lease) => held.push(lease),
                        Err(err) => {
                            prop_assert!(err.is_retryable(), "unexpected error: {:?}", err);
                            prop_assert_eq!(held.len(), max_size);
                        }
                    },
                    Op::Release => {
                        if let Some(lease) = held.pop() {
                            pool.release(lease).await;
                        }
                    }
                    Op::BreakAndRelease => {
                        if let Some(lease) = held.pop() {
                            lease.invalidate();
                            pool.release(lease).await;
                        }
                    }
                    Op::Maintain => {
                        pool.maintain().await.unwrap();
                    }
                }
                tokio::task::yield_now().await;

                let stats = pool.stats();
                prop_assert!(
                    stats.total <= max_size,
                    "invariant violated: total={} > max_size={}",
                    stats.total, max_size,
                );
                prop_assert_eq!(stats.in_use, held.len());
                prop_assert_eq!(stats.idle + stats.in_use, stats.total);
            }

            for lease in held.drain(..) {
                pool.release(lease).await;
            }
            let stats = pool.stats();
            prop_assert_eq!(stats.in_use, 0);
            prop_assert!(stats.created - stats.destroyed <= max_size as u64);
            Ok(())
        })?;
    }
}

/// Deterministic: rapid acquire-release cycles never create extra resources.
#[tokio::test]
async fn rapid_acquire_release_reuses() {
    let factory = MockFactory::new("db");
    let config = PoolConfig {
        min_size: 0,
        max_size: 4,
        wait_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let pool = Pool::new(factory.clone(), config).await.unwrap();

    for _ in 0..50 {
        let lease = pool.acquire().await.unwrap();
        pool.release(lease).await;
    }

    assert_eq!(factory.created(), 1);
    assert_eq!(pool.stats().total, 1);
}
