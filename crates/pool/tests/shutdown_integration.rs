//! Shutdown: idle resources close now, checked-out ones close on return

use std::collections::HashSet;
use std::time::Duration;

use cistern_pool::testing::MockFactory;
use cistern_pool::{DiscardReason, Error, Pool, PoolConfig, PoolState, ReleaseOutcome};

fn fixed(size: usize) -> PoolConfig {
    PoolConfig::fixed(size).with_wait_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn idle_closed_now_in_use_closed_on_release() {
    let factory = MockFactory::new("db");
    let pool = Pool::new(factory.clone(), fixed(3)).await.unwrap();

    let held = pool.acquire().await.unwrap();
    assert_eq!(held.id(), "db-1");

    pool.shutdown().await.unwrap();
    assert_eq!(factory.closed_ids(), vec!["db-2".to_string(), "db-3".to_string()]);
    assert_eq!(pool.state(), PoolState::Closing);
    assert_eq!(pool.stats().in_use, 1);

    let outcome = pool.release(held).await;
    assert_eq!(outcome, ReleaseOutcome::Discarded(DiscardReason::Shutdown));
    assert_eq!(pool.state(), PoolState::Closed);

    let closed = factory.closed_ids();
    let unique: HashSet<_> = closed.iter().collect();
    assert_eq!(closed.len(), 3);
    assert_eq!(unique.len(), 3, "every resource closed exactly once");
    assert_eq!(factory.resets(), 0, "nothing is reset after shutdown");
}

#[tokio::test]
async fn acquire_after_shutdown_fails() {
    let pool = Pool::new(MockFactory::new("db"), fixed(1)).await.unwrap();
    pool.shutdown().await.unwrap();

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, Error::PoolClosed { .. }), "got: {err:?}");
    assert!(!err.is_retryable());
    assert_eq!(pool.state(), PoolState::Closed);
}

#[tokio::test]
async fn blocked_waiters_are_woken_with_pool_closed() {
    let pool = Pool::new(MockFactory::new("db"), fixed(1)).await.unwrap();
    let held = pool.acquire().await.unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.shutdown().await.unwrap();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter must be woken by shutdown")
            .unwrap();
        assert!(matches!(result, Err(Error::PoolClosed { .. })));
    }
    drop(held);
}

#[tokio::test]
async fn dropped_lease_after_shutdown_is_closed() {
    let factory = MockFactory::new("db");
    let pool = Pool::new(factory.clone(), fixed(1)).await.unwrap();

    let held = pool.acquire().await.unwrap();
    pool.shutdown().await.unwrap();
    drop(held);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(factory.closed_ids(), vec!["db-1".to_string()]);
    assert_eq!(pool.state(), PoolState::Closed);
}

#[tokio::test]
async fn close_failures_are_collected() {
    let factory = MockFactory::new("db");
    let pool = Pool::new(factory.clone(), fixed(2)).await.unwrap();
    factory.fail_closes(true);

    let err = pool.shutdown().await.unwrap_err();
    match err {
        Error::Shutdown { pool: name, failures } => {
            assert_eq!(name, "db");
            let ids: Vec<_> = failures.iter().map(|(id, _)| id.as_str()).collect();
            assert_eq!(ids, vec!["db-1", "db-2"]);
        }
        other => panic!("expected Shutdown, got: {other:?}"),
    }
    assert_eq!(pool.state(), PoolState::Closed, "shutdown completes despite failures");
    assert!(pool.shutdown().await.is_ok(), "second shutdown is a no-op");
}

#[tokio::test]
async fn maintain_after_shutdown_fails() {
    let pool = Pool::new(MockFactory::new("db"), fixed(1)).await.unwrap();
    pool.shutdown().await.unwrap();
    assert!(matches!(pool.maintain().await, Err(Error::PoolClosed { .. })));
}
