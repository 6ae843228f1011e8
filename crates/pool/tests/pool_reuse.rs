//! Resources are reused, and reset between holders

use std::time::Duration;

use cistern_pool::testing::MockFactory;
use cistern_pool::{Pool, PoolConfig, ReleaseOutcome};

fn single() -> PoolConfig {
    PoolConfig::fixed(1).with_wait_timeout(Duration::from_millis(100))
}

#[tokio::test]
async fn round_trip_returns_the_same_resource() {
    let factory = MockFactory::new("db");
    let pool = Pool::new(factory.clone(), single()).await.unwrap();

    let first = pool.acquire().await.unwrap();
    let first_id = first.id().to_string();
    assert_eq!(pool.release(first).await, ReleaseOutcome::Returned);

    let second = pool.acquire().await.unwrap();
    assert_eq!(second.id(), first_id);
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn previous_holder_state_is_rolled_back() {
    let factory = MockFactory::new("db");
    let pool = Pool::new(factory.clone(), single()).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    conn.begin_transaction();
    pool.release(conn).await;

    let conn = pool.acquire().await.unwrap();
    assert!(!conn.in_transaction(), "next holder saw an open transaction");
    assert_eq!(factory.resets(), 1);
}

#[tokio::test]
async fn every_release_resets() {
    let factory = MockFactory::new("db");
    let pool = Pool::new(factory.clone(), single()).await.unwrap();

    for _ in 0..10 {
        let lease = pool.acquire().await.unwrap();
        lease.release().await;
    }

    assert_eq!(factory.resets(), 10);
    let stats = pool.stats();
    assert_eq!(stats.acquisitions, 10);
    assert_eq!(stats.releases, 10);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.destroyed, 0);
}

#[tokio::test]
async fn held_for_is_tracked() {
    let pool = Pool::new(MockFactory::new("db"), single()).await.unwrap();
    let lease = pool.acquire().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(lease.held_for() >= Duration::from_millis(5));
}
