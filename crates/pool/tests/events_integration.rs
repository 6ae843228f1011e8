//! Pool lifecycle events on the `EventBus`

use std::sync::Arc;
use std::time::Duration;

use cistern_pool::testing::MockFactory;
use cistern_pool::{DiscardReason, EventBus, Pool, PoolConfig, PoolEvent};
use tokio::sync::broadcast;

fn drain(rx: &mut broadcast::Receiver<PoolEvent>) -> Vec<PoolEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn lifecycle_events_in_order() {
    let bus = Arc::new(EventBus::new(64));
    let mut rx = bus.subscribe();

    let config = PoolConfig::fixed(1).with_wait_timeout(Duration::from_millis(100));
    let pool = Pool::with_events(MockFactory::new("db"), config, Arc::clone(&bus))
        .await
        .unwrap();
    let lease = pool.acquire().await.unwrap();
    pool.release(lease).await;
    pool.shutdown().await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 6, "got: {events:#?}");
    assert!(matches!(&events[0], PoolEvent::Created { resource_id, .. } if resource_id == "db-1"));
    assert!(matches!(&events[1], PoolEvent::Acquired { resource_id, .. } if resource_id == "db-1"));
    assert!(matches!(&events[2], PoolEvent::Released { resource_id, .. } if resource_id == "db-1"));
    assert!(matches!(&events[3], PoolEvent::ShutdownStarted { in_use: 0, .. }));
    assert!(matches!(
        &events[4],
        PoolEvent::Discarded { reason: DiscardReason::Shutdown, .. }
    ));
    assert!(matches!(&events[5], PoolEvent::Closed { pool } if pool == "db"));
}

#[tokio::test]
async fn exhaustion_and_creation_failure_are_reported() {
    let bus = Arc::new(EventBus::default());
    let factory = MockFactory::new("db");
    let config = PoolConfig {
        min_size: 0,
        max_size: 1,
        wait_timeout: Duration::ZERO,
        ..Default::default()
    };
    let pool = Pool::with_events(factory.clone(), config, Arc::clone(&bus))
        .await
        .unwrap();
    let mut rx = bus.subscribe();

    factory.fail_after(0);
    assert!(pool.acquire().await.is_err());
    factory.heal();
    let _held = pool.acquire().await.unwrap();
    assert!(pool.acquire().await.is_err());

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, PoolEvent::CreationFailed { error, .. } if error.contains("refused"))));
    assert!(events.iter().any(|e| matches!(e, PoolEvent::Exhausted { .. })));
}

#[tokio::test]
async fn discard_reason_is_reported() {
    let bus = Arc::new(EventBus::default());
    let config = PoolConfig {
        min_size: 0,
        max_size: 1,
        replenish_on_discard: false,
        ..Default::default()
    };
    let pool = Pool::with_events(MockFactory::new("db"), config, Arc::clone(&bus))
        .await
        .unwrap();
    let mut rx = bus.subscribe();

    let conn = pool.acquire().await.unwrap();
    conn.invalidate();
    pool.release(conn).await;

    let conn = pool.acquire().await.unwrap();
    let detached = conn.detach();

    let reasons: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            PoolEvent::Discarded { resource_id, reason, .. } => Some((resource_id, reason)),
            _ => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("db-1".to_string(), DiscardReason::InvalidOnRelease),
            ("db-2".to_string(), DiscardReason::Detached),
        ]
    );
    drop(detached);
}

#[tokio::test]
async fn pool_without_bus_emits_nothing() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let pool = Pool::new(MockFactory::new("db"), PoolConfig::fixed(1)).await.unwrap();
    let _lease = pool.acquire().await.unwrap();
    assert!(drain(&mut rx).is_empty());
}
