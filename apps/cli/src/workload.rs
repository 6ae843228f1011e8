//! The `simulate` workload: concurrent clients against one pool

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cistern_pool::{Error, EventBus, Pool, PoolEvent, PoolStats, SharedCache};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{AppConfig, SimulationConfig};
use crate::sim::{QueryPlan, STATEMENTS, SimulatedFactory};

type PlanCache = SharedCache<&'static str, QueryPlan>;

/// Outcome of one `simulate` run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub pool: String,
    pub elapsed_ms: u64,
    pub clients: usize,
    pub rounds: usize,
    pub queries: ClientTotals,
    pub plan_cache: PlanCacheSummary,
    pub events: EventTally,
    /// Pool snapshot taken after the workload and before shutdown.
    pub stats: PoolStats,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ClientTotals {
    pub completed: u64,
    pub failed: u64,
    pub exhausted: u64,
    pub cancelled: u64,
}

impl std::ops::AddAssign for ClientTotals {
    fn add_assign(&mut self, other: Self) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.exhausted += other.exhausted;
        self.cancelled += other.cancelled;
    }
}

#[derive(Debug, Serialize)]
pub struct PlanCacheSummary {
    pub plans: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Lifecycle events seen on the bus, by kind.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct EventTally {
    pub created: u64,
    pub creation_failed: u64,
    pub acquired: u64,
    pub released: u64,
    pub discarded: u64,
    pub exhausted: u64,
    pub lagged: u64,
}

impl EventTally {
    fn record(&mut self, event: &PoolEvent) {
        match event {
            PoolEvent::Created { .. } => self.created += 1,
            PoolEvent::CreationFailed { .. } => self.creation_failed += 1,
            PoolEvent::Acquired { .. } => self.acquired += 1,
            PoolEvent::Released { .. } => self.released += 1,
            PoolEvent::Discarded { .. } => self.discarded += 1,
            PoolEvent::Exhausted { .. } => self.exhausted += 1,
            PoolEvent::ShutdownStarted { .. } | PoolEvent::Closed { .. } => {}
        }
    }
}

async fn tally_events(mut rx: broadcast::Receiver<PoolEvent>) -> EventTally {
    let mut tally = EventTally::default();
    loop {
        match rx.recv().await {
            Ok(PoolEvent::Closed { .. }) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(event) => tally.record(&event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event subscriber lagged");
                tally.lagged += missed;
            }
        }
    }
    tally
}

/// Run the workload described by `config` until done or `cancel` fires.
pub async fn run(config: &AppConfig, cancel: CancellationToken) -> anyhow::Result<Report> {
    let sim = &config.simulation;
    let factory = SimulatedFactory::new(
        config.pool.name.clone(),
        &sim.host,
        sim.port,
        Duration::from_millis(sim.connect_latency_ms),
    );

    let bus = Arc::new(EventBus::new(4096));
    let tally = tokio::spawn(tally_events(bus.subscribe()).in_current_span());
    let pool = Pool::with_events(factory, config.pool.to_pool_config(), Arc::clone(&bus))
        .await
        .context("failed to create pool")?;

    let plans: Arc<PlanCache> = Arc::new(SharedCache::new());
    let started = Instant::now();

    let mut clients = JoinSet::new();
    for client in 0..sim.clients {
        clients.spawn(
            run_client(
                client,
                pool.clone(),
                Arc::clone(&plans),
                sim.clone(),
                cancel.clone(),
            )
            .in_current_span(),
        );
    }
    let mut queries = ClientTotals::default();
    while let Some(totals) = clients.join_next().await {
        queries += totals.context("client task panicked")?;
    }
    let elapsed = started.elapsed();

    if let Err(error) = pool.maintain().await {
        tracing::warn!(%error, "post-run maintenance failed");
    }
    let stats = pool.stats();
    pool.shutdown()
        .await
        .context("pool shut down with close failures")?;
    let events = tally.await.context("event subscriber panicked")?;

    let cache = plans.stats();
    Ok(Report {
        pool: pool.name().to_string(),
        elapsed_ms: elapsed.as_millis() as u64,
        clients: sim.clients,
        rounds: sim.rounds,
        queries,
        plan_cache: PlanCacheSummary {
            plans: cache.entries,
            hits: cache.hits,
            misses: cache.misses,
        },
        events,
        stats,
    })
}

async fn run_client(
    client: usize,
    pool: Pool<SimulatedFactory>,
    plans: Arc<PlanCache>,
    sim: SimulationConfig,
    cancel: CancellationToken,
) -> ClientTotals {
    let mut totals = ClientTotals::default();
    let wait = pool.config().wait_timeout;
    let work = Duration::from_millis(sim.work_ms);

    for round in 0..sim.rounds {
        let mut conn = match pool.acquire_with_cancel(wait, &cancel).await {
            Ok(conn) => conn,
            Err(Error::Cancelled { .. }) => {
                totals.cancelled += (sim.rounds - round) as u64;
                break;
            }
            Err(error) if error.is_retryable() => {
                tracing::debug!(client, %error, "gave up waiting for a connection");
                totals.exhausted += 1;
                continue;
            }
            Err(error) => {
                tracing::warn!(client, %error, "acquire failed");
                totals.failed += 1;
                continue;
            }
        };

        let statement = STATEMENTS[(client + round) % STATEMENTS.len()];
        let plan = plans.get_or_create(statement, |&statement| QueryPlan::compile(statement));

        conn.begin();
        match conn.execute(&plan, work, sim.failure_rate).await {
            Ok(()) => {
                // Every fourth transaction is left open for reset to roll back.
                if round % 4 != 0 {
                    conn.commit();
                }
                totals.completed += 1;
            }
            Err(error) => {
                tracing::debug!(client, %error, "query failed");
                totals.failed += 1;
            }
        }
        pool.release(conn).await;
    }
    totals
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let q = &self.queries;
        let s = &self.stats;
        writeln!(f, "pool '{}' finished in {} ms", self.pool, self.elapsed_ms)?;
        writeln!(f, "  clients x rounds  : {} x {}", self.clients, self.rounds)?;
        writeln!(
            f,
            "  queries           : {} ok, {} failed, {} exhausted, {} cancelled",
            q.completed, q.failed, q.exhausted, q.cancelled
        )?;
        writeln!(
            f,
            "  resources         : {} created, {} destroyed, max {}",
            s.created, s.destroyed, s.max_size
        )?;
        writeln!(
            f,
            "  checkouts         : {} acquired, {} released",
            s.acquisitions, s.releases
        )?;
        writeln!(
            f,
            "  plan cache        : {} plans, {} hits, {} misses",
            self.plan_cache.plans, self.plan_cache.hits, self.plan_cache.misses
        )?;
        write!(
            f,
            "  events            : {} discarded, {} exhausted, {} creation failures",
            self.events.discarded, self.events.exhausted, self.events.creation_failed
        )
    }
}
