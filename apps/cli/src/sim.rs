//! Simulated database connections for the demo workload

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::bail;
use cistern_pool::{BoxError, Resource, ResourceFactory};

/// Statements the simulated clients run, cycled per round.
pub const STATEMENTS: [&str; 4] = ["select_user", "update_balance", "insert_order", "list_orders"];

/// Immutable, shareable plan for a statement; built once per statement.
#[derive(Debug)]
pub struct QueryPlan {
    pub statement: &'static str,
    pub sql: String,
    pub cost: u32,
}

impl QueryPlan {
    pub fn compile(statement: &'static str) -> Self {
        let (sql, cost) = match statement {
            "select_user" => ("SELECT * FROM users WHERE id = $1", 1),
            "update_balance" => ("UPDATE accounts SET balance = balance + $2 WHERE id = $1", 3),
            "insert_order" => ("INSERT INTO orders (user_id, total) VALUES ($1, $2)", 2),
            _ => ("SELECT * FROM orders ORDER BY created_at DESC LIMIT 50", 4),
        };
        tracing::debug!(statement, cost, "compiled query plan");
        Self {
            statement,
            sql: sql.to_string(),
            cost,
        }
    }
}

/// A fake connection: tracks transaction state and can break mid-query.
#[derive(Debug)]
pub struct SimulatedConnection {
    id: String,
    endpoint: Arc<str>,
    in_transaction: bool,
    statements: u64,
    broken: bool,
}

impl SimulatedConnection {
    pub fn begin(&mut self) {
        self.in_transaction = true;
    }

    pub fn commit(&mut self) {
        self.in_transaction = false;
    }

    /// Run `plan`, taking `work` per cost unit. With probability
    /// `failure_rate` the connection drops and stays broken.
    pub async fn execute(
        &mut self,
        plan: &QueryPlan,
        work: Duration,
        failure_rate: f64,
    ) -> anyhow::Result<()> {
        if self.broken {
            bail!("{}: connection to {} lost", self.id, self.endpoint);
        }
        tokio::time::sleep(work * plan.cost).await;
        if failure_rate > 0.0 && rand::random::<f64>() < failure_rate {
            self.broken = true;
            bail!("{}: connection reset while running {}", self.id, plan.statement);
        }
        self.statements += 1;
        tracing::trace!(connection = %self.id, sql = %plan.sql, "statement executed");
        Ok(())
    }
}

impl Resource for SimulatedConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_valid(&self) -> bool {
        !self.broken
    }

    async fn reset(&mut self) -> Result<(), BoxError> {
        if self.in_transaction {
            tracing::trace!(connection = %self.id, "rolling back open transaction");
            self.in_transaction = false;
        }
        Ok(())
    }

    async fn close(self) -> Result<(), BoxError> {
        tracing::debug!(
            connection = %self.id,
            statements = self.statements,
            "closing connection"
        );
        Ok(())
    }
}

/// Opens [`SimulatedConnection`]s to `host:port`.
pub struct SimulatedFactory {
    name: String,
    endpoint: Arc<str>,
    connect_latency: Duration,
    next: AtomicU64,
}

impl SimulatedFactory {
    pub fn new(name: impl Into<String>, host: &str, port: u16, connect_latency: Duration) -> Self {
        Self {
            name: name.into(),
            endpoint: Arc::from(format!("{host}:{port}")),
            connect_latency,
            next: AtomicU64::new(1),
        }
    }
}

impl ResourceFactory for SimulatedFactory {
    type Resource = SimulatedConnection;

    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self) -> Result<SimulatedConnection, BoxError> {
        tokio::time::sleep(self.connect_latency).await;
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(SimulatedConnection {
            id: format!("{}-conn-{n}", self.name),
            endpoint: Arc::clone(&self.endpoint),
            in_transaction: false,
            statements: 0,
            broken: false,
        })
    }
}
