//! Layered configuration: defaults → `cistern.toml` → `CISTERN_*` env → flags

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, ensure};
use cistern_pool::PoolConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Config file read when `--config` is not given (and it exists).
pub const DEFAULT_CONFIG_FILE: &str = "cistern.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pool: PoolSection,
    pub simulation: SimulationConfig,
}

/// `[pool]` section. Durations are plain integers so the file stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub name: String,
    pub min_size: usize,
    pub max_size: usize,
    pub wait_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lifetime_secs: Option<u64>,
    pub replenish_on_discard: bool,
}

impl Default for PoolSection {
    fn default() -> Self {
        let pool = PoolConfig::default();
        Self {
            name: "db".to_string(),
            min_size: pool.min_size,
            max_size: pool.max_size,
            wait_timeout_ms: pool.wait_timeout.as_millis() as u64,
            idle_timeout_secs: None,
            max_lifetime_secs: None,
            replenish_on_discard: pool.replenish_on_discard,
        }
    }
}

impl PoolSection {
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig {
            min_size: self.min_size,
            max_size: self.max_size,
            wait_timeout: Duration::from_millis(self.wait_timeout_ms),
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            max_lifetime: self.max_lifetime_secs.map(Duration::from_secs),
            replenish_on_discard: self.replenish_on_discard,
        }
    }
}

/// `[simulation]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub host: String,
    pub port: u16,
    /// Concurrent clients
    pub clients: usize,
    /// Queries per client
    pub rounds: usize,
    /// Probability that a query breaks its connection
    pub failure_rate: f64,
    /// Simulated query time
    pub work_ms: u64,
    /// Simulated connect time
    pub connect_latency_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            clients: 8,
            rounds: 50,
            failure_rate: 0.02,
            work_ms: 2,
            connect_latency_ms: 5,
        }
    }
}

impl AppConfig {
    /// Resolve the effective configuration.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => {
                ensure!(path.is_file(), "config file {} not found", path.display());
                path.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed("CISTERN_").split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()
            .with_context(|| format!("invalid configuration (file: {})", file.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.pool
            .to_pool_config()
            .validate()
            .context("invalid [pool] section")?;
        let sim = &self.simulation;
        ensure!(sim.clients > 0, "simulation.clients must be greater than 0");
        ensure!(
            (0.0..=1.0).contains(&sim.failure_rate),
            "simulation.failure_rate must be within 0.0..=1.0, got {}",
            sim.failure_rate
        );
        Ok(())
    }
}

/// Values given on the command line; unset fields leave lower layers alone.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    pub pool: PoolOverrides,
    pub simulation: SimulationOverrides,
}

#[derive(Debug, Default, Serialize)]
pub struct PoolOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Serialize)]
pub struct SimulationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_ms: Option<u64>,
}
