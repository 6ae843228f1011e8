use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

mod config;
mod sim;
mod workload;

use config::{AppConfig, Overrides, PoolOverrides, SimulationOverrides};

#[derive(Debug, Parser)]
#[command(name = "cistern", author, version, about = "Bounded resource pool demo")]
struct Cli {
    /// Config file [default: ./cistern.toml when present]
    #[arg(long, short = 'c', global = true, env = "CISTERN_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `cistern_pool=trace` (overrides CISTERN_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format: pretty, compact or json (overrides CISTERN_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<cistern_log::Format>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run concurrent clients against a pool of simulated connections
    Simulate(SimulateArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct PoolArgs {
    /// Resources created up front
    #[arg(long)]
    min_size: Option<usize>,
    /// Maximum live resources
    #[arg(long)]
    max_size: Option<usize>,
    /// Acquire wait timeout in milliseconds (0 = fail fast)
    #[arg(long)]
    wait_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct SimulateArgs {
    #[command(flatten)]
    pool: PoolArgs,
    /// Concurrent clients
    #[arg(long)]
    clients: Option<usize>,
    /// Queries per client
    #[arg(long)]
    rounds: Option<usize>,
    /// Probability that a query breaks its connection
    #[arg(long)]
    failure_rate: Option<f64>,
    /// Simulated query time in milliseconds
    #[arg(long)]
    work_ms: Option<u64>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(flatten)]
    pool: PoolArgs,
    /// Print as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

impl PoolArgs {
    fn overrides(&self) -> PoolOverrides {
        PoolOverrides {
            min_size: self.min_size,
            max_size: self.max_size,
            wait_timeout_ms: self.wait_ms,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = cistern_log::Config::from_env().with_service("cistern");
    if let Some(level) = &cli.log_level {
        log_config.level.clone_from(level);
    }
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    let log_guard = cistern_log::init_with(log_config).context("failed to initialize logging")?;

    run(cli).instrument(log_guard.span().clone()).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Simulate(args) => {
            let overrides = Overrides {
                pool: args.pool.overrides(),
                simulation: SimulationOverrides {
                    clients: args.clients,
                    rounds: args.rounds,
                    failure_rate: args.failure_rate,
                    work_ms: args.work_ms,
                },
            };
            let config = AppConfig::load(cli.config.as_deref(), &overrides)?;
            simulate(&config, args.json).await
        }
        Command::Config(args) => {
            let overrides = Overrides {
                pool: args.pool.overrides(),
                ..Default::default()
            };
            let config = AppConfig::load(cli.config.as_deref(), &overrides)?;
            let rendered = if args.json {
                serde_json::to_string_pretty(&config)?
            } else {
                toml::to_string_pretty(&config)?
            };
            println!("{rendered}");
            Ok(())
        }
    }
}

async fn simulate(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupted, finishing in-flight queries");
                    cancel.cancel();
                }
            }
            .in_current_span(),
        );
    }

    tracing::info!(
        pool = %config.pool.name,
        clients = config.simulation.clients,
        rounds = config.simulation.rounds,
        "starting simulation"
    );
    let report = workload::run(config, cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
