use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use podium_aoc::AocClient;
use podium_observability::init_logging;
use podium_server::{run, AppState, ServiceConfig};
use podium_store::HistoryStore;

#[derive(Parser, Debug)]
#[command(name = "podium-service")]
#[command(about = "Leaderboard score history service")]
struct Cli {
    /// Directory holding the per-leaderboard historic score files.
    #[arg(long, env = "PODIUM_DATA_DIR")]
    data_dir: PathBuf,

    #[arg(long, env = "PODIUM_HOSTNAME", default_value = "0.0.0.0")]
    hostname: String,

    /// Port for the score API listener.
    #[arg(long, env = "PODIUM_MAIN_PORT")]
    main_port: u16,

    /// Port for the health listener.
    #[arg(long, env = "PODIUM_HEALTH_PORT")]
    health_port: u16,

    #[arg(long, env = "PODIUM_UPSTREAM_URL", default_value = podium_aoc::DEFAULT_BASE_URL)]
    upstream_url: String,

    #[arg(long, env = "PODIUM_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    fetch_timeout_secs: u64,

    /// Defaults to `<data_dir>/logs`.
    #[arg(long, env = "PODIUM_LOGS_DIR")]
    logs_dir: Option<PathBuf>,

    #[arg(long, env = "PODIUM_LOG_RETENTION_DAYS", default_value_t = 14)]
    log_retention_days: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logs_dir = cli
        .logs_dir
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("logs"));
    let (_log_guard, log_info) = init_logging(&logs_dir, cli.log_retention_days)?;
    info!("service logging initialized: {:?}", log_info);

    let config = ServiceConfig {
        data_dir: cli.data_dir,
        main_addr: listener_addr(&cli.hostname, cli.main_port)?,
        health_addr: listener_addr(&cli.hostname, cli.health_port)?,
    };

    let store = Arc::new(HistoryStore::new(&config.data_dir));
    let source = Arc::new(AocClient::new(
        &cli.upstream_url,
        Duration::from_secs(cli.fetch_timeout_secs),
    )?);
    let state = AppState { store, source };

    info!(
        "starting podium-service (data dir {})",
        config.data_dir.display()
    );
    run(&config, state).await
}

fn listener_addr(hostname: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{hostname}:{port}")
        .parse()
        .with_context(|| format!("invalid listener address {hostname}:{port}"))
}
