use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use jobpool::{JobServer, Message, Pool, PoolConfig, Result, Router};

const DEFAULT_ADDR: &str = "127.0.0.1:4000";

#[derive(Parser)]
#[command(name = "jobpool-server", version, about = "A job server backed by a worker pool")]
struct Cli {
    /// Server listening address
    #[arg(long, default_value = DEFAULT_ADDR, value_name = "IP-PORT")]
    addr: SocketAddr,

    /// JSON file with pool options; flags given on the command line win
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Job queue capacity
    #[arg(long, value_name = "N")]
    pool_size: Option<usize>,

    /// Maximum number of live workers
    #[arg(long, value_name = "N")]
    worker_max_open: Option<usize>,

    /// Permanent workers [default: number of CPUs]
    #[arg(long, value_name = "N")]
    worker_idle: Option<usize>,

    /// Seconds an extra worker may stay idle before it exits
    #[arg(long, value_name = "SECONDS")]
    worker_life_time: Option<u64>,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let router = builtin_router();

    info!("jobpool-server {}", env!("CARGO_PKG_VERSION"));
    info!("Pool config: {:?}", config);
    info!("Topics: {}", router.topics().join(", "));
    info!("Listening on {}", cli.addr);

    let pool = Arc::new(Pool::new(config)?);
    let gauges = pool.clone();
    JobServer::new(router, pool)
        .with_stats(move || gauges.stats())
        .run(cli.addr)
}

/// Layers the optional config file, then command-line flags, over the
/// defaults.
fn resolve_config(cli: &Cli) -> Result<PoolConfig> {
    let base: PoolConfig = match &cli.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => PoolConfig::default().worker_idle(num_cpus::get()),
    };

    let config = base
        .pool_size(cli.pool_size.unwrap_or(0))
        .worker_max_open(cli.worker_max_open.unwrap_or(0))
        .worker_idle(cli.worker_idle.unwrap_or(0))
        .worker_life_time(Duration::from_secs(cli.worker_life_time.unwrap_or(0)));

    Ok(config.resolved())
}

fn builtin_router() -> Router {
    Router::new()
        .register("log", |message: Message| {
            info!("[{}] {}", message.topic, message.body)
        })
        .register("size", |message: Message| {
            info!("[{}] received {} bytes", message.topic, message.body.len())
        })
}
