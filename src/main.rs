use anyhow::{Context, Result};
use clap::Parser;
use regcheck::checker::{
    Account, AccountChecker, BatchScheduler, HttpRequester, ProxyEndpoint, ProxyHealthTracker,
    RequesterConfig, ResultSink, SchedulerConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Check which emails from a credential list are already registered
#[derive(Parser)]
#[command(name = "regcheck")]
#[command(about = "Check which emails from a credential list are already registered")]
struct Cli {
    /// Input file with one email:password line per account
    #[arg(short, long, default_value = "accounts.txt")]
    input: PathBuf,

    /// Proxy list file, one proxy URI per line (scheme selects http/socks)
    #[arg(short, long, default_value = "proxies.txt")]
    proxies: PathBuf,

    /// Output file for confirmed-registered accounts
    #[arg(short, long, default_value = "registered.txt")]
    output: PathBuf,

    /// Number of accounts checked concurrently per batch
    #[arg(short = 'b', long, default_value = "50")]
    batch_size: usize,

    /// Delay between batches in seconds
    #[arg(long, default_value = "1")]
    batch_delay: u64,

    /// Attempts per account before giving up
    #[arg(short = 'r', long, default_value = "3")]
    retries: u32,

    /// Timeout per validation request in seconds
    #[arg(short = 't', long, default_value = "10")]
    timeout: u64,

    /// Validation endpoint URL override
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let accounts = load_accounts(&cli.input)?;
    let pool = Arc::new(load_proxies(&cli.proxies));
    info!(
        accounts = accounts.len(),
        proxies = pool.len(),
        "starting check"
    );

    let mut requester_config = RequesterConfig::new().with_timeout(Duration::from_secs(cli.timeout));
    if let Some(url) = cli.url {
        requester_config = requester_config.with_validate_url(url);
    }
    let requester = Arc::new(HttpRequester::with_config(requester_config));

    let health = Arc::new(ProxyHealthTracker::new());
    let checker = AccountChecker::new(requester, health.clone(), pool.clone())
        .with_max_retries(cli.retries);

    let sink = ResultSink::new(&cli.output);
    sink.truncate()
        .await
        .with_context(|| format!("Failed to create output file {:?}", cli.output))?;

    let scheduler_config = SchedulerConfig::new()
        .with_batch_size(cli.batch_size)
        .with_inter_batch_delay(Duration::from_secs(cli.batch_delay));
    let scheduler = BatchScheduler::new(checker, sink, health.clone(), pool.clone(), scheduler_config);

    let registered = scheduler.run(&accounts).await?;

    info!(
        total_proxies = pool.len(),
        dead_proxies = health.dead_count(&pool),
        "proxy statistics"
    );
    info!(
        registered = registered.len(),
        output = %cli.output.display(),
        "check completed"
    );

    Ok(())
}

/// Load the account list; a missing input file aborts the run
fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Input file {path:?} not found"))?;
    Ok(Account::parse_list(&content))
}

/// Load the proxy list; a missing file degrades to an unproxied run
fn load_proxies(path: &Path) -> Vec<ProxyEndpoint> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let proxies = ProxyEndpoint::parse_list(&content);
            info!(count = proxies.len(), "loaded proxies");
            proxies
        }
        Err(_) => {
            warn!("proxy file {:?} not found, running without proxies", path);
            Vec::new()
        }
    }
}
