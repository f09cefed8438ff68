//! Hostsync daemon entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

mod config;
mod entries;
mod error;
mod hosts;
mod reconcile;
mod runtime;
mod types;

use config::Config;
use reconcile::{run_ticker, Coordinator};
use runtime::{docker, ContainerInventory, DockerInventory};

/// How long a loop gets to observe shutdown before it is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "hostsync")]
#[command(about = "Keeps a hosts file section in sync with running Docker containers")]
#[command(after_help = "\
Examples:
  hostsync 30s                  update every 30 seconds
  hostsync 5m -d example.com    update every 5 minutes with a custom domain

Environment Variables:
  DOCKER_HOSTS_DOMAIN       base domain for FQDNs (e.g. 'example.com')
  DOCKER_HOSTS_HOSTS_FILE   target file (default: /etc/hosts)")]
struct Cli {
    /// Update interval (e.g. 30s, 5m, 1h, 1d)
    interval: String,

    /// Base domain for FQDNs (default: DOCKER_HOSTS_DOMAIN env var or "base.domain")
    #[arg(short, long)]
    domain: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let period = config::parse_interval(&cli.interval).context("invalid interval")?;

    let mut cfg = Config::load()?;
    if let Some(domain) = cli.domain {
        cfg.domain = domain.trim().to_string();
    }
    info!("using domain base: {}", cfg.domain);
    info!("update interval: {}s", period.as_secs());

    let docker = docker::connect()?;
    docker::ping(&docker)
        .await
        .context("docker daemon is not available")?;

    info!("initializing hosts file management");
    if let Err(e) = hosts::scrub_non_breaking_spaces(&cfg.hosts_file) {
        warn!("could not scrub non-breaking spaces: {}", e);
    }
    hosts::ensure_managed_section(&cfg.hosts_file)
        .context("failed to initialize managed section")?;

    let inventory: Arc<dyn ContainerInventory> = Arc::new(DockerInventory::new(docker.clone()));
    let coordinator = Arc::new(Coordinator::new(
        inventory,
        cfg.hosts_file.clone(),
        cfg.domain.clone(),
    ));

    info!("performing initial hosts file update");
    coordinator.reconcile().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = tokio::spawn(docker::watch_events(
        docker,
        Arc::clone(&coordinator),
        shutdown_rx.clone(),
    ));
    let ticker = tokio::spawn(run_ticker(period, Arc::clone(&coordinator), shutdown_rx));

    wait_for_signal().await?;
    let _ = shutdown_tx.send(true);

    stop_task("event watcher", watcher).await;
    stop_task("periodic ticker", ticker).await;

    info!("shutdown complete");
    Ok(())
}

async fn wait_for_signal() -> anyhow::Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down gracefully..."),
        _ = sigint.recv() => info!("received SIGINT, shutting down gracefully..."),
    }
    Ok(())
}

/// Give a loop a bounded grace period to observe shutdown, then abort it.
async fn stop_task(name: &str, mut handle: JoinHandle<()>) {
    if timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
        warn!(
            "{} did not stop within {}s, aborting",
            name,
            SHUTDOWN_GRACE.as_secs()
        );
        handle.abort();
    }
}
