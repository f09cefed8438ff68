//! Reconciliation coordination.
//!
//! Both triggers (timer ticks and runtime events) funnel into
//! [`Coordinator::reconcile`], which runs the read-synthesize-write
//! pipeline under a non-reentrant lock. A trigger that arrives while a
//! pass is in flight is dropped rather than queued; the next tick or
//! event reconciles the latest state anyway.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::{watch, Mutex};
use tokio::time::sleep;

use crate::entries;
use crate::error::{Error, Result};
use crate::hosts;
use crate::runtime::ContainerInventory;

pub struct Coordinator {
    inventory: Arc<dyn ContainerInventory>,
    hosts_file: PathBuf,
    domain_base: String,
    in_flight: Mutex<()>,
}

impl Coordinator {
    pub fn new(
        inventory: Arc<dyn ContainerInventory>,
        hosts_file: PathBuf,
        domain_base: String,
    ) -> Self {
        Self {
            inventory,
            hosts_file,
            domain_base,
            in_flight: Mutex::new(()),
        }
    }

    /// Run one reconciliation pass unless one is already in flight.
    ///
    /// Returns `true` when a pass executed (successfully or not) and
    /// `false` when the trigger was dropped. Pipeline failures are logged
    /// here and never propagate; the hosts file is simply left unchanged
    /// for this cycle.
    pub async fn reconcile(&self) -> bool {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("reconciliation already in flight, dropping trigger");
            return false;
        };

        if let Err(e) = self.run_pipeline().await {
            error!("reconciliation failed, hosts file left unchanged: {}", e);
        }
        true
    }

    async fn run_pipeline(&self) -> Result<()> {
        let containers = self.inventory.running_containers().await?;
        let entries = entries::synthesize(&containers, &self.domain_base);
        let count = entries.len();

        // The rewrite is synchronous file I/O; keep it off the event loop
        // so event stream consumption is never starved.
        let path = self.hosts_file.clone();
        tokio::task::spawn_blocking(move || hosts::replace_managed_section(&path, &entries))
            .await
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))??;

        info!(
            "updated {} with {} entries",
            self.hosts_file.display(),
            count
        );
        Ok(())
    }
}

/// Request a reconciliation every `period`, starting one full period after
/// the loop begins. Runs until the shutdown channel fires.
pub async fn run_ticker(
    period: Duration,
    coordinator: Arc<Coordinator>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("periodic reconciliation every {}s", period.as_secs());
    loop {
        tokio::select! {
            _ = sleep(period) => {
                debug!("periodic reconciliation triggered");
                coordinator.reconcile().await;
            }
            _ = shutdown.changed() => {
                info!("periodic reconciliation stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContainerRecord, NetworkAttachment};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const EMPTY_SECTION: &str = "127.0.0.1 localhost\n# BEGIN DOCKER CONTAINERS\n# END DOCKER CONTAINERS\n";

    struct StubInventory {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl StubInventory {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContainerInventory for StubInventory {
        async fn running_containers(&self) -> Result<Vec<ContainerRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::RuntimeUnavailable("stub failure".into()));
            }
            sleep(self.delay).await;
            Ok(vec![ContainerRecord {
                name: "test-nginx".to_string(),
                hostname: "test-nginx".to_string(),
                networks: vec![NetworkAttachment {
                    network: "bridge".to_string(),
                    ip_address: "10.0.0.5".to_string(),
                    aliases: Vec::new(),
                }],
            }])
        }
    }

    fn hosts_fixture() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hosts");
        fs::write(&path, EMPTY_SECTION).unwrap();
        (dir, path)
    }

    fn coordinator(inventory: Arc<StubInventory>, path: &Path) -> Arc<Coordinator> {
        Arc::new(Coordinator::new(
            inventory,
            path.to_path_buf(),
            "base.domain".to_string(),
        ))
    }

    #[tokio::test]
    async fn a_pass_rewrites_the_managed_section() {
        let (_dir, path) = hosts_fixture();
        let inventory = Arc::new(StubInventory::new(Duration::ZERO));
        let coordinator = coordinator(Arc::clone(&inventory), &path);

        assert!(coordinator.reconcile().await);

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "127.0.0.1 localhost\n# BEGIN DOCKER CONTAINERS\n10.0.0.5 test-nginx test-nginx.base.domain\n# END DOCKER CONTAINERS\n"
        );
    }

    #[tokio::test]
    async fn concurrent_trigger_is_dropped_not_queued() {
        let (_dir, path) = hosts_fixture();
        let inventory = Arc::new(StubInventory::new(Duration::from_millis(200)));
        let coordinator = coordinator(Arc::clone(&inventory), &path);

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.reconcile().await })
        };
        // Let the first trigger take the lock before firing the second.
        sleep(Duration::from_millis(50)).await;
        let second = coordinator.reconcile().await;

        assert!(!second, "second trigger should be dropped");
        assert!(first.await.unwrap(), "first trigger should execute");
        assert_eq!(inventory.calls(), 1);
    }

    #[tokio::test]
    async fn coordinator_recovers_after_a_dropped_trigger() {
        let (_dir, path) = hosts_fixture();
        let inventory = Arc::new(StubInventory::new(Duration::from_millis(100)));
        let coordinator = coordinator(Arc::clone(&inventory), &path);

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.reconcile().await })
        };
        sleep(Duration::from_millis(20)).await;
        assert!(!coordinator.reconcile().await);
        first.await.unwrap();

        // Once idle again, the next trigger runs a fresh pass.
        assert!(coordinator.reconcile().await);
        assert_eq!(inventory.calls(), 2);
    }

    #[tokio::test]
    async fn pipeline_failure_leaves_the_file_unchanged() {
        let (_dir, path) = hosts_fixture();
        let inventory = Arc::new(StubInventory::failing());
        let coordinator = coordinator(Arc::clone(&inventory), &path);

        assert!(coordinator.reconcile().await);

        assert_eq!(fs::read_to_string(&path).unwrap(), EMPTY_SECTION);
        assert_eq!(inventory.calls(), 1);
    }

    #[tokio::test]
    async fn ticker_waits_a_full_period_before_the_first_pass() {
        let (_dir, path) = hosts_fixture();
        let inventory = Arc::new(StubInventory::new(Duration::ZERO));
        let coordinator = coordinator(Arc::clone(&inventory), &path);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ticker = tokio::spawn(run_ticker(
            Duration::from_millis(500),
            Arc::clone(&coordinator),
            shutdown_rx,
        ));

        // Stop well before the first period elapses: no pass may run.
        sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        ticker.await.unwrap();

        assert_eq!(inventory.calls(), 0);
    }

    #[tokio::test]
    async fn ticker_fires_after_each_period() {
        let (_dir, path) = hosts_fixture();
        let inventory = Arc::new(StubInventory::new(Duration::ZERO));
        let coordinator = coordinator(Arc::clone(&inventory), &path);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ticker = tokio::spawn(run_ticker(
            Duration::from_millis(50),
            Arc::clone(&coordinator),
            shutdown_rx,
        ));

        sleep(Duration::from_millis(250)).await;
        shutdown_tx.send(true).unwrap();
        ticker.await.unwrap();

        assert!(inventory.calls() >= 1);
    }
}
