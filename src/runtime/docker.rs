use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::ContainerInspectResponse;
use bollard::system::EventsOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time::timeout;

use super::ContainerInventory;
use crate::error::{Error, Result};
use crate::reconcile::Coordinator;
use crate::types::{ContainerRecord, NetworkAttachment};

/// Timeout for listing running containers.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for inspecting the full container set.
const INSPECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for the startup daemon probe.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle events that can change the set of host entries.
const WATCHED_EVENTS: [&str; 8] = [
    "start",
    "stop",
    "die",
    "kill",
    "pause",
    "unpause",
    "connect",
    "disconnect",
];

/// Connect to the local Docker daemon using default settings.
/// This handles the unix socket on Linux.
pub fn connect() -> Result<Docker> {
    Docker::connect_with_local_defaults().map_err(|e| Error::RuntimeUnavailable(e.to_string()))
}

/// Probe the daemon. Used once at startup to fail fast when Docker is
/// down or unreachable.
pub async fn ping(docker: &Docker) -> Result<()> {
    timeout(PING_TIMEOUT, docker.ping())
        .await
        .map_err(|_| Error::RuntimeUnavailable("ping timed out".to_string()))?
        .map_err(classify)?;
    Ok(())
}

pub struct DockerInventory {
    docker: Docker,
}

impl DockerInventory {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    async fn inspect_all(&self, ids: Vec<String>) -> Result<Vec<ContainerRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.docker.inspect_container(&id, None).await {
                Ok(detail) => records.push(to_record(detail)),
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {
                    // Stopped between listing and inspection.
                    debug!("container {} disappeared before inspection", id);
                }
                Err(e) => return Err(classify(e)),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl ContainerInventory for DockerInventory {
    async fn running_containers(&self) -> Result<Vec<ContainerRecord>> {
        let opts = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let summaries = timeout(LIST_TIMEOUT, self.docker.list_containers(Some(opts)))
            .await
            .map_err(|_| Error::RuntimeUnavailable("listing containers timed out".to_string()))?
            .map_err(classify)?;

        let ids: Vec<String> = summaries.into_iter().filter_map(|c| c.id).collect();
        if ids.is_empty() {
            info!("no running containers found");
            return Ok(Vec::new());
        }

        timeout(INSPECT_TIMEOUT, self.inspect_all(ids))
            .await
            .map_err(|_| Error::RuntimeUnavailable("inspecting containers timed out".to_string()))?
    }
}

fn to_record(detail: ContainerInspectResponse) -> ContainerRecord {
    let name = detail
        .name
        .as_deref()
        .unwrap_or("")
        .trim_start_matches('/')
        .to_string();
    let hostname = detail
        .config
        .and_then(|c| c.hostname)
        .unwrap_or_default();

    let mut networks: Vec<NetworkAttachment> = detail
        .network_settings
        .and_then(|s| s.networks)
        .unwrap_or_default()
        .into_iter()
        .map(|(network, endpoint)| NetworkAttachment {
            network,
            ip_address: endpoint.ip_address.unwrap_or_default(),
            aliases: endpoint.aliases.unwrap_or_default(),
        })
        .collect();
    // The engine reports networks as a map; order them by name so a
    // snapshot is deterministic.
    networks.sort_by(|a, b| a.network.cmp(&b.network));

    ContainerRecord {
        name,
        hostname,
        networks,
    }
}

fn classify(err: bollard::errors::Error) -> Error {
    use bollard::errors::Error as Bollard;
    match &err {
        Bollard::JsonDataError { .. } | Bollard::JsonSerdeError { .. } => {
            Error::InventoryParse(err.to_string())
        }
        _ => Error::RuntimeUnavailable(err.to_string()),
    }
}

fn is_decode_error(err: &bollard::errors::Error) -> bool {
    use bollard::errors::Error as Bollard;
    matches!(
        err,
        Bollard::JsonDataError { .. } | Bollard::JsonSerdeError { .. }
    )
}

/// Subscribe to the daemon's lifecycle event stream and request one
/// reconciliation per decoded event.
///
/// Undecodable events are logged and skipped. If the stream itself ends
/// or errors the watcher stops; resubscription is the process
/// supervisor's job, not ours. Shutdown is cooperative via the watch
/// channel, and dropping the stream tears down the connection.
pub async fn watch_events(
    docker: Docker,
    coordinator: Arc<Coordinator>,
    mut shutdown: watch::Receiver<bool>,
) {
    let filters: HashMap<String, Vec<String>> = HashMap::from([(
        "event".to_string(),
        WATCHED_EVENTS.iter().map(|s| s.to_string()).collect(),
    )]);
    let opts = EventsOptions::<String> {
        filters,
        ..Default::default()
    };

    let mut stream = docker.events(Some(opts));
    info!("watching docker events: {}", WATCHED_EVENTS.join(", "));

    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(event)) => {
                    let action = event.action.as_deref().unwrap_or("unknown");
                    let container = event
                        .actor
                        .as_ref()
                        .and_then(|actor| actor.attributes.as_ref())
                        .and_then(|attrs| attrs.get("name"))
                        .map(String::as_str)
                        .unwrap_or("unknown");
                    info!("docker event: {} - container: {}", action, container);
                    coordinator.reconcile().await;
                }
                Some(Err(e)) if is_decode_error(&e) => {
                    warn!("{}", Error::EventStreamDecode(e.to_string()));
                }
                Some(Err(e)) => {
                    error!("docker event stream failed: {}", e);
                    return;
                }
                None => {
                    error!("docker event stream ended unexpectedly");
                    return;
                }
            },
            _ = shutdown.changed() => {
                info!("event watcher stopped");
                return;
            }
        }
    }
}
