use async_trait::async_trait;

use crate::error::Result;
use crate::types::ContainerRecord;

pub mod docker;
pub use docker::DockerInventory;

/// Read-only view of the container runtime.
#[async_trait]
pub trait ContainerInventory: Send + Sync {
    /// Snapshot the currently running containers with full inspection
    /// detail. No retries; failures propagate to the caller, which
    /// decides policy.
    async fn running_containers(&self) -> Result<Vec<ContainerRecord>>;
}
