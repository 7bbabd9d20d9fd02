//! Periodic collection of container statistics
//!
//! The collection loop asks the container runtime which containers are
//! running, fetches each container's recent samples from the stats provider,
//! reconciles them against the watermark store and emits one record per new
//! sample pair.

mod cadvisor;
mod docker;
mod driver;
mod r#loop;


pub use cadvisor::CadvisorClient;
pub use docker::DockerRuntime;
pub use driver::{CollectionDriver, ContainerOutcome, TickSummary};
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder};

use crate::error::Error;
use crate::models::{ContainerMeta, ContainerStats, MachineSpec};

pub use async_trait::async_trait;

/// Source of machine limits and per-container samples
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Fetch the machine-wide limits
    async fn machine_spec(&self) -> Result<MachineSpec, Error>;

    /// Fetch the recent sample batch for a container, most-recent-first
    async fn container_stats(&self, container_id: &str) -> Result<ContainerStats, Error>;
}

/// Source of running containers and their metadata
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Ids of the containers currently running
    async fn list_containers(&self) -> Result<Vec<String>, Error>;

    /// Metadata for a single container
    async fn inspect(&self, container_id: &str) -> Result<ContainerMeta, Error>;
}
