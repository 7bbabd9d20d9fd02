//! Core data models for the stats agent
//!
//! Provider-side types mirror the cAdvisor JSON documents; [`MetricRecord`]
//! is the flat record handed to the emission sink.

use serde::{Deserialize, Serialize};

/// Machine-wide limits, fetched once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    /// Physical memory of the host in bytes
    pub memory_capacity: u64,
}

/// Container identity and runtime metadata, rebuilt every poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMeta {
    pub id: String,
    pub name: String,
    pub image: String,
    pub hostname: String,
    pub restart_count: i64,
    /// Third `--` segment of the hostname (`app--version--env`)
    pub environment: String,
}

impl ContainerMeta {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
        hostname: impl Into<String>,
        restart_count: i64,
    ) -> Self {
        let hostname = hostname.into();
        let environment = environment_from_hostname(&hostname).to_string();

        Self {
            id: id.into(),
            name: name.into(),
            image: image.into(),
            hostname,
            restart_count,
            environment,
        }
    }
}

/// Extract the environment label from an `app--version--env` hostname
pub fn environment_from_hostname(hostname: &str) -> &str {
    hostname.split("--").nth(2).unwrap_or("")
}

/// Per-container response of the stats provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerStats {
    #[serde(default)]
    pub spec: ContainerSpec,
    /// Samples ordered most-recent-first
    #[serde(default)]
    pub stats: Vec<StatsSample>,
}

impl ContainerStats {
    /// Consume the response into its sample batch.
    ///
    /// Samples that carry no memory limit of their own inherit the
    /// container-level limit from `spec.memory`.
    pub fn into_samples(self) -> Vec<StatsSample> {
        let spec_limit = self.spec.memory.limit;
        self.stats
            .into_iter()
            .map(|mut sample| {
                if sample.memory.limit.is_none() {
                    sample.memory.limit = spec_limit;
                }
                sample
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default)]
    pub memory: MemorySpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySpec {
    #[serde(default)]
    pub limit: Option<u64>,
}

/// One point-in-time measurement for a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    /// Provider timestamp, RFC 3339
    pub timestamp: String,
    pub cpu: CpuStats,
    #[serde(default)]
    pub memory: MemoryStats,
    #[serde(default)]
    pub network: NetworkStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub usage: CpuUsage,
    #[serde(default)]
    pub load_average: i64,
}

/// Cumulative CPU counters in nanoseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub total: u64,
    #[serde(default)]
    pub per_cpu_usage: Vec<u64>,
    #[serde(default)]
    pub user: u64,
    #[serde(default)]
    pub system: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub usage: u64,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub rx_packets: u64,
    #[serde(default)]
    pub rx_errors: u64,
    #[serde(default)]
    pub rx_dropped: u64,
    #[serde(default)]
    pub tx_bytes: u64,
    #[serde(default)]
    pub tx_packets: u64,
    #[serde(default)]
    pub tx_errors: u64,
    #[serde(default)]
    pub tx_dropped: u64,
}

/// Normalized output record, one per valid sample pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: String,
    pub container_id: String,
    pub image: String,
    pub name: String,
    pub hostname: String,
    pub environment: String,
    pub restart_count: i64,
    pub memory_current: u64,
    pub memory_limit: u64,
    pub cpu_usage: u64,
    pub cpu_usage_pct: f64,
    pub cpu_num_cores: usize,
    pub cpu_cumulative_total: u64,
    pub cpu_cumulative_user: u64,
    pub cpu_cumulative_sys: u64,
    pub cpu_load_average: i64,
    pub network_rx_bytes: u64,
    pub network_rx_packets: u64,
    pub network_rx_errors: u64,
    pub network_rx_dropped: u64,
    pub network_tx_bytes: u64,
    pub network_tx_packets: u64,
    pub network_tx_errors: u64,
    pub network_tx_dropped: u64,
}
