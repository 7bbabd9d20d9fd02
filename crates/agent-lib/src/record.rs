//! Assembly of normalized output records

use crate::error::ParseError;
use crate::models::{ContainerMeta, MachineSpec, MetricRecord, StatsSample};
use crate::rate::RateResult;
use crate::time;
use sha2::{Digest, Sha256};

/// Content-derived record id over image, container id and truncated sample epoch.
///
/// Stable across retries, so downstream ingestion can deduplicate on it.
pub fn record_id(image: &str, container_id: &str, epoch_secs: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.as_bytes());
    hasher.update(container_id.as_bytes());
    hasher.update(epoch_secs.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// The tighter of the host-wide ceiling and the container's own limit
pub fn effective_memory_limit(machine: &MachineSpec, container_limit: Option<u64>) -> u64 {
    match container_limit {
        Some(limit) => machine.memory_capacity.min(limit),
        None => machine.memory_capacity,
    }
}

/// Build the record for the pair `(curr, prev)`.
///
/// `prev` only contributed to `cpu`; every copied counter comes from `curr`.
pub fn build(
    container: &ContainerMeta,
    machine: &MachineSpec,
    curr: &StatsSample,
    _prev: &StatsSample,
    cpu: &RateResult,
) -> Result<MetricRecord, ParseError> {
    let epoch = time::truncated_epoch(&curr.timestamp)?;
    let usage = &curr.cpu.usage;
    let net = &curr.network;

    Ok(MetricRecord {
        id: record_id(&container.image, &container.id, epoch),
        container_id: container.id.clone(),
        image: container.image.clone(),
        name: container.name.clone(),
        hostname: container.hostname.clone(),
        environment: container.environment.clone(),
        restart_count: container.restart_count,
        memory_current: curr.memory.usage,
        memory_limit: effective_memory_limit(machine, curr.memory.limit),
        cpu_usage: cpu.raw_usage,
        cpu_usage_pct: cpu.pct,
        cpu_num_cores: cpu.num_cores,
        cpu_cumulative_total: usage.total,
        cpu_cumulative_user: usage.user,
        cpu_cumulative_sys: usage.system,
        cpu_load_average: curr.cpu.load_average,
        network_rx_bytes: net.rx_bytes,
        network_rx_packets: net.rx_packets,
        network_rx_errors: net.rx_errors,
        network_rx_dropped: net.rx_dropped,
        network_tx_bytes: net.tx_bytes,
        network_tx_packets: net.tx_packets,
        network_tx_errors: net.tx_errors,
        network_tx_dropped: net.tx_dropped,
    })
}
