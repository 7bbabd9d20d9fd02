//! Observability infrastructure for the stats agent
//!
//! Provides:
//! - Prometheus metrics (tick latency, containers polled, records emitted, errors)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AgentMetricsInner {
    tick_latency_seconds: Histogram,
    ticks: IntCounter,
    containers_monitored: IntGauge,
    records_emitted: IntCounter,
    fetch_errors: IntCounter,
    skipped_pairs: IntCounter,
    emit_errors: IntCounter,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram!(
                "cadvisor_agent_tick_latency_seconds",
                "Time spent on one collection tick across all containers",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            ticks: register_int_counter!(
                "cadvisor_agent_ticks_total",
                "Total number of collection ticks run"
            )
            .expect("Failed to register ticks"),

            containers_monitored: register_int_gauge!(
                "cadvisor_agent_containers_monitored",
                "Number of containers seen in the last tick"
            )
            .expect("Failed to register containers_monitored"),

            records_emitted: register_int_counter!(
                "cadvisor_agent_records_emitted_total",
                "Total number of metric records handed to the sink"
            )
            .expect("Failed to register records_emitted"),

            fetch_errors: register_int_counter!(
                "cadvisor_agent_fetch_errors_total",
                "Total number of per-container fetch or parse failures"
            )
            .expect("Failed to register fetch_errors"),

            skipped_pairs: register_int_counter!(
                "cadvisor_agent_skipped_pairs_total",
                "Total number of sample pairs skipped for inconsistent counters"
            )
            .expect("Failed to register skipped_pairs"),

            emit_errors: register_int_counter!(
                "cadvisor_agent_emit_errors_total",
                "Total number of records the sink refused"
            )
            .expect("Failed to register emit_errors"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record a completed tick and its duration
    pub fn observe_tick(&self, duration_secs: f64) {
        self.inner().ticks.inc();
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    pub fn set_containers_monitored(&self, count: i64) {
        self.inner().containers_monitored.set(count);
    }

    pub fn inc_records_emitted(&self) {
        self.inner().records_emitted.inc();
    }

    pub fn inc_fetch_errors(&self) {
        self.inner().fetch_errors.inc();
    }

    pub fn inc_skipped_pairs(&self) {
        self.inner().skipped_pairs.inc();
    }

    pub fn inc_emit_errors(&self) {
        self.inner().emit_errors.inc();
    }

    pub fn records_emitted(&self) -> u64 {
        self.inner().records_emitted.get()
    }
}

/// Structured logger for agent lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, endpoint: &str, memory_capacity: u64) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            endpoint = %endpoint,
            memory_capacity = memory_capacity,
            "Stats agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Stats agent shutting down"
        );
    }

    /// Log a sample pair dropped because its counters cannot yield a rate
    pub fn log_skipped_pair(&self, container_id: &str, timestamp: &str, reason: &str) {
        warn!(
            event = "sample_pair_skipped",
            node = %self.node_name,
            container_id = %container_id,
            timestamp = %timestamp,
            reason = %reason,
            "Skipping sample pair"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_metrics_creation() {
        let metrics = AgentMetrics::new();

        metrics.observe_tick(0.01);
        metrics.set_containers_monitored(3);
        metrics.inc_fetch_errors();
        metrics.inc_skipped_pairs();
        metrics.inc_emit_errors();

        let before = metrics.records_emitted();
        metrics.inc_records_emitted();
        assert!(metrics.records_emitted() > before);
    }

    #[test]
    fn test_handles_share_global_metrics() {
        let a = AgentMetrics::new();
        let b = a.clone();
        let before = b.records_emitted();
        a.inc_records_emitted();
        assert!(b.records_emitted() > before);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name, "test-node");
    }
}
