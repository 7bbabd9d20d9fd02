//! Stats collection loop
//!
//! Runs one [`CollectionDriver`] tick per period until shutdown is signalled.

use super::driver::CollectionDriver;
use super::{ContainerRuntime, StatsProvider};
use crate::health::{components, HealthRegistry};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::sink::{output_tag, RecordSink};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Configuration for the stats collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Period between ticks (default: 60 seconds)
    pub interval: Duration,
    /// Prefix of the output tag (default: "metric")
    pub tag_prefix: String,
    /// Name reported in structured log lines
    pub node_name: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            tag_prefix: "metric".to_string(),
            node_name: "unknown".to_string(),
        }
    }
}

/// Stats collection loop that ticks on a fixed schedule
pub struct CollectionLoop {
    driver: CollectionDriver,
    config: CollectionConfig,
    metrics: AgentMetrics,
    health: HealthRegistry,
}

impl CollectionLoop {
    pub fn driver(&self) -> &CollectionDriver {
        &self.driver
    }

    /// Tick until a shutdown signal arrives.
    ///
    /// The first tick fires one period after start. A tick is awaited in
    /// full before the next one is scheduled, so ticks never overlap.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            tag = %output_tag(&self.config.tag_prefix),
            "Starting stats collection loop"
        );

        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down stats collection loop");
                    break;
                }
            }
        }
    }

    /// Run a single tick, recording its latency and outcome
    pub async fn tick_once(&mut self) {
        let start = Instant::now();
        let result = self.driver.tick().await;
        self.metrics.observe_tick(start.elapsed().as_secs_f64());

        match result {
            Ok(summary) => {
                self.health.set_healthy(components::COLLECTOR).await;
                debug!(
                    containers = summary.containers,
                    failed = summary.failed_containers,
                    records = summary.records,
                    skipped_pairs = summary.skipped_pairs,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Collection tick complete"
                );
            }
            Err(e) => {
                self.health
                    .set_degraded(components::COLLECTOR, e.to_string())
                    .await;
                error!(error = ?e, "Collection tick failed");
            }
        }
    }
}

/// Builder for the collection loop
pub struct CollectionLoopBuilder {
    provider: Option<Arc<dyn StatsProvider>>,
    runtime: Option<Arc<dyn ContainerRuntime>>,
    sink: Option<Arc<dyn RecordSink>>,
    metrics: Option<AgentMetrics>,
    health: Option<HealthRegistry>,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            runtime: None,
            sink: None,
            metrics: None,
            health: None,
            config: CollectionConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn StatsProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Set the tick period
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the output tag prefix
    pub fn tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.tag_prefix = prefix.into();
        self
    }

    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.config.node_name = node_name.into();
        self
    }

    /// Fetch the machine spec and assemble the loop.
    ///
    /// Fails if a collaborator is missing, the interval is zero, or the
    /// machine spec cannot be fetched.
    pub async fn build(self) -> Result<CollectionLoop> {
        let provider = self
            .provider
            .ok_or_else(|| anyhow::anyhow!("Stats provider is required"))?;
        let runtime = self
            .runtime
            .ok_or_else(|| anyhow::anyhow!("Container runtime is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Record sink is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Collection interval must be positive");
        }

        let metrics = self.metrics.unwrap_or_default();
        let health = self.health.unwrap_or_default();

        let machine = match provider.machine_spec().await {
            Ok(machine) => {
                health.set_healthy(components::PROVIDER).await;
                machine
            }
            Err(e) => {
                health
                    .set_unhealthy(components::PROVIDER, e.to_string())
                    .await;
                return Err(e).context("Failed to fetch machine spec");
            }
        };
        health.set_ready(true).await;

        let driver = CollectionDriver::new(
            provider,
            runtime,
            sink,
            machine,
            output_tag(&self.config.tag_prefix),
            metrics.clone(),
            health.clone(),
            StructuredLogger::new(self.config.node_name.clone()),
        );

        Ok(CollectionLoop {
            driver,
            config: self.config,
            metrics,
            health,
        })
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
