//! One collection tick across all running containers
//!
//! Fetches fan out on a [`JoinSet`]; reconciliation, rate computation and
//! watermark updates happen afterwards on the driver's own task, which is the
//! only writer of the [`WatermarkStore`].

use super::{ContainerRuntime, StatsProvider};
use crate::error::Error;
use crate::health::{components, HealthRegistry};
use crate::models::{ContainerMeta, ContainerStats, MachineSpec, MetricRecord};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::rate::compute_cpu_rate;
use crate::reconcile::{reconcile, WatermarkStore};
use crate::record;
use crate::sink::{Event, RecordSink};
use crate::time;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// What a single container contributed to a tick
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerOutcome {
    /// Records paired with their emission epoch, newest first
    pub records: Vec<(i64, MetricRecord)>,
    /// Pairs dropped for inconsistent counters
    pub skipped_pairs: usize,
    pub next_watermark: i64,
}

/// Totals for one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub containers: usize,
    pub failed_containers: usize,
    pub records: usize,
    pub skipped_pairs: usize,
}

type FetchResult = (String, Result<(ContainerMeta, ContainerStats), Error>);

/// Owns the machine spec and the watermark store for the process lifetime
pub struct CollectionDriver {
    provider: Arc<dyn StatsProvider>,
    runtime: Arc<dyn ContainerRuntime>,
    sink: Arc<dyn RecordSink>,
    machine: MachineSpec,
    watermarks: WatermarkStore,
    tag: String,
    metrics: AgentMetrics,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl CollectionDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn StatsProvider>,
        runtime: Arc<dyn ContainerRuntime>,
        sink: Arc<dyn RecordSink>,
        machine: MachineSpec,
        tag: impl Into<String>,
        metrics: AgentMetrics,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            provider,
            runtime,
            sink,
            machine,
            watermarks: WatermarkStore::new(),
            tag: tag.into(),
            metrics,
            health,
            logger,
        }
    }

    pub fn machine(&self) -> &MachineSpec {
        &self.machine
    }

    pub fn watermarks(&self) -> &WatermarkStore {
        &self.watermarks
    }

    /// Run one full tick.
    ///
    /// Fails only if the running containers cannot be enumerated; everything
    /// scoped to a single container is logged and skipped.
    pub async fn tick(&mut self) -> Result<TickSummary> {
        let ids = match self.runtime.list_containers().await {
            Ok(ids) => {
                self.health.set_healthy(components::RUNTIME).await;
                ids
            }
            Err(e) => {
                self.health
                    .set_unhealthy(components::RUNTIME, e.to_string())
                    .await;
                return Err(e).context("Failed to list running containers");
            }
        };

        self.metrics.set_containers_monitored(ids.len() as i64);
        let mut summary = TickSummary {
            containers: ids.len(),
            ..Default::default()
        };

        for (container_id, fetched) in self.fetch_all(ids).await {
            let outcome = fetched.and_then(|(meta, stats)| self.process_container(&meta, stats));
            match outcome {
                Ok(outcome) => {
                    summary.skipped_pairs += outcome.skipped_pairs;
                    summary.records += outcome.records.len();
                    self.emit_all(outcome.records).await;
                }
                Err(e) => {
                    summary.failed_containers += 1;
                    self.metrics.inc_fetch_errors();
                    warn!(
                        container_id = %container_id,
                        error = %e,
                        "Skipping container for this tick"
                    );
                }
            }
        }

        if summary.failed_containers == 0 {
            self.health.set_healthy(components::PROVIDER).await;
        } else {
            self.health
                .set_degraded(
                    components::PROVIDER,
                    format!(
                        "{} of {} containers failed",
                        summary.failed_containers, summary.containers
                    ),
                )
                .await;
        }

        Ok(summary)
    }

    /// Fetch metadata and samples for every container concurrently
    async fn fetch_all(&self, ids: Vec<String>) -> Vec<FetchResult> {
        let mut tasks = JoinSet::new();
        for id in ids {
            let provider = Arc::clone(&self.provider);
            let runtime = Arc::clone(&self.runtime);
            tasks.spawn(async move {
                let fetched = async {
                    let meta = runtime.inspect(&id).await?;
                    let stats = provider.container_stats(&id).await?;
                    Ok::<_, Error>((meta, stats))
                }
                .await;
                (id, fetched)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    self.metrics.inc_fetch_errors();
                    error!(error = %e, "Container fetch task failed");
                }
            }
        }
        results
    }

    /// Reconcile one container's batch and build its records.
    ///
    /// The watermark is advanced whenever reconciliation succeeds, even if
    /// every pair had to be skipped.
    pub fn process_container(
        &mut self,
        meta: &ContainerMeta,
        stats: ContainerStats,
    ) -> Result<ContainerOutcome, Error> {
        let watermark = self.watermarks.get(&meta.id);
        let reconciled = reconcile(stats.into_samples(), watermark)?;

        let mut records = Vec::new();
        let mut skipped_pairs = 0;
        for (curr, prev) in reconciled.pairs() {
            let built = compute_cpu_rate(curr, prev).and_then(|rate| {
                let record = record::build(meta, &self.machine, curr, prev, &rate)?;
                let epoch = time::truncated_epoch(&curr.timestamp)?;
                Ok((epoch, record))
            });

            match built {
                Ok(entry) => records.push(entry),
                Err(e) => {
                    skipped_pairs += 1;
                    self.metrics.inc_skipped_pairs();
                    self.logger
                        .log_skipped_pair(&meta.id, &curr.timestamp, &e.to_string());
                }
            }
        }

        self.watermarks.set(meta.id.clone(), reconciled.next_watermark);
        debug!(
            container_id = %meta.id,
            records = records.len(),
            skipped = skipped_pairs,
            watermark = reconciled.next_watermark,
            "Reconciled container samples"
        );

        Ok(ContainerOutcome {
            records,
            skipped_pairs,
            next_watermark: reconciled.next_watermark,
        })
    }

    async fn emit_all(&self, records: Vec<(i64, MetricRecord)>) {
        for (time, record) in records {
            let event = Event {
                tag: self.tag.clone(),
                time,
                record,
            };
            match self.sink.emit(event).await {
                Ok(()) => self.metrics.inc_records_emitted(),
                Err(e) => {
                    self.metrics.inc_emit_errors();
                    self.health
                        .set_degraded(components::SINK, e.to_string())
                        .await;
                    warn!(error = %e, "Failed to emit record");
                }
            }
        }
    }
}
