//! Hand-off of finished records to the downstream pipeline

use crate::models::MetricRecord;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Suffix appended to the configured tag prefix
pub const TAG_SUFFIX: &str = "stats";

/// Output tag for a prefix, e.g. `metric` -> `metricstats`
pub fn output_tag(prefix: &str) -> String {
    format!("{prefix}{TAG_SUFFIX}")
}

/// One emitted record, timestamped with its sample's epoch seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub tag: String,
    pub time: i64,
    pub record: MetricRecord,
}

/// Destination for emitted records
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, event: Event) -> Result<()>;
}

/// Sink that forwards events into a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelSink {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn emit(&self, event: Event) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|e| anyhow::anyhow!("Record channel closed: {}", e))
    }
}
