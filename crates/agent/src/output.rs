//! JSON-lines forwarding of emitted records

use agent_lib::sink::Event;
use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::info;

/// Write every event from `rx` to `writer`, one JSON object per line.
///
/// Returns the number of events written once the channel closes.
pub async fn forward<W>(mut rx: mpsc::Receiver<Event>, mut writer: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(event) = rx.recv().await {
        let mut line = serde_json::to_vec(&event).context("Failed to serialize event")?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .context("Failed to write event")?;
        writer.flush().await.context("Failed to flush output")?;
        written += 1;
    }

    info!(events = written, "Record channel closed");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_lib::models::MetricRecord;

    fn record(container_id: &str) -> MetricRecord {
        MetricRecord {
            id: "abc".to_string(),
            container_id: container_id.to_string(),
            image: "nginx:1.25".to_string(),
            name: "/web".to_string(),
            hostname: "web--1.25--production".to_string(),
            environment: "production".to_string(),
            restart_count: 0,
            memory_current: 1,
            memory_limit: 2,
            cpu_usage: 3,
            cpu_usage_pct: 12.5,
            cpu_num_cores: 4,
            cpu_cumulative_total: 5,
            cpu_cumulative_user: 6,
            cpu_cumulative_sys: 7,
            cpu_load_average: 0,
            network_rx_bytes: 8,
            network_rx_packets: 9,
            network_rx_errors: 0,
            network_rx_dropped: 0,
            network_tx_bytes: 10,
            network_tx_packets: 11,
            network_tx_errors: 0,
            network_tx_dropped: 0,
        }
    }

    #[tokio::test]
    async fn test_forward_writes_json_lines() {
        let (tx, rx) = mpsc::channel(4);
        for id in ["a", "b"] {
            tx.send(Event {
                tag: "metricstats".to_string(),
                time: 1_709_287_200,
                record: record(id),
            })
            .await
            .unwrap();
        }
        drop(tx);

        let mut out = Vec::new();
        let written = forward(rx, &mut out).await.unwrap();

        assert_eq!(written, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["tag"], "metricstats");
        assert_eq!(first["time"], 1_709_287_200);
        assert_eq!(first["record"]["container_id"], "a");
        assert_eq!(first["record"]["cpu_usage_pct"], 12.5);
    }
}
