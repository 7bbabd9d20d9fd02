//! Sample reconciliation against per-container watermarks
//!
//! The provider returns a rolling window of samples on every poll, so most of
//! a batch has usually been reported already. [`reconcile`] drops everything
//! at or below the container's watermark and proposes the next watermark; the
//! caller persists it in its [`WatermarkStore`].

use crate::error::ParseError;
use crate::models::StatsSample;
use crate::time;
use std::collections::HashMap;

/// Per-container high-water marks in whole epoch seconds.
///
/// Lives for the process lifetime and is owned by a single writer, the
/// collection driver.
#[derive(Debug, Default, Clone)]
pub struct WatermarkStore {
    marks: HashMap<String, i64>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watermark for a container, `0` if it has never been seen
    pub fn get(&self, container_id: &str) -> i64 {
        self.marks.get(container_id).copied().unwrap_or(0)
    }

    /// Overwrite the watermark. No max-merge: monotonicity is up to the caller.
    pub fn set(&mut self, container_id: impl Into<String>, epoch_secs: i64) {
        self.marks.insert(container_id.into(), epoch_secs);
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

/// Outcome of reconciling one container's batch
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Samples newer than the watermark, still most-recent-first
    pub samples: Vec<StatsSample>,
    /// Epoch of the oldest surviving sample, or the old watermark if none survived
    pub next_watermark: i64,
}

impl Reconciled {
    /// Adjacent `(current, previous)` pairs, newest pair first
    pub fn pairs(&self) -> impl Iterator<Item = (&StatsSample, &StatsSample)> {
        self.samples.windows(2).map(|w| (&w[0], &w[1]))
    }
}

/// Filter out already-emitted samples.
///
/// `samples` must be ordered most-recent-first; a batch where any sample is
/// strictly newer than the one before it is rejected with
/// [`ParseError::OutOfOrder`]. Samples are compared to the watermark by their
/// truncated epoch.
///
/// The next watermark is the epoch of the *oldest* surviving sample. That
/// sample only serves as the `previous` half of the last pair and produces no
/// record of its own. A poll that brings a single new sample therefore moves
/// the watermark onto that sample without it ever being paired.
pub fn reconcile(samples: Vec<StatsSample>, watermark: i64) -> Result<Reconciled, ParseError> {
    let mut epochs = Vec::with_capacity(samples.len());
    for sample in &samples {
        epochs.push(time::parse(&sample.timestamp)?);
    }

    for (index, pair) in epochs.windows(2).enumerate() {
        if pair[1] > pair[0] {
            return Err(ParseError::OutOfOrder {
                index: index + 1,
                older: samples[index].timestamp.clone(),
                newer: samples[index + 1].timestamp.clone(),
            });
        }
    }

    // Whole seconds straight from the parsed timestamp; flooring the f64
    // epoch can round a .9999999x fraction up into the next second
    let mut seconds = Vec::with_capacity(samples.len());
    for sample in &samples {
        seconds.push(time::truncated_epoch(&sample.timestamp)?);
    }

    let survivors: Vec<(StatsSample, i64)> = samples
        .into_iter()
        .zip(seconds)
        .filter(|(_, secs)| *secs > watermark)
        .collect();

    let next_watermark = survivors.last().map_or(watermark, |(_, secs)| *secs);
    let samples = survivors.into_iter().map(|(sample, _)| sample).collect();

    Ok(Reconciled {
        samples,
        next_watermark,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CpuStats, CpuUsage};

    fn sample(timestamp: &str) -> StatsSample {
        StatsSample {
            timestamp: timestamp.to_string(),
            cpu: CpuStats {
                usage: CpuUsage {
                    total: 0,
                    per_cpu_usage: vec![0],
                    user: 0,
                    system: 0,
                },
                load_average: 0,
            },
            memory: Default::default(),
            network: Default::default(),
        }
    }

    fn batch(timestamps: &[&str]) -> Vec<StatsSample> {
        timestamps.iter().map(|ts| sample(ts)).collect()
    }

    // 2024-03-01T10:00:00Z
    const T0: i64 = 1_709_287_200;

    #[test]
    fn test_watermark_store_defaults_to_zero() {
        let mut store = WatermarkStore::new();
        assert_eq!(store.get("abc"), 0);
        assert!(store.is_empty());

        store.set("abc", 42);
        assert_eq!(store.get("abc"), 42);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_watermark_store_overwrites_without_max_merge() {
        let mut store = WatermarkStore::new();
        store.set("abc", 100);
        store.set("abc", 50);
        assert_eq!(store.get("abc"), 50);
    }

    #[test]
    fn test_reconcile_fresh_container_keeps_everything() {
        let samples = batch(&[
            "2024-03-01T10:00:02Z",
            "2024-03-01T10:00:01Z",
            "2024-03-01T10:00:00Z",
        ]);

        let out = reconcile(samples.clone(), 0).unwrap();

        assert_eq!(out.samples, samples);
        assert_eq!(out.next_watermark, T0);
        assert_eq!(out.pairs().count(), 2);
    }

    #[test]
    fn test_reconcile_batch_below_watermark_is_empty() {
        let samples = batch(&["2024-03-01T10:00:01Z", "2024-03-01T10:00:00Z"]);

        let out = reconcile(samples, T0 + 1).unwrap();

        assert!(out.samples.is_empty());
        assert_eq!(out.next_watermark, T0 + 1);
        assert_eq!(out.pairs().count(), 0);
    }

    #[test]
    fn test_reconcile_sample_at_watermark_is_dropped() {
        let samples = batch(&[
            "2024-03-01T10:00:02Z",
            "2024-03-01T10:00:01Z",
            "2024-03-01T10:00:00Z",
        ]);

        let out = reconcile(samples, T0).unwrap();

        assert_eq!(out.samples.len(), 2);
        assert_eq!(out.samples[1].timestamp, "2024-03-01T10:00:01Z");
        assert_eq!(out.next_watermark, T0 + 1);
    }

    #[test]
    fn test_reconcile_compares_truncated_seconds() {
        // 10:00:00.9 truncates to the watermark itself and is dropped
        let samples = batch(&["2024-03-01T10:00:01.2Z", "2024-03-01T10:00:00.9Z"]);

        let out = reconcile(samples, T0).unwrap();

        assert_eq!(out.samples.len(), 1);
        assert_eq!(out.samples[0].timestamp, "2024-03-01T10:00:01.2Z");
    }

    #[test]
    fn test_reconcile_near_whole_second_fraction_stays_in_its_second() {
        let first = reconcile(
            batch(&["2024-03-01T10:00:05Z", "2024-03-01T10:00:00.99999999Z"]),
            0,
        )
        .unwrap();
        assert_eq!(first.next_watermark, T0);

        let second = reconcile(
            batch(&[
                "2024-03-01T10:00:10Z",
                "2024-03-01T10:00:05Z",
                "2024-03-01T10:00:00.99999999Z",
            ]),
            first.next_watermark,
        )
        .unwrap();

        assert_eq!(second.samples.len(), 2);
        assert_eq!(second.next_watermark, T0 + 5);
        let currents: Vec<_> = second.pairs().map(|(curr, _)| curr.timestamp.as_str()).collect();
        assert_eq!(currents, vec!["2024-03-01T10:00:10Z"]);
    }

    #[test]
    fn test_reconcile_single_new_sample_moves_watermark_to_it() {
        let samples = batch(&["2024-03-01T10:00:05Z", "2024-03-01T10:00:04Z"]);

        let out = reconcile(samples, T0 + 4).unwrap();

        assert_eq!(out.samples.len(), 1);
        assert_eq!(out.next_watermark, T0 + 5);
        assert_eq!(out.pairs().count(), 0);
    }

    #[test]
    fn test_reconcile_consecutive_polls_do_not_repeat_records() {
        let first = reconcile(
            batch(&["2024-03-01T10:00:02Z", "2024-03-01T10:00:01Z"]),
            T0,
        )
        .unwrap();
        assert_eq!(first.pairs().count(), 1);
        assert_eq!(first.next_watermark, T0 + 1);

        // 10:00:02 was the `current` half of the first poll's pair and is
        // only the `previous` half now
        let second = reconcile(
            batch(&[
                "2024-03-01T10:00:03Z",
                "2024-03-01T10:00:02Z",
                "2024-03-01T10:00:01Z",
            ]),
            first.next_watermark,
        )
        .unwrap();
        let pairs: Vec<_> = second
            .pairs()
            .map(|(curr, prev)| (curr.timestamp.as_str(), prev.timestamp.as_str()))
            .collect();
        assert_eq!(pairs, vec![("2024-03-01T10:00:03Z", "2024-03-01T10:00:02Z")]);
        assert_eq!(second.next_watermark, T0 + 2);
    }

    #[test]
    fn test_reconcile_one_new_sample_per_poll_never_pairs() {
        // Known gap of the oldest-survivor boundary rule: when every poll
        // brings exactly one new sample, that sample becomes the watermark
        // before it is ever paired, and no record is produced.
        let mut watermark = T0 + 2;
        for (newest, previous) in [
            ("2024-03-01T10:00:03Z", "2024-03-01T10:00:02Z"),
            ("2024-03-01T10:00:04Z", "2024-03-01T10:00:03Z"),
            ("2024-03-01T10:00:05Z", "2024-03-01T10:00:04Z"),
        ] {
            let out = reconcile(batch(&[newest, previous]), watermark).unwrap();
            assert_eq!(out.samples.len(), 1);
            assert_eq!(out.pairs().count(), 0);
            assert_eq!(out.next_watermark, watermark + 1);
            watermark = out.next_watermark;
        }
    }

    #[test]
    fn test_reconcile_rejects_out_of_order_batch() {
        let samples = batch(&[
            "2024-03-01T10:00:00Z",
            "2024-03-01T10:00:01Z",
            "2024-03-01T10:00:02Z",
        ]);

        let err = reconcile(samples, 0).unwrap_err();

        match err {
            ParseError::OutOfOrder {
                index, older, newer,
            } => {
                assert_eq!(index, 1);
                assert_eq!(older, "2024-03-01T10:00:00Z");
                assert_eq!(newer, "2024-03-01T10:00:01Z");
            }
            other => panic!("Expected OutOfOrder error, got {other:?}"),
        }
    }

    #[test]
    fn test_reconcile_accepts_equal_adjacent_timestamps() {
        let samples = batch(&["2024-03-01T10:00:01Z", "2024-03-01T10:00:01Z"]);
        let out = reconcile(samples, 0).unwrap();
        assert_eq!(out.samples.len(), 2);
    }

    #[test]
    fn test_reconcile_propagates_bad_timestamp() {
        let samples = batch(&["2024-03-01T10:00:01Z", "not a time"]);
        assert!(matches!(
            reconcile(samples, 0),
            Err(ParseError::Timestamp { .. })
        ));
    }
}
