//! CPU rate computation from cumulative counters

use crate::error::{Error, InconsistentCounterError};
use crate::models::StatsSample;
use crate::time;

/// CPU usage over the interval between two adjacent samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateResult {
    /// CPU nanoseconds consumed across all cores during the interval
    pub raw_usage: u64,
    /// Average per-core utilization; 100 means one core saturated for the interval
    pub pct: f64,
    pub num_cores: usize,
}

/// Round half away from zero to two decimal places
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the CPU rate between `curr` and its chronological predecessor `prev`.
///
/// # Errors
///
/// - [`InconsistentCounterError::CounterDecreased`] if the cumulative total went
///   down (the container restarted between the samples).
/// - [`InconsistentCounterError::NonPositiveInterval`] if `prev` is not strictly
///   older than `curr`.
/// - [`InconsistentCounterError::NoCpuCores`] if `curr` reports no per-cpu usage.
/// - [`crate::error::ParseError::Timestamp`] if either timestamp is malformed.
pub fn compute_cpu_rate(curr: &StatsSample, prev: &StatsSample) -> Result<RateResult, Error> {
    let num_cores = curr.cpu.usage.per_cpu_usage.len();
    if num_cores == 0 {
        return Err(InconsistentCounterError::NoCpuCores.into());
    }

    let raw_usage = curr
        .cpu
        .usage
        .total
        .checked_sub(prev.cpu.usage.total)
        .ok_or(InconsistentCounterError::CounterDecreased {
            previous: prev.cpu.usage.total,
            current: curr.cpu.usage.total,
        })?;

    let interval_ns = time::interval_ns(&curr.timestamp, &prev.timestamp)?;
    if interval_ns <= 0.0 {
        return Err(InconsistentCounterError::NonPositiveInterval { interval_ns }.into());
    }

    let pct = round2(raw_usage as f64 / interval_ns / num_cores as f64 * 100.0);

    Ok(RateResult {
        raw_usage,
        pct,
        num_cores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CpuStats, CpuUsage};

    fn sample(timestamp: &str, total: u64, cores: usize) -> StatsSample {
        StatsSample {
            timestamp: timestamp.to_string(),
            cpu: CpuStats {
                usage: CpuUsage {
                    total,
                    per_cpu_usage: vec![total / cores.max(1) as u64; cores],
                    user: 0,
                    system: 0,
                },
                load_average: 0,
            },
            memory: Default::default(),
            network: Default::default(),
        }
    }

    #[test]
    fn test_small_delta_rounds_to_zero() {
        let prev = sample("2024-03-01T10:00:00Z", 100, 2);
        let curr = sample("2024-03-01T10:00:01Z", 300, 2);

        let rate = compute_cpu_rate(&curr, &prev).unwrap();

        assert_eq!(rate.raw_usage, 200);
        assert_eq!(rate.num_cores, 2);
        assert_eq!(rate.pct, 0.0);
    }

    #[test]
    fn test_one_core_saturated() {
        let prev = sample("2024-03-01T10:00:00Z", 0, 4);
        let curr = sample("2024-03-01T10:00:10Z", 10_000_000_000, 4);

        let rate = compute_cpu_rate(&curr, &prev).unwrap();

        // 10s of cpu over a 10s interval spread over 4 cores
        assert_eq!(rate.pct, 25.0);
    }

    #[test]
    fn test_pct_rounds_to_two_decimals() {
        let prev = sample("2024-03-01T10:00:00Z", 0, 3);
        let curr = sample("2024-03-01T10:00:01Z", 1_000_000_000, 3);

        let rate = compute_cpu_rate(&curr, &prev).unwrap();

        assert_eq!(rate.pct, 33.33);
    }

    #[test]
    fn test_subsecond_interval() {
        let prev = sample("2024-03-01T10:00:00.5Z", 0, 1);
        let curr = sample("2024-03-01T10:00:01Z", 250_000_000, 1);

        let rate = compute_cpu_rate(&curr, &prev).unwrap();

        assert_eq!(rate.pct, 50.0);
    }

    #[test]
    fn test_deterministic() {
        let prev = sample("2024-03-01T10:00:00Z", 123_456_789, 2);
        let curr = sample("2024-03-01T10:00:07.3Z", 9_876_543_210, 2);

        let a = compute_cpu_rate(&curr, &prev).unwrap();
        let b = compute_cpu_rate(&curr, &prev).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_counter_decrease_is_inconsistent() {
        let prev = sample("2024-03-01T10:00:00Z", 5_000, 2);
        let curr = sample("2024-03-01T10:00:01Z", 1_000, 2);

        let err = compute_cpu_rate(&curr, &prev).unwrap_err();

        match err {
            Error::InconsistentCounter(InconsistentCounterError::CounterDecreased {
                previous,
                current,
            }) => {
                assert_eq!(previous, 5_000);
                assert_eq!(current, 1_000);
            }
            other => panic!("Expected CounterDecreased, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_interval_is_inconsistent() {
        let prev = sample("2024-03-01T10:00:00Z", 100, 1);
        let curr = sample("2024-03-01T10:00:00Z", 200, 1);

        let err = compute_cpu_rate(&curr, &prev).unwrap_err();

        assert!(matches!(
            err,
            Error::InconsistentCounter(InconsistentCounterError::NonPositiveInterval { .. })
        ));
    }

    #[test]
    fn test_reversed_pair_is_inconsistent() {
        let prev = sample("2024-03-01T10:00:05Z", 100, 1);
        let curr = sample("2024-03-01T10:00:00Z", 100, 1);

        let err = compute_cpu_rate(&curr, &prev).unwrap_err();

        assert!(err.is_inconsistent_counter());
    }

    #[test]
    fn test_missing_per_cpu_usage() {
        let prev = sample("2024-03-01T10:00:00Z", 100, 0);
        let curr = sample("2024-03-01T10:00:01Z", 200, 0);

        let err = compute_cpu_rate(&curr, &prev).unwrap_err();

        assert!(matches!(
            err,
            Error::InconsistentCounter(InconsistentCounterError::NoCpuCores)
        ));
    }
}
