//! Provider timestamp handling
//!
//! cAdvisor reports RFC 3339 timestamps with nanosecond precision. Epochs are
//! kept as `f64` seconds for rate computation and truncated to whole seconds
//! for watermark comparison.

use crate::error::ParseError;
use chrono::{DateTime, FixedOffset};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Fallback layout for timestamps rendered as `2024-03-01 10:00:00.5 +00:00`
const SPACED_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.f %:z";

fn parse_datetime(ts: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    DateTime::parse_from_rfc3339(ts)
        .or_else(|_| DateTime::parse_from_str(ts, SPACED_LAYOUT))
        .map_err(|source| ParseError::Timestamp {
            value: ts.to_string(),
            source,
        })
}

/// Parse a provider timestamp into epoch seconds, keeping sub-second precision.
pub fn parse(ts: &str) -> Result<f64, ParseError> {
    let dt = parse_datetime(ts)?;
    Ok(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / NANOS_PER_SEC)
}

/// Parse a provider timestamp into whole epoch seconds (floored).
pub fn truncated_epoch(ts: &str) -> Result<i64, ParseError> {
    Ok(parse_datetime(ts)?.timestamp())
}

/// Nanoseconds elapsed from `previous` to `current`.
///
/// The sign is preserved: a negative result means the caller passed the
/// samples in the wrong order.
pub fn interval_ns(current: &str, previous: &str) -> Result<f64, ParseError> {
    let delta = parse_datetime(current)? - parse_datetime(previous)?;
    Ok(match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64,
        None => delta.num_milliseconds() as f64 * 1_000_000.0,
    })
}
