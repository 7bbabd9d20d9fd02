//! Error taxonomy for stats collection
//!
//! Fetch and parse failures are scoped to a single container for one tick;
//! inconsistent counters are scoped to a single sample pair.

use thiserror::Error;

/// The provider or the container runtime could not be reached, or answered
/// with a non-success status.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to `{url}` failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid request url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("`{url}` answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("container runtime request failed: {0}")]
    Runtime(#[source] bollard::errors::Error),
}

/// Malformed provider data.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unrecognized timestamp `{value}`: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("failed to decode response body from `{url}`: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(
        "samples are not ordered most-recent-first: `{newer}` at index {index} follows `{older}`"
    )]
    OutOfOrder {
        index: usize,
        older: String,
        newer: String,
    },

    #[error("container runtime returned no {field} for container `{container_id}`")]
    MissingField {
        container_id: String,
        field: &'static str,
    },
}

/// A sample pair that cannot yield a meaningful rate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InconsistentCounterError {
    #[error("cumulative cpu counter decreased from {previous} to {current}")]
    CounterDecreased { previous: u64, current: u64 },

    #[error("sample interval must be positive, got {interval_ns}ns")]
    NonPositiveInterval { interval_ns: f64 },

    #[error("sample carries no per-cpu usage")]
    NoCpuCores,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    InconsistentCounter(#[from] InconsistentCounterError),
}

impl Error {
    pub fn is_inconsistent_counter(&self) -> bool {
        matches!(self, Error::InconsistentCounter(_))
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::Fetch(_))
    }
}
