//! Agent library for container stats collection
//!
//! This crate provides the core functionality for:
//! - Fetching container samples from cAdvisor and metadata from Docker
//! - Watermark-based deduplication of overlapping sample batches
//! - CPU rate computation and record assembly
//! - Health checks and observability

pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod rate;
pub mod reconcile;
pub mod record;
pub mod sink;
pub mod time;

pub use error::{Error, FetchError, InconsistentCounterError, ParseError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use sink::{ChannelSink, Event, RecordSink};
