//! cAdvisor stats agent
//!
//! Configuration, the health/metrics API and record output for the
//! `cadvisor-agent` binary.

pub mod api;
pub mod config;
pub mod output;
