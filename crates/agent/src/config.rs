//! Agent configuration

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of every environment variable the agent reads
pub const ENV_PREFIX: &str = "CADVISOR_AGENT";

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_VAR: &str = "CADVISOR_AGENT_CONFIG";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// cAdvisor host
    pub host: String,

    /// cAdvisor port
    pub port: u16,

    /// cAdvisor API version, e.g. "2.0"
    pub api_version: String,

    /// Seconds between collection ticks
    pub stats_interval_secs: u64,

    /// Prefix of the output tag; the emitted tag is this followed by "stats"
    pub tag_prefix: String,

    /// Docker daemon address
    pub docker_url: String,

    /// Name reported in structured logs
    pub node_name: String,

    /// API server port for health/metrics
    pub api_port: u16,

    /// Upper bound on waiting for the loop to stop
    pub shutdown_timeout_secs: u64,

    /// Timeout for a single cAdvisor request
    pub request_timeout_secs: u64,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

impl AgentConfig {
    /// Load configuration from the optional config file and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::from_sources(path.as_deref(), Environment::with_prefix(ENV_PREFIX))
    }

    /// Layer `env` over the file at `path` (if any) over the defaults
    pub fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("host", "localhost")?
            .set_default("port", 8080)?
            .set_default("api_version", "2.0")?
            .set_default("stats_interval_secs", 60)?
            .set_default("tag_prefix", "metric")?
            .set_default("docker_url", "unix:///var/run/docker.sock")?
            .set_default("node_name", default_node_name())?
            .set_default("api_port", 9102)?
            .set_default("shutdown_timeout_secs", 10)?
            .set_default("request_timeout_secs", 30)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: AgentConfig = builder
            .add_source(env)
            .build()
            .context("Failed to read agent configuration")?
            .try_deserialize()
            .context("Invalid agent configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.stats_interval_secs == 0 {
            anyhow::bail!("stats_interval_secs must be positive");
        }
        if self.api_version.is_empty() {
            anyhow::bail!("api_version must not be empty");
        }
        Ok(())
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// cAdvisor endpoint, for logging
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/api/v{}/", self.host, self.port, self.api_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_sources(None, env(&[])).unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8080);
        assert_eq!(config.api_version, "2.0");
        assert_eq!(config.stats_interval(), Duration::from_secs(60));
        assert_eq!(config.tag_prefix, "metric");
        assert_eq!(config.docker_url, "unix:///var/run/docker.sock");
        assert_eq!(config.api_port, 9102);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.endpoint(), "http://localhost:8080/api/v2.0/");
    }

    #[test]
    fn test_environment_overrides() {
        let config = AgentConfig::from_sources(
            None,
            env(&[
                ("CADVISOR_AGENT_HOST", "cadvisor"),
                ("CADVISOR_AGENT_PORT", "9000"),
                ("CADVISOR_AGENT_STATS_INTERVAL_SECS", "15"),
                ("CADVISOR_AGENT_TAG_PREFIX", "docker."),
            ]),
        )
        .unwrap();

        assert_eq!(config.host, "cadvisor");
        assert_eq!(config.port, 9000);
        assert_eq!(config.stats_interval_secs, 15);
        assert_eq!(config.tag_prefix, "docker.");
    }

    #[test]
    fn test_file_source_under_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "host = \"10.0.0.5\"\napi_version = \"1.3\"\nstats_interval_secs = 30"
        )
        .unwrap();

        let config = AgentConfig::from_sources(
            Some(file.path()),
            env(&[("CADVISOR_AGENT_STATS_INTERVAL_SECS", "5")]),
        )
        .unwrap();

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.api_version, "1.3");
        assert_eq!(config.stats_interval_secs, 5);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(AgentConfig::from_sources(Some(&path), env(&[])).is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = AgentConfig::from_sources(
            None,
            env(&[("CADVISOR_AGENT_STATS_INTERVAL_SECS", "0")]),
        );

        assert!(result.is_err());
    }
}
