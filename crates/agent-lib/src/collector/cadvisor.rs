//! cAdvisor REST client
//!
//! Reads the machine spec from `{base}/machine` and container samples from
//! `{base}/containers/docker/{id}`, where `{base}` is
//! `http://{host}:{port}/api/v{version}/`.

use super::StatsProvider;
use crate::error::{Error, FetchError, ParseError};
use crate::models::{ContainerStats, MachineSpec};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP client for the cAdvisor API
#[derive(Debug, Clone)]
pub struct CadvisorClient {
    client: Client,
    base_url: Url,
}

impl CadvisorClient {
    /// Create a client for the API at `http://{host}:{port}/api/v{api_version}/`
    pub fn new(host: &str, port: u16, api_version: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = format!("http://{}:{}/api/v{}/", host, port, api_version);
        Self::with_base_url(&base_url, timeout)
    }

    /// Create a client for an explicit base URL (used by tests)
    pub fn with_base_url(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid cAdvisor URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self
            .base_url
            .join(path)
            .map_err(|source| FetchError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                source,
            })?;
        let url_str = url.to_string();
        debug!(url = %url_str, "Fetching from cAdvisor");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url_str.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url_str,
                status: response.status().as_u16(),
            }
            .into());
        }

        response
            .json()
            .await
            .map_err(|source| ParseError::Body { url: url_str, source }.into())
    }
}

#[async_trait]
impl StatsProvider for CadvisorClient {
    async fn machine_spec(&self) -> Result<MachineSpec, Error> {
        self.get("machine").await
    }

    async fn container_stats(&self, container_id: &str) -> Result<ContainerStats, Error> {
        self.get(&format!("containers/docker/{}", container_id)).await
    }
}
