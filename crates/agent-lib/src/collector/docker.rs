//! Container enumeration through the Docker Engine API

use super::ContainerRuntime;
use crate::error::{Error, FetchError, ParseError};
use crate::models::ContainerMeta;
use anyhow::Context;
use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::service::ContainerInspectResponse;
use bollard::{Docker, API_DEFAULT_VERSION};
use tracing::debug;

/// Seconds before a Docker API request is abandoned
const DOCKER_TIMEOUT_SECS: u64 = 30;

/// Container runtime backed by a Docker daemon
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon at `url`.
    ///
    /// Accepts `unix:///path/to/docker.sock` as well as `tcp://` and `http://`
    /// addresses. The connection is lazy; nothing is sent until the first call.
    pub fn connect(url: &str) -> anyhow::Result<Self> {
        let docker = if let Some(path) = url.strip_prefix("unix://") {
            Docker::connect_with_unix(path, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION)
        } else if let Some(addr) = url.strip_prefix("tcp://") {
            Docker::connect_with_http(
                &format!("http://{}", addr),
                DOCKER_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            )
        } else {
            Docker::connect_with_http(url, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION)
        }
        .with_context(|| format!("Failed to configure Docker client for {}", url))?;

        Ok(Self { docker })
    }
}

/// Convert an inspect response into container metadata
fn meta_from_inspect(
    container_id: &str,
    inspect: ContainerInspectResponse,
) -> Result<ContainerMeta, ParseError> {
    let config = inspect.config.ok_or_else(|| ParseError::MissingField {
        container_id: container_id.to_string(),
        field: "Config",
    })?;

    Ok(ContainerMeta::new(
        inspect.id.unwrap_or_else(|| container_id.to_string()),
        inspect.name.unwrap_or_default(),
        config.image.unwrap_or_default(),
        config.hostname.unwrap_or_default(),
        inspect.restart_count.unwrap_or(0),
    ))
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<String>, Error> {
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(FetchError::Runtime)?;

        let ids: Vec<String> = summaries.into_iter().filter_map(|s| s.id).collect();
        debug!(count = ids.len(), "Listed running containers");
        Ok(ids)
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerMeta, Error> {
        let inspect = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(FetchError::Runtime)?;

        Ok(meta_from_inspect(container_id, inspect)?)
    }
}
