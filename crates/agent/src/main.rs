//! cAdvisor agent - per-container resource stats collector
//!
//! Polls cAdvisor for every running Docker container, deduplicates the
//! overlapping sample batches and writes one JSON record per new sample pair
//! to stdout.

use agent_lib::{
    collector::{CadvisorClient, CollectionLoopBuilder, DockerRuntime},
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    sink::{output_tag, ChannelSink},
};
use anyhow::{Context, Result};
use cadvisor_agent::{api, config, output};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Records buffered between the collection loop and stdout
const RECORD_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries records
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting cadvisor-agent");

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        endpoint = %config.endpoint(),
        tag = %output_tag(&config.tag_prefix),
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::PROVIDER).await;
    health_registry.register(components::RUNTIME).await;
    health_registry.register(components::SINK).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    let provider = CadvisorClient::new(
        &config.host,
        config.port,
        &config.api_version,
        config.request_timeout(),
    )?;
    let runtime = DockerRuntime::connect(&config.docker_url)?;
    let (sink, records_rx) = ChannelSink::new(RECORD_BUFFER);
    let output_handle = tokio::spawn(output::forward(records_rx, tokio::io::stdout()));

    let collection_loop = CollectionLoopBuilder::new()
        .provider(Arc::new(provider))
        .runtime(Arc::new(runtime))
        .sink(Arc::new(sink))
        .metrics(metrics)
        .health(health_registry)
        .interval(config.stats_interval())
        .tag_prefix(config.tag_prefix.clone())
        .node_name(config.node_name.clone())
        .build()
        .await
        .context("Failed to initialize collection loop")?;

    logger.log_startup(
        AGENT_VERSION,
        &config.endpoint(),
        collection_loop.driver().machine().memory_capacity,
    );

    let loop_handle = tokio::spawn(collection_loop.run(shutdown_tx.subscribe()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(config.shutdown_timeout(), loop_handle).await {
        Ok(Ok(())) => info!("Collection loop stopped"),
        Ok(Err(e)) => error!(error = %e, "Collection loop task failed"),
        Err(_) => warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Collection loop did not stop in time"
        ),
    }

    match tokio::time::timeout(config.shutdown_timeout(), output_handle).await {
        Ok(Ok(Ok(written))) => info!(events = written, "Output drained"),
        Ok(Ok(Err(e))) => error!(error = %format!("{:#}", e), "Output failed"),
        Ok(Err(e)) => error!(error = %e, "Output task failed"),
        Err(_) => warn!("Output did not drain in time"),
    }

    if let Ok(Ok(Err(e))) = tokio::time::timeout(config.shutdown_timeout(), api_handle).await {
        error!(error = %format!("{:#}", e), "API server failed");
    }

    info!("Shutting down");
    Ok(())
}
