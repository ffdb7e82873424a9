//! adserver — low-latency ad decision service.
//!
//! Main entry point that wires the decision cache, engine, impression
//! recorder, and HTTP server together.

use adserver_api::ApiServer;
use adserver_cache::RedisDecisionCache;
use adserver_core::config::AppConfig;
use adserver_engine::DecisionEngine;
use adserver_recorder::ImpressionRecorder;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "adserver")]
#[command(about = "Low-latency ad decision service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "ADSERVER__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "ADSERVER__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Redis URL (overrides config)
    #[arg(long, env = "ADSERVER__REDIS__URL")]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adserver=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("adserver starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(url) = cli.redis_url {
        config.redis.url = url;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        redis_url = %config.redis.url,
        "Configuration loaded"
    );

    // The decision cache is the one hard dependency; refuse to start
    // without it rather than serve guaranteed failures.
    let cache = Arc::new(RedisDecisionCache::connect(&config.redis).await?);

    let engine = Arc::new(DecisionEngine::new(cache.clone(), &config.decision));

    let recorder = Arc::new(
        ImpressionRecorder::new(cache.clone(), &config.clickhouse)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to initialize impression recorder");
                e
            })?,
    );

    let api_server = ApiServer::new(config.clone(), engine, recorder);

    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("adserver is ready to serve traffic");

    // Blocks until shutdown.
    api_server.start_http().await?;

    Ok(())
}
