//! HTTP server wiring: router construction, middleware, and the
//! Prometheus exporter on its own port.

use crate::rest::{self, AppState};
use adserver_cache::DecisionCache;
use adserver_core::config::AppConfig;
use adserver_engine::DecisionEngine;
use adserver_recorder::ImpressionRecorder;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the application router over any decision cache. Tests mount
/// this directly over the in-memory cache.
pub fn router<C: DecisionCache + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .route("/ad-request", post(rest::handle_ad_request::<C>))
        .route("/impression", post(rest::handle_impression::<C>))
        .route("/health", get(rest::health_check::<C>))
        .route("/ready", get(rest::readiness::<C>))
        .route("/live", get(rest::liveness))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer<C> {
    config: AppConfig,
    engine: Arc<DecisionEngine<C>>,
    recorder: Arc<ImpressionRecorder<C>>,
}

impl<C: DecisionCache + 'static> ApiServer<C> {
    pub fn new(
        config: AppConfig,
        engine: Arc<DecisionEngine<C>>,
        recorder: Arc<ImpressionRecorder<C>>,
    ) -> Self {
        Self {
            config,
            engine,
            recorder,
        }
    }

    /// Start the HTTP server; blocks until shutdown.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState {
            engine: self.engine.clone(),
            recorder: self.recorder.clone(),
            node_id: self.config.node_id.clone(),
            tracking_url: format!("{}/impression", self.config.api.tracking_base_url),
            request_timeout: Duration::from_millis(self.config.decision.request_timeout_ms),
            start_time: Instant::now(),
        };

        let app = router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics exporter on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}
