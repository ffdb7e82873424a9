//! REST handlers for the decision and impression endpoints plus
//! operational probes.

use adserver_cache::DecisionCache;
use adserver_core::error::AdServerError;
use adserver_core::types::{AdDecision, AdRequest, ImpressionEvent};
use adserver_engine::{DecisionEngine, DecisionOutcome};
use adserver_recorder::ImpressionRecorder;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn};
use uuid::Uuid;

/// Maximum string field length (device ID, app ID, etc.).
const MAX_FIELD_LEN: usize = 256;

/// Shared application state for REST handlers.
pub struct AppState<C> {
    pub engine: Arc<DecisionEngine<C>>,
    pub recorder: Arc<ImpressionRecorder<C>>,
    pub node_id: String,
    pub tracking_url: String,
    pub request_timeout: Duration,
    pub start_time: Instant,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            recorder: self.recorder.clone(),
            node_id: self.node_id.clone(),
            tracking_url: self.tracking_url.clone(),
            request_timeout: self.request_timeout,
            start_time: self.start_time,
        }
    }
}

/// Decision payload returned on 200.
#[derive(Debug, Serialize)]
pub struct AdResponse {
    pub ad_id: Uuid,
    pub campaign_id: String,
    pub creative_id: String,
    pub video_url: String,
    pub duration: u32,
    pub format: String,
    pub tracking_url: String,
    pub timestamp: DateTime<Utc>,
}

impl AdResponse {
    fn from_decision(decision: AdDecision, tracking_url: &str) -> Self {
        Self {
            ad_id: decision.ad_id,
            campaign_id: decision.campaign_id,
            creative_id: decision.creative_id,
            video_url: decision.video_url,
            duration: decision.duration,
            format: decision.format,
            tracking_url: tracking_url.to_string(),
            timestamp: decision.timestamp,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

fn bad_request(error: &str, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
        .into_response()
}

fn validate_ad_request(request: &AdRequest) -> Result<(), &'static str> {
    if request.device_id.is_empty() {
        return Err("'device_id' must not be empty");
    }
    if request.device_id.len() > MAX_FIELD_LEN {
        return Err("'device_id' exceeds maximum length");
    }
    Ok(())
}

fn validate_impression(event: &ImpressionEvent) -> Result<(), &'static str> {
    if event.ad_id.is_empty() {
        return Err("'ad_id' must not be empty");
    }
    if event.campaign_id.is_empty() {
        return Err("'campaign_id' must not be empty");
    }
    if event.creative_id.is_empty() {
        return Err("'creative_id' must not be empty");
    }
    if event.device_id.is_empty() {
        return Err("'device_id' must not be empty");
    }
    Ok(())
}

/// POST /ad-request — select a (campaign, creative) pairing.
/// 200 with the decision, 204 when there is no inventory, 400 on bad
/// input, 503 when the decision cache is unreachable.
pub async fn handle_ad_request<C: DecisionCache + 'static>(
    State(state): State<AppState<C>>,
    payload: Result<Json<AdRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            metrics::counter!("api.validation_errors").increment(1);
            return bad_request("invalid_ad_request", rejection.body_text());
        }
    };

    if let Err(msg) = validate_ad_request(&request) {
        warn!(device_id = %request.device_id, error = msg, "Ad request validation failed");
        metrics::counter!("api.validation_errors").increment(1);
        return bad_request("invalid_ad_request", msg.to_string());
    }

    match tokio::time::timeout(state.request_timeout, state.engine.decide(&request)).await {
        Ok(Ok(DecisionOutcome::Decided(decision))) => (
            StatusCode::OK,
            Json(AdResponse::from_decision(decision, &state.tracking_url)),
        )
            .into_response(),
        Ok(Ok(DecisionOutcome::NoInventory)) => StatusCode::NO_CONTENT.into_response(),
        Ok(Err(e @ AdServerError::CacheUnavailable(_))) => {
            error!(error = %e, "Decision failed: cache unreachable");
            metrics::counter!("api.errors").increment(1);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "cache_unavailable".to_string(),
                    message: "Decision cache unreachable".to_string(),
                }),
            )
                .into_response()
        }
        Ok(Err(e)) => {
            error!(error = %e, "Decision failed");
            metrics::counter!("api.errors").increment(1);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "decision_failed".to_string(),
                    message: "Internal processing error".to_string(),
                }),
            )
                .into_response()
        }
        Err(_) => {
            error!(timeout_ms = state.request_timeout.as_millis() as u64, "Decision timed out");
            metrics::counter!("api.timeouts").increment(1);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "decision_timeout".to_string(),
                    message: "Decision exceeded its time budget".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /impression — accept a post-playback impression event. The
/// 200 acknowledges queueing, not durable persistence.
pub async fn handle_impression<C: DecisionCache + 'static>(
    State(state): State<AppState<C>>,
    payload: Result<Json<ImpressionEvent>, JsonRejection>,
) -> Response {
    let Json(event) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            metrics::counter!("api.validation_errors").increment(1);
            return bad_request("invalid_impression", rejection.body_text());
        }
    };

    if let Err(msg) = validate_impression(&event) {
        warn!(ad_id = %event.ad_id, error = msg, "Impression validation failed");
        metrics::counter!("api.validation_errors").increment(1);
        return bad_request("invalid_impression", msg.to_string());
    }

    state.recorder.record(event);

    (
        StatusCode::OK,
        Json(StatusResponse {
            status: "success".to_string(),
        }),
    )
        .into_response()
}

/// GET /health — liveness only, no cache dependency.
pub async fn health_check<C>(State(state): State<AppState<C>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — readiness probe for Kubernetes.
pub async fn readiness<C>(State(state): State<AppState<C>>) -> StatusCode {
    if state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — liveness probe for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
