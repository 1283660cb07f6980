//! Web server module for powerscope.
//!
//! Serves the OpenMetrics exposition endpoint and health checks.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use serde::Serialize;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::sampler::{SamplerHandle, SamplerStatus};

/// Content type of the OpenMetrics text format.
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    /// `None` when the sampler is disabled.
    pub sampler: Option<SamplerHandle>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sampler: Option<String>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(app_state)
}

/// Scrape endpoint. Reads the latest samples without waiting on the sampler.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Liveness check.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sampler: None,
    })
}

/// Readiness check that reports whether the sampler is still reading.
///
/// A stopped sampler still serves its last values, but is reported as not
/// ready so that the stall is visible.
async fn readyz_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(handle) = &state.sampler else {
        return Json(HealthResponse {
            status: "ok".to_string(),
            sampler: Some("disabled".to_string()),
        })
        .into_response();
    };

    match handle.status() {
        SamplerStatus::Running => Json(HealthResponse {
            status: "ok".to_string(),
            sampler: Some("running".to_string()),
        })
        .into_response(),
        SamplerStatus::Stopped(exit) => {
            tracing::debug!(%exit, "Readiness check: sampler stopped");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "not_ready".to_string(),
                    sampler: Some(format!("stopped: {}", exit)),
                }),
            )
                .into_response()
        }
    }
}
