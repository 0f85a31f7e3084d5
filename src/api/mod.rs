//! HTTP ingress.
//!
//! Builds the axum router exposing the scan endpoint, the health probes,
//! the engine listing, and the Prometheus metrics exposition. Every
//! request passes through a logging-and-metrics middleware.

pub mod health;
pub mod scan;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::scanner::Scanner;

/// Headroom on top of `max_file_size` for multipart framing.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The scan orchestrator.
    pub scanner: Arc<Scanner>,
    /// Service configuration.
    pub config: Arc<Config>,
    /// Request and scan counters.
    pub metrics: Arc<Metrics>,
}

/// Builds the service router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size as usize + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/v1/scan", post(scan::handle_scan))
        .route("/api/v1/health", get(health::handle_health))
        .route("/api/v1/engines", get(health::handle_engines))
        .route("/api/v1/ready", get(health::handle_ready))
        .route("/api/v1/live", get(health::handle_live))
        .route("/api/v1/version", get(health::handle_version))
        .route("/metrics", get(handle_metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .with_state(state)
}

/// Error response carrying an HTTP status and a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// 413 Payload Too Large.
    pub fn too_large(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: message.into(),
        }
    }

    /// 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

async fn record_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration = started.elapsed();
    if path != "/metrics" {
        state.metrics.record_http(&method, &path, status, duration);
    }
    tracing::info!(
        method = %method,
        path = %path,
        status = status,
        duration = duration.as_millis() as u64,
        "Request completed"
    );

    response
}
