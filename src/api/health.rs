//! Health, readiness, liveness, engine, and version endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::api::AppState;

/// `GET /api/v1/health`: 200 when the active engine is healthy, 503
/// otherwise. The body lists every engine.
pub async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let engines = state.scanner.check_health().await;
    let active = state.scanner.active_engine();

    let active_healthy = engines
        .iter()
        .find(|health| health.engine == active)
        .map(|health| health.healthy)
        .unwrap_or(false);

    let (status, status_text) = if active_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status,
        Json(json!({
            "status": status_text,
            "activeEngine": active,
            "engines": engines,
        })),
    )
}

/// `GET /api/v1/engines`: static descriptors of every engine plus the
/// active one.
pub async fn handle_engines(State(state): State<AppState>) -> Json<Value> {
    let active = state.scanner.active_engine();
    let engines: Vec<Value> = state
        .scanner
        .engine_info()
        .into_iter()
        .map(|info| {
            json!({
                "engine": info.engine,
                "available": info.available,
                "rtsEnabled": info.rts_enabled,
                "manualScanAvailable": info.manual_scan_available,
                "active": info.engine == active,
            })
        })
        .collect();

    Json(json!({
        "activeEngine": active,
        "engines": engines,
    }))
}

/// `GET /api/v1/ready`: readiness of the active engine.
pub async fn handle_ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let health = state.scanner.active_engine_health().await;
    if health.healthy {
        (StatusCode::OK, Json(json!({ "ready": true })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "ready": false,
                "error": health.error.unwrap_or_else(|| "unknown error".to_string()),
            })),
        )
    }
}

/// `GET /api/v1/live`: unconditionally 200 while the listener is open.
pub async fn handle_live() -> Json<Value> {
    Json(json!({ "alive": true }))
}

/// `GET /api/v1/version`: the package version.
pub async fn handle_version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}
