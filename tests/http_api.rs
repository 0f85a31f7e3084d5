//! HTTP surface tests against the in-process router, mock engine active.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

use scangate::api::{build_router, AppState};
use scangate::drivers::mock::eicar_pattern;
use scangate::{Config, DetectionCache, DriverConfig, EngineKind, Metrics, Scanner};

fn test_config(upload_dir: &Path, active_engine: EngineKind, max_file_size: u64) -> Config {
    Config {
        port: 3000,
        upload_dir: upload_dir.to_path_buf(),
        max_file_size,
        active_engine,
        log_level: "debug".to_string(),
        clamav: DriverConfig::for_engine(EngineKind::ClamAv),
        trendmicro: DriverConfig::for_engine(EngineKind::TrendMicro),
        mock: DriverConfig::for_engine(EngineKind::Mock),
    }
}

fn mock_app(dir: &TempDir) -> Router {
    let config = Arc::new(test_config(dir.path(), EngineKind::Mock, 10 * 1024 * 1024));
    let cache = DetectionCache::with_defaults();
    let scanner = Arc::new(Scanner::new(Arc::clone(&config), cache));
    build_router(AppState {
        scanner,
        config,
        metrics: Arc::new(Metrics::new()),
    })
}

const BOUNDARY: &str = "scangate-test-boundary";

fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn scan_request(field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/scan")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, file_name, content)))
        .unwrap()
}

async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn scan_clean_file_returns_clean() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let response = app
        .clone()
        .oneshot(scan_request("file", "clean.txt", b"clean test content"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "clean");
    assert_eq!(body["engine"], "mock");
    assert_eq!(body["fileName"], "clean.txt");
    assert!(body.get("signature").is_none());
    assert!(body["fileId"].as_str().unwrap().len() > 10);
    assert!(body["duration"].is_i64());
}

#[tokio::test]
async fn scan_eicar_file_returns_infected() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let response = app
        .clone()
        .oneshot(scan_request("file", "eicar.com", &eicar_pattern()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "infected");
    assert_eq!(body["engine"], "mock");
    assert_eq!(body["signature"], "EICAR-Test-File");
}

#[tokio::test]
async fn scan_leaves_upload_dir_empty() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let response = app
        .clone()
        .oneshot(scan_request("file", "a.bin", b"some content"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let leftover: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftover.is_empty(), "scan directory should be empty");
}

#[tokio::test]
async fn scan_without_file_field_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let response = app
        .clone()
        .oneshot(scan_request("attachment", "a.bin", b"content"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("'file' field"));
}

#[tokio::test]
async fn scan_oversize_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), EngineKind::Mock, 16));
    let cache = DetectionCache::with_defaults();
    let scanner = Arc::new(Scanner::new(Arc::clone(&config), cache));
    let app = build_router(AppState {
        scanner,
        config,
        metrics: Arc::new(Metrics::new()),
    });

    let response = app
        .clone()
        .oneshot(scan_request("file", "big.bin", &[0u8; 64]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn live_is_always_ok() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let (status, body) = get(&app, "/api/v1/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alive"], true);
}

#[tokio::test]
async fn ready_with_mock_engine() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let (status, body) = get(&app, "/api/v1/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn ready_reports_unhealthy_active_engine() {
    let dir = TempDir::new().unwrap();
    // ClamAV active with a nonexistent log path: not ready.
    let mut config = test_config(dir.path(), EngineKind::ClamAv, 1024);
    config.clamav = config
        .clamav
        .with_rts_log_path(dir.path().join("missing.log"));
    let config = Arc::new(config);
    let cache = DetectionCache::with_defaults();
    let scanner = Arc::new(Scanner::new(Arc::clone(&config), cache));
    let app = build_router(AppState {
        scanner,
        config,
        metrics: Arc::new(Metrics::new()),
    });

    let (status, body) = get(&app, "/api/v1/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
    assert!(body["error"].as_str().unwrap().contains("missing.log"));
}

#[tokio::test]
async fn health_lists_every_engine() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let (status, body) = get(&app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["activeEngine"], "mock");
    assert_eq!(body["engines"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn engines_lists_capabilities() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let (status, body) = get(&app, "/api/v1/engines").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activeEngine"], "mock");

    let engines = body["engines"].as_array().unwrap();
    assert_eq!(engines.len(), 3);
    let mock = engines
        .iter()
        .find(|engine| engine["engine"] == "mock")
        .unwrap();
    assert_eq!(mock["active"], true);
    assert_eq!(mock["rtsEnabled"], false);
    assert_eq!(mock["manualScanAvailable"], true);
}

#[tokio::test]
async fn version_reports_package_version() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let (status, body) = get(&app, "/api/v1/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn metrics_expose_scan_and_http_counters() {
    let dir = TempDir::new().unwrap();
    let app = mock_app(&dir);

    let response = app
        .clone()
        .oneshot(scan_request("file", "clean.txt", b"clean test content"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = String::from_utf8(
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec(),
    )
    .unwrap();
    assert!(text.contains("av_scans_total{engine=\"mock\",result=\"clean\"} 1"));
    assert!(text.contains("av_http_requests_total{method=\"POST\",endpoint=\"/api/v1/scan\",status_code=\"200\"} 1"));
}
