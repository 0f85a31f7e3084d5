//! The scan endpoint.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use crate::api::{ApiError, AppState};
use crate::core::{EngineKind, ScanRequest, ScanResult, Verdict};

/// Response body of `POST /api/v1/scan`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReply {
    /// Identifier assigned to the upload.
    pub file_id: String,
    /// Original filename as sent by the client.
    pub file_name: String,
    /// Final verdict.
    pub status: Verdict,
    /// Engine that served the request.
    pub engine: EngineKind,
    /// Signature name, when one was reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Total request duration in milliseconds.
    pub duration: i64,
    /// The underlying driver result, when the on-demand path produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_result: Option<ScanResult>,
}

/// Accepts a multipart upload (field `file`), materializes it into the scan
/// directory, and runs the orchestrator. Infected files still return 200;
/// only orchestration failures produce a 500.
pub async fn handle_scan(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ScanReply>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("Invalid multipart form: {err}")))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|err| ApiError::bad_request(format!("Failed to read upload: {err}")))?;
            upload = Some((file_name, data));
            break;
        }
    }

    let Some((file_name, data)) = upload else {
        return Err(ApiError::bad_request(
            "No file provided. Please upload a file using the 'file' field",
        ));
    };

    if data.len() as u64 > state.config.max_file_size {
        return Err(ApiError::too_large(format!(
            "File size {} exceeds maximum {}",
            data.len(),
            state.config.max_file_size
        )));
    }

    let file_id = state.scanner.generate_file_id();
    let path = state.scanner.upload_path(&file_id, &file_name);

    if let Err(err) = tokio::fs::write(&path, &data).await {
        let _ = tokio::fs::remove_file(&path).await;
        tracing::error!(error = %err, file_id = %file_id, "Failed to save uploaded file");
        return Err(ApiError::internal("Failed to save uploaded file"));
    }

    tracing::info!(
        file_id = %file_id,
        original_name = %file_name,
        size = data.len(),
        "Received scan request"
    );

    let request = ScanRequest {
        file_id: file_id.clone(),
        path,
        original_name: file_name.clone(),
        size: data.len() as u64,
    };

    match state.scanner.scan(request).await {
        Ok(response) => {
            state.metrics.record_scan(response.engine, response.status);
            Ok(Json(ScanReply {
                file_id: response.file_id,
                file_name,
                status: response.status,
                engine: response.engine,
                signature: response.signature,
                duration: response.total_duration,
                scan_result: response.scan_result,
            }))
        }
        Err(err) => {
            tracing::error!(error = %err, file_id = %file_id, "Scan failed");
            state
                .metrics
                .record_scan(state.scanner.active_engine(), Verdict::Error);
            Err(ApiError::internal(err.to_string()))
        }
    }
}
