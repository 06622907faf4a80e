//! REST API handlers for the operator dashboard

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::executor::OperatorCommand;
use super::server::AppState;
use crate::storage::StorageError;

/// Template label used when an upload names none
pub const DEFAULT_UPLOAD_LABEL: &str = "uploaded";

/// Largest asset accepted by an upload
pub const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct TemplateParams {
    pub name: Option<String>,
}

/// Query of an asset upload. `backup=on` keeps the previous version.
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub description: Option<String>,
    pub backup: Option<String>,
}

impl UploadParams {
    pub fn wants_backup(&self) -> bool {
        self.backup.as_deref() == Some("on")
    }
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/topology", get(get_topology))
        .route("/api/execute", post(execute_command))
        .route("/api/template", get(download_template).post(upload_template))
        .route("/api/files", get(list_files))
        .route(
            "/api/files/{name}",
            get(download_file)
                .post(upload_file)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}

async fn get_topology(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.hub.view().await))
}

/// Run an operator command and answer with the resulting topology
async fn execute_command(
    State(state): State<AppState>,
    Json(request): Json<Value>,
) -> impl IntoResponse {
    if let Some(command) = OperatorCommand::from_value(request) {
        state.hub.execute(command).await;
    }
    Json(ApiResponse::success(state.hub.view().await))
}

async fn download_template(State(state): State<AppState>) -> impl IntoResponse {
    let text = state.hub.export_template().await;
    let filename = format!("xht_{}.txt", Utc::now().format("%Y%m%d_%H%M%S"));

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        text,
    )
}

async fn upload_template(
    State(state): State<AppState>,
    Query(params): Query<TemplateParams>,
    body: String,
) -> impl IntoResponse {
    let label = params
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_UPLOAD_LABEL.to_string());

    let summary = state.hub.import_template(&label, &body).await;
    Json(ApiResponse::success(summary))
}

async fn list_files(State(state): State<AppState>) -> Response {
    match state.hub.files().await {
        Ok(files) => (StatusCode::OK, Json(ApiResponse::success(files))).into_response(),
        Err(e) => storage_error(e, "Failed to list files"),
    }
}

async fn upload_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Response {
    let uploaded = state
        .hub
        .upload_file(
            &name,
            &body,
            params.description.as_deref(),
            params.wants_backup(),
        )
        .await;

    match uploaded {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::success(outcome))).into_response(),
        Err(e) => storage_error(e, "Failed to store file"),
    }
}

async fn download_file(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.hub.download_file(&name) {
        Ok(Some(contents)) => (
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{name}\""),
                ),
            ],
            contents,
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("File not found: {name}"))),
        )
            .into_response(),
        Err(e) => storage_error(e, "Failed to read file"),
    }
}

fn storage_error(error: StorageError, message: &str) -> Response {
    match error {
        StorageError::InvalidName(name) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!("Invalid file name: {name:?}"))),
        )
            .into_response(),
        e => {
            tracing::warn!(error = %e, "{message}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(message)),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Priority, Topology, TopologyView};

    #[test]
    fn test_topology_envelope_shape() {
        let now = Utc::now();
        let mut topology = Topology::new("prod");
        topology.upsert_node("10.0.0.5", now).heartbeat(now);
        topology.upsert_server("10.0.0.5", ":9000", now).unwrap().heartbeat(now);
        topology.add_domain("api.test");
        topology.assign("api.test", "10.0.0.5", ":9000", Priority::Primary);

        let json = serde_json::to_value(ApiResponse::success(TopologyView::from(&topology))).unwrap();

        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["data"]["template"], "prod");
        assert_eq!(json["data"]["domains"][0]["assignments"][0]["ip"], "10.0.0.5");
        assert_eq!(json["data"]["domains"][0]["assignments"][0]["priority"], "primary");
    }

    #[test]
    fn test_upload_params_backup_flag() {
        let params: UploadParams = serde_json::from_value(serde_json::json!({"backup": "on"})).unwrap();
        assert!(params.wants_backup());
        assert!(!UploadParams::default().wants_backup());
    }

    #[test]
    fn test_error_envelope_has_no_data() {
        let json = serde_json::to_value(ErrorResponse::new("File not found: a.jar")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "File not found: a.jar"}));
    }
}
