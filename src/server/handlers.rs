use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{ErrorResponse, TranslateResponse, UploadRequest, UploadResponse};
use super::state::ServerState;
use crate::improvement::{self, ImprovementError};
use crate::session::{SelectedFile, SessionError};
use crate::types::{ImprovementFeedback, ImprovementRequest, TranslationResult, UploadItem};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/uploads", get(list_uploads).post(add_uploads))
        .route("/uploads/:id", delete(remove_upload))
        .route("/translate", post(translate))
        .route("/results", get(results))
        .route("/report", get(report))
        .route("/improve", post(improve))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

pub async fn run_server(state: Arc<ServerState>, addr: String) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,DELETE,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
    headers.insert(
        "access-control-expose-headers",
        HeaderValue::from_static("content-disposition,x-font-warnings"),
    );
}

async fn list_uploads(State(state): State<Arc<ServerState>>) -> Json<Vec<UploadItem>> {
    let session = state.session.lock().await;
    Json(session.pending().to_vec())
}

async fn add_uploads(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    if payload.files.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "files is required"));
    }
    let mut rejected = Vec::new();
    let mut files = Vec::with_capacity(payload.files.len());
    for file in payload.files {
        match BASE64.decode(file.data_base64.trim()) {
            Ok(bytes) => files.push(SelectedFile::from_bytes(file.name, bytes)),
            Err(err) => {
                warn!("invalid base64 for '{}': {}", file.name, err);
                rejected.push(file.name);
            }
        }
    }

    let mut session = state.session.lock().await;
    let report = session.add_files(files).await;
    rejected.extend(report.rejected);
    Ok(Json(UploadResponse {
        pending: session.pending().to_vec(),
        duplicates: report.duplicates,
        rejected,
    }))
}

async fn remove_upload(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> StatusCode {
    state.session.lock().await.remove(&id);
    StatusCode::NO_CONTENT
}

fn session_error(err: SessionError) -> ApiError {
    let status = match err {
        SessionError::NoFilesSelected | SessionError::NoTranslations => StatusCode::BAD_REQUEST,
        SessionError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, err.to_string())
}

async fn translate(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let mut session = state.session.lock().await;
    let report = session
        .submit_all(state.oracle.as_ref())
        .await
        .map_err(session_error)?;
    Ok(Json(TranslateResponse {
        success: report.success(),
        failures: report.failures,
        results: report.results,
    }))
}

async fn results(State(state): State<Arc<ServerState>>) -> Json<Vec<TranslationResult>> {
    let session = state.session.lock().await;
    Json(session.results().to_vec())
}

async fn report(State(state): State<Arc<ServerState>>) -> Result<Response<Body>, ApiError> {
    let session = state.session.lock().await;
    let composed = session
        .compose_report(&state.composer)
        .await
        .map_err(session_error)?;
    drop(session);

    let disposition = format!("attachment; filename=\"{}\"", composed.file_name);
    let warnings = composed
        .warnings
        .iter()
        .map(|warning| warning.face)
        .collect::<Vec<_>>()
        .join(",");
    let mut response = Response::new(Body::from(composed.bytes));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if !warnings.is_empty()
        && let Ok(value) = HeaderValue::from_str(&warnings)
    {
        headers.insert("x-font-warnings", value);
    }
    Ok(response)
}

async fn improve(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<ImprovementRequest>,
) -> Result<Json<ImprovementFeedback>, ApiError> {
    improvement::submit_improvement(state.oracle.as_ref(), &payload)
        .await
        .map(Json)
        .map_err(|err| match err {
            ImprovementError::Invalid(_) => api_error(StatusCode::BAD_REQUEST, err.to_string()),
            ImprovementError::Submission(_) => api_error(StatusCode::BAD_GATEWAY, err.to_string()),
        })
}
