//! HTTP API
//!
//! Thin axum layer over the submission and status services. Every response,
//! including errors and fallbacks, carries permissive CORS headers, and any
//! `OPTIONS` request is answered `200` with an empty body before routing.

use crate::error::{StatusError, StorageError, SubmitError};
use crate::status::StatusService;
use crate::store::{validate_key, BlobStore};
use crate::submission::{SubmissionService, SubmitRequest};
use crate::types::SessionStatus;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

const ALLOWED_METHODS: &str = "OPTIONS,POST,GET";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub submission: Arc<SubmissionService>,
    pub status: Arc<StatusService>,
    pub store: Arc<dyn BlobStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/status", get(status))
        .route("/artifacts/{key}", get(artifact))
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Answer preflights and stamp CORS headers on everything else.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    response
}

#[derive(Serialize)]
struct AcceptedBody {
    message: &'static str,
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn generate(State(state): State<AppState>, body: Bytes) -> Result<Response, SubmitError> {
    // An empty body reads as `{}` so it fails field validation, not parsing
    let request: SubmitRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SubmitRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| SubmitError::Validation(format!("Invalid request body: {}", e)))?
    };

    let accepted = state.submission.submit(request).await?;
    Ok(Json(AcceptedBody {
        message: "Request accepted",
        session_id: accepted.session_id,
    })
    .into_response())
}

#[derive(Deserialize)]
struct StatusQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl From<SessionStatus> for StatusBody {
    fn from(status: SessionStatus) -> Self {
        let label = status.as_str();
        match status {
            SessionStatus::Pending => Self {
                status: label,
                html: None,
                url: None,
            },
            SessionStatus::Ready { html } => Self {
                status: label,
                html: Some(html),
                url: None,
            },
            SessionStatus::ReadyAt { url } => Self {
                status: label,
                html: None,
                url: Some(url),
            },
        }
    }
}

async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusBody>, StatusError> {
    let session_id = query
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StatusError::Validation("Missing sessionId".to_string()))?;

    let status = state.status.resolve(&session_id).await?;
    Ok(Json(status.into()))
}

async fn artifact(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, StorageError> {
    // Only documents are served; sidecars and other names are not artifacts
    if !key.ends_with(".html") {
        return Err(StorageError::NotFound(key));
    }
    validate_key(&key)?;

    let artifact = state.store.get(&key).await?;
    let content_type = HeaderValue::from_str(&artifact.meta.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok(([(CONTENT_TYPE, content_type)], Body::from(artifact.body)).into_response())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        match self {
            SubmitError::Validation(message) => {
                error_response(StatusCode::BAD_REQUEST, &message)
            }
            SubmitError::Enqueue(e) => {
                error!(error = %e, "Enqueue failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to enqueue request")
            }
        }
    }
}

impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        match self {
            StatusError::Validation(message) => error_response(StatusCode::BAD_REQUEST, &message),
            StatusError::Store(e) => {
                error!(error = %e, "Error checking status");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error checking status")
            }
        }
    }
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        match self {
            StorageError::NotFound(_) | StorageError::InvalidKey(_) => {
                error_response(StatusCode::NOT_FOUND, "Artifact not found")
            }
            e => {
                error!(error = %e, "Error reading artifact");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error reading artifact")
            }
        }
    }
}
