//! REST API for the signage backend
//!
//! Thin route layer over the persistence core: every mutating handler goes
//! through the store's transaction primitive, every read-only handler
//! through `load`. Responses use the `{success, message, data}` envelope
//! the admin dashboard and the device client both consume.

pub mod assignments;
pub mod auth;
pub mod content;
pub mod device;
pub mod device_auth;
pub mod folders;
pub mod franchises;
pub mod health;

use crate::otp::OtpService;
use crate::sms::SmsSender;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fos_common::db::store::DocumentStore;
use fos_common::Error;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub otp: Arc<OtpService>,
    pub api_key: Arc<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<DocumentStore>, sms: Arc<dyn SmsSender>, api_key: String) -> Self {
        let otp = Arc::new(OtpService::new(Arc::clone(&store), sms));
        Self {
            store,
            otp,
            api_key: Arc::new(api_key),
            started_at: Instant::now(),
        }
    }
}

/// Create the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/franchises", franchises::router())
        .nest("/api/content", content::router())
        .nest("/api/folders", folders::router())
        .nest("/api/assignments", assignments::router())
        // Device-facing endpoints
        .route("/api/heartbeat", post(device::heartbeat))
        .route("/api/playlist", get(device::playlist))
        .route("/api/device/info", get(device::info))
        .route("/api/device/report", post(device::report))
        .nest("/api/auth/device", device_auth::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error wrapper translating the core taxonomy into HTTP responses
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::StoreBusy => StatusCode::SERVICE_UNAVAILABLE,
            Error::Unauthorized(_)
            | Error::OtpExpired
            | Error::OtpExhausted
            | Error::OtpMismatch { .. } => StatusCode::UNAUTHORIZED,
            Error::DispatchFailed(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "success": false,
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Convenience result type for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Success envelope
pub(crate) fn ok<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "data": data,
    }))
}

/// Success envelope with 201 Created
pub(crate) fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, ok(data, message))
}

/// Externally-reachable base URL of the requesting connection, for
/// rewriting content URLs. Honors a reverse proxy's forwarded scheme.
pub(crate) fn request_base_url(headers: &HeaderMap) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{}://{}", proto, host)
}
