//! Health check endpoint

use crate::api::{ok, ApiResult, AppState};
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

/// GET /api/health - public liveness probe
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let doc = state.store.load()?;
    Ok(ok(
        json!({
            "status": "healthy",
            "version": doc.metadata.version,
            "uptime": state.started_at.elapsed().as_secs(),
            "timestamp": Utc::now(),
            "database": "connected",
        }),
        "OK",
    ))
}
