//! Franchise (partner device) routes
//!
//! Bearer tokens are returned in plaintext exactly twice: at registration
//! and at regeneration. Every other read masks them.

use crate::api::auth::AdminAuth;
use crate::api::{created, ok, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use fos_common::db::models::{Franchise, FranchiseStatus, PlaybackOrder};
use fos_common::db::store::Commit;
use fos_common::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(get_one).put(update).delete(delete_one))
        .route("/:id/regenerate-token", post(regenerate_token))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    name: String,
    location: String,
    device_id: String,
}

/// POST /api/franchises - register a new franchise (ADMIN)
async fn create(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Json(body): Json<CreateRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if body.name.trim().is_empty() || body.device_id.trim().is_empty() {
        return Err(Error::InvalidInput("name and deviceId are required".into()).into());
    }

    let franchise = state
        .store
        .transact_retry(|doc| {
            if doc.franchise_by_device(&body.device_id).is_some() {
                return Err(Error::Conflict("Device ID already registered".into()));
            }

            let franchise = Franchise {
                id: Uuid::new_v4().to_string(),
                device_id: body.device_id.clone(),
                name: body.name.clone(),
                location: body.location.clone(),
                token: Uuid::new_v4().to_string(),
                phone: None,
                status: FranchiseStatus::Offline,
                last_sync: None,
                last_login: None,
                playback_order: PlaybackOrder::Sequential,
                auth_method: None,
                created_at: Utc::now(),
                updated_at: None,
            };
            doc.franchises.push(franchise.clone());

            Ok(Commit::value(franchise).with_audit(
                "REGISTER_FRANCHISE",
                json!({ "name": body.name, "deviceId": body.device_id }),
            ))
        })
        .await?;

    // The only time the token leaves in plaintext (besides regeneration)
    let mut data = serde_json::to_value(&franchise).map_err(fos_common::Error::from)?;
    data["message"] = json!("SAVE THE TOKEN - it cannot be retrieved again!");
    Ok(created(data, "Franchise registered successfully"))
}

/// GET /api/franchises - all franchises, tokens masked (ADMIN)
async fn list(State(state): State<AppState>, _auth: AdminAuth) -> ApiResult<Json<Value>> {
    let doc = state.store.load()?;
    let safe: Vec<Franchise> = doc.franchises.iter().map(Franchise::masked).collect();
    Ok(ok(safe, "OK"))
}

/// GET /api/franchises/:id (ADMIN)
async fn get_one(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let doc = state.store.load()?;
    let franchise = doc
        .franchises
        .iter()
        .find(|f| f.id == id)
        .ok_or_else(|| Error::NotFound("Franchise not found".into()))?;
    Ok(ok(franchise.masked(), "OK"))
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    name: Option<String>,
    location: Option<String>,
}

/// PUT /api/franchises/:id (ADMIN)
async fn update(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> ApiResult<Json<Value>> {
    let updated = state
        .store
        .transact_retry(|doc| {
            let franchise = doc
                .franchises
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or_else(|| Error::NotFound("Franchise not found".into()))?;

            if let Some(name) = &body.name {
                franchise.name = name.clone();
            }
            if let Some(location) = &body.location {
                franchise.location = location.clone();
            }
            franchise.updated_at = Some(Utc::now());

            Ok(Commit::value(franchise.masked()).with_audit(
                "UPDATE_FRANCHISE",
                json!({ "id": id, "name": body.name, "location": body.location }),
            ))
        })
        .await?;

    Ok(ok(updated, "Franchise updated successfully"))
}

/// DELETE /api/franchises/:id - also drops the device's assignments (ADMIN)
async fn delete_one(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .store
        .transact_retry(|doc| {
            let idx = doc
                .franchises
                .iter()
                .position(|f| f.id == id)
                .ok_or_else(|| Error::NotFound("Franchise not found".into()))?;

            let franchise = doc.franchises.remove(idx);
            doc.assignments.remove(&franchise.device_id);

            Ok(Commit::value(()).with_audit(
                "DELETE_FRANCHISE",
                json!({ "id": id, "deviceId": franchise.device_id }),
            ))
        })
        .await?;

    Ok(ok(Value::Null, "Franchise deleted successfully"))
}

/// POST /api/franchises/:id/regenerate-token (ADMIN)
async fn regenerate_token(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let token = state
        .store
        .transact_retry(|doc| {
            let franchise = doc
                .franchises
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or_else(|| Error::NotFound("Franchise not found".into()))?;

            franchise.token = Uuid::new_v4().to_string();

            Ok(Commit::value(franchise.token.clone())
                .with_audit("REGENERATE_TOKEN", json!({ "id": id })))
        })
        .await?;

    Ok(ok(
        json!({
            "token": token,
            "message": "SAVE THE NEW TOKEN - it cannot be retrieved again!",
        }),
        "Token regenerated successfully",
    ))
}
