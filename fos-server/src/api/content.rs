//! Content metadata routes
//!
//! File bytes live with the external upload/storage layer; this surface
//! registers and maintains the metadata records the resolver serves.

use crate::api::auth::AdminAuth;
use crate::api::{created, ok, request_base_url, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use fos_common::db::models::{Content, ContentType, ItemKind};
use fos_common::db::store::Commit;
use fos_common::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(get_one).put(update).delete(delete_one))
}

/// Strip characters that don't belong in a display name
fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    name: Option<String>,
    filename: String,
    mime_type: String,
    size: u64,
    duration: Option<u32>,
    url: Option<String>,
}

/// POST /api/content - register uploaded media metadata (ADMIN)
async fn create(
    State(state): State<AppState>,
    _auth: AdminAuth,
    headers: HeaderMap,
    Json(body): Json<CreateRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if body.filename.trim().is_empty() {
        return Err(Error::InvalidInput("filename is required".into()).into());
    }

    let base_url = request_base_url(&headers);
    let display_name = body
        .name
        .as_deref()
        .map(sanitize_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| body.filename.clone());

    let record = Content {
        id: Uuid::new_v4().to_string(),
        name: display_name.clone(),
        filename: body.filename.clone(),
        content_type: ContentType::from_mime(&body.mime_type),
        mime_type: body.mime_type.clone(),
        size: body.size,
        url: body
            .url
            .clone()
            .unwrap_or_else(|| format!("{}/content/{}", base_url, body.filename)),
        duration: body.duration.unwrap_or(10),
        upload_date: Utc::now(),
        updated_at: None,
    };

    let stored = state
        .store
        .transact_retry(|doc| {
            doc.content.push(record.clone());
            Ok(Commit::value(record.clone()).with_audit(
                "UPLOAD_CONTENT",
                json!({ "name": display_name, "file": body.filename }),
            ))
        })
        .await?;

    Ok(created(stored, "Content registered successfully"))
}

/// GET /api/content (ADMIN)
async fn list(State(state): State<AppState>, _auth: AdminAuth) -> ApiResult<Json<Value>> {
    let doc = state.store.load()?;
    Ok(ok(doc.content, "OK"))
}

/// GET /api/content/:id (ADMIN)
async fn get_one(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let doc = state.store.load()?;
    let content = doc
        .content_by_id(&id)
        .ok_or_else(|| Error::NotFound("Content not found".into()))?;
    Ok(ok(content, "OK"))
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    name: Option<String>,
    duration: Option<u32>,
}

/// PUT /api/content/:id - update metadata (ADMIN)
async fn update(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> ApiResult<Json<Value>> {
    let updated = state
        .store
        .transact_retry(|doc| {
            let content = doc
                .content
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| Error::NotFound("Content not found".into()))?;

            if let Some(name) = &body.name {
                let sanitized = sanitize_name(name);
                if !sanitized.is_empty() {
                    content.name = sanitized;
                }
            }
            if let Some(duration) = body.duration {
                content.duration = duration;
            }
            content.updated_at = Some(Utc::now());

            Ok(Commit::value(content.clone()).with_audit(
                "UPDATE_CONTENT",
                json!({ "id": id, "name": body.name, "duration": body.duration }),
            ))
        })
        .await?;

    Ok(ok(updated, "Content updated successfully"))
}

/// DELETE /api/content/:id - delete and scrub references (ADMIN)
async fn delete_one(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .store
        .transact_retry(|doc| {
            let idx = doc
                .content
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| Error::NotFound("Content not found".into()))?;

            let removed = doc.content.remove(idx);

            // Scrub the id from every assignment list and folder. Old
            // backups can still resurrect dangling refs; the resolver
            // filters those at read time.
            for items in doc.assignments.values_mut() {
                items.retain(|item| !(item.kind == ItemKind::Content && item.id == id));
            }
            for folder in &mut doc.folders {
                folder.content_ids.retain(|cid| cid != &id);
            }

            Ok(Commit::value(()).with_audit(
                "DELETE_CONTENT",
                json!({ "id": id, "filename": removed.filename }),
            ))
        })
        .await?;

    Ok(ok(Value::Null, "Content deleted successfully"))
}
