//! Folder routes

use crate::api::auth::AdminAuth;
use crate::api::{created, ok, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use fos_common::db::models::{Folder, ItemKind};
use fos_common::db::store::Commit;
use fos_common::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", put(update).delete(delete_one))
}

/// GET /api/folders (ADMIN)
async fn list(State(state): State<AppState>, _auth: AdminAuth) -> ApiResult<Json<Value>> {
    let doc = state.store.load()?;
    Ok(ok(doc.folders, "OK"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    name: String,
    #[serde(default)]
    content_ids: Vec<String>,
}

/// POST /api/folders (ADMIN)
async fn create(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Json(body): Json<CreateRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::InvalidInput("Folder name is required".into()).into());
    }

    let folder = state
        .store
        .transact_retry(|doc| {
            let folder = Folder {
                id: Uuid::new_v4().to_string(),
                name: name.clone(),
                content_ids: body.content_ids.clone(),
                created_at: Utc::now(),
                updated_at: Some(Utc::now()),
            };
            doc.folders.push(folder.clone());

            Ok(Commit::value(folder.clone())
                .with_audit("CREATE_FOLDER", json!({ "id": folder.id, "name": name })))
        })
        .await?;

    Ok(created(folder, "Folder created successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    name: Option<String>,
    content_ids: Option<Vec<String>>,
}

/// PUT /api/folders/:id - rename or replace members (ADMIN)
async fn update(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> ApiResult<Json<Value>> {
    let folder = state
        .store
        .transact_retry(|doc| {
            let folder = doc
                .folders
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or_else(|| Error::NotFound("Folder not found".into()))?;

            if let Some(name) = &body.name {
                let trimmed = name.trim();
                if !trimmed.is_empty() {
                    folder.name = trimmed.to_string();
                }
            }
            if let Some(content_ids) = &body.content_ids {
                folder.content_ids = content_ids.clone();
            }
            folder.updated_at = Some(Utc::now());

            Ok(Commit::value(folder.clone())
                .with_audit("UPDATE_FOLDER", json!({ "id": id, "name": body.name })))
        })
        .await?;

    Ok(ok(folder, "Folder updated successfully"))
}

/// DELETE /api/folders/:id - delete and scrub assignment references (ADMIN)
async fn delete_one(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .store
        .transact_retry(|doc| {
            let idx = doc
                .folders
                .iter()
                .position(|f| f.id == id)
                .ok_or_else(|| Error::NotFound("Folder not found".into()))?;

            let removed = doc.folders.remove(idx);

            for items in doc.assignments.values_mut() {
                items.retain(|item| !(item.kind == ItemKind::Folder && item.id == id));
            }

            Ok(Commit::value(()).with_audit(
                "DELETE_FOLDER",
                json!({ "id": id, "name": removed.name }),
            ))
        })
        .await?;

    Ok(ok(Value::Null, "Folder deleted successfully"))
}
