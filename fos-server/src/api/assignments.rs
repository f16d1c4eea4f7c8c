//! Assignment routes
//!
//! Request bodies accept both item encodings (legacy bare content ids and
//! tagged `{type, id}` objects) because old dashboards still send the
//! former; deserialization normalizes them and every write persists the
//! tagged form only.

use crate::api::auth::AdminAuth;
use crate::api::{ok, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fos_common::db::models::{AssignmentItem, Document, ItemKind, PlaybackOrder};
use fos_common::db::store::Commit;
use fos_common::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(set).get(list))
        .route("/:device_id", get(get_one).delete(clear))
        .route("/:device_id/add", post(add))
        .route("/:device_id/remove", post(remove))
}

/// Does this item still point at something that exists?
fn item_exists(doc: &Document, item: &AssignmentItem) -> bool {
    match item.kind {
        ItemKind::Content => doc.content_by_id(&item.id).is_some(),
        ItemKind::Folder => doc.folder_by_id(&item.id).is_some(),
    }
}

/// Enrich an item with its target's display fields, `None` if dangling
fn enrich_item(doc: &Document, item: &AssignmentItem) -> Option<Value> {
    match item.kind {
        ItemKind::Folder => doc.folder_by_id(&item.id).map(|folder| {
            json!({
                "type": "folder",
                "id": item.id,
                "name": folder.name,
                "childCount": folder.content_ids.len(),
            })
        }),
        ItemKind::Content => doc.content_by_id(&item.id).map(|content| {
            json!({
                "type": "content",
                "id": item.id,
                "name": content.name,
                "contentType": content.content_type,
            })
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetRequest {
    device_id: String,
    items: Vec<AssignmentItem>,
    playback_order: Option<PlaybackOrder>,
}

/// POST /api/assignments - replace a device's assignment list (ADMIN)
async fn set(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Json(body): Json<SetRequest>,
) -> ApiResult<Json<Value>> {
    let result = state
        .store
        .transact_retry(|doc| {
            let franchise = doc
                .franchises
                .iter_mut()
                .find(|f| f.device_id == body.device_id)
                .ok_or_else(|| Error::NotFound("Partner not found".into()))?;

            if let Some(order) = body.playback_order {
                franchise.playback_order = order;
            }
            let playback_order = franchise.playback_order;

            let (valid, invalid): (Vec<AssignmentItem>, Vec<AssignmentItem>) = body
                .items
                .iter()
                .cloned()
                .partition(|item| item_exists(doc, item));

            if !invalid.is_empty() {
                warn!(
                    "Ignoring {} assignment items with unknown targets for {}",
                    invalid.len(),
                    body.device_id
                );
            }

            let count = valid.len();
            doc.assignments.insert(body.device_id.clone(), valid.clone());

            let mut data = json!({
                "deviceId": body.device_id,
                "assignedItems": valid,
                "playbackOrder": playback_order,
            });
            if !invalid.is_empty() {
                data["invalidItems"] = json!(invalid);
            }

            Ok(Commit::value(data).with_audit(
                "UPDATE_ASSIGNMENTS",
                json!({ "deviceId": body.device_id, "count": count }),
            ))
        })
        .await?;

    Ok(ok(result, "Assignments updated successfully"))
}

/// GET /api/assignments - all assignments, enriched (ADMIN)
async fn list(State(state): State<AppState>, _auth: AdminAuth) -> ApiResult<Json<Value>> {
    let doc = state.store.load()?;

    let enriched: Vec<Value> = doc
        .assignments
        .iter()
        .map(|(device_id, items)| {
            let franchise = doc.franchise_by_device(device_id).map(|f| {
                json!({
                    "id": f.id,
                    "name": f.name,
                    "location": f.location,
                    "playbackOrder": f.playback_order,
                })
            });
            let enriched_items: Vec<Value> = items
                .iter()
                .filter_map(|item| enrich_item(&doc, item))
                .collect();
            json!({
                "deviceId": device_id,
                "franchise": franchise,
                "itemCount": enriched_items.len(),
                "items": enriched_items,
            })
        })
        .collect();

    Ok(ok(enriched, "OK"))
}

/// GET /api/assignments/:device_id (ADMIN)
async fn get_one(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let doc = state.store.load()?;

    let franchise = doc
        .franchise_by_device(&device_id)
        .ok_or_else(|| Error::NotFound("Partner not found".into()))?;

    let items = doc
        .assignments
        .get(&device_id)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let enriched_items: Vec<Value> = items
        .iter()
        .filter_map(|item| enrich_item(&doc, item))
        .collect();

    Ok(ok(
        json!({
            "deviceId": device_id,
            "franchise": {
                "id": franchise.id,
                "name": franchise.name,
                "location": franchise.location,
                "playbackOrder": franchise.playback_order,
            },
            "assignments": enriched_items,
        }),
        "OK",
    ))
}

/// DELETE /api/assignments/:device_id - clear the device's list (ADMIN)
async fn clear(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .store
        .transact_retry(|doc| {
            if doc.franchise_by_device(&device_id).is_none() {
                return Err(Error::NotFound("Partner not found".into()));
            }

            let previous = doc
                .assignments
                .insert(device_id.clone(), Vec::new())
                .map(|items| items.len())
                .unwrap_or(0);

            Ok(Commit::value(()).with_audit(
                "CLEAR_ASSIGNMENTS",
                json!({ "deviceId": device_id, "previousCount": previous }),
            ))
        })
        .await?;

    Ok(ok(Value::Null, "Assignments cleared successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentIdsRequest {
    content_ids: Vec<String>,
}

/// POST /api/assignments/:device_id/add - append content items (ADMIN)
async fn add(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(device_id): Path<String>,
    Json(body): Json<ContentIdsRequest>,
) -> ApiResult<Json<Value>> {
    let result = state
        .store
        .transact_retry(|doc| {
            if doc.franchise_by_device(&device_id).is_none() {
                return Err(Error::NotFound("Partner not found".into()));
            }

            let assigned: Vec<String> = doc
                .assignments
                .get(&device_id)
                .map(|items| {
                    items
                        .iter()
                        .filter(|item| item.kind == ItemKind::Content)
                        .map(|item| item.id.clone())
                        .collect()
                })
                .unwrap_or_default();

            // Known content only, skipping already-assigned and in-request
            // duplicates
            let mut seen = assigned;
            let mut to_add: Vec<String> = Vec::new();
            for id in body.content_ids.iter() {
                if doc.content.iter().any(|c| &c.id == id) && !seen.contains(id) {
                    seen.push(id.clone());
                    to_add.push(id.clone());
                }
            }

            let added = to_add.len();
            let items = doc.assignments.entry(device_id.clone()).or_default();
            items.extend(to_add.into_iter().map(AssignmentItem::content));
            let total = items.len();
            Ok(Commit::value(json!({
                "deviceId": device_id,
                "added": added,
                "total": total,
            }))
            .with_audit(
                "ADD_ASSIGNMENTS",
                json!({ "deviceId": device_id, "added": added }),
            ))
        })
        .await?;

    Ok(ok(result, "Content added to assignments"))
}

/// POST /api/assignments/:device_id/remove - drop content items (ADMIN)
async fn remove(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(device_id): Path<String>,
    Json(body): Json<ContentIdsRequest>,
) -> ApiResult<Json<Value>> {
    let result = state
        .store
        .transact_retry(|doc| {
            if doc.franchise_by_device(&device_id).is_none() {
                return Err(Error::NotFound("Partner not found".into()));
            }

            let items = doc.assignments.entry(device_id.clone()).or_default();
            let before = items.len();
            items.retain(|item| {
                !(item.kind == ItemKind::Content && body.content_ids.contains(&item.id))
            });
            let removed = before - items.len();
            let total = items.len();

            Ok(Commit::value(json!({
                "deviceId": device_id,
                "removed": removed,
                "total": total,
            }))
            .with_audit(
                "REMOVE_ASSIGNMENTS",
                json!({ "deviceId": device_id, "removed": removed }),
            ))
        })
        .await?;

    Ok(ok(result, "Content removed from assignments"))
}
