//! Device-facing routes (heartbeat, playlist, info, playback reports)

use crate::api::auth::DeviceAuth;
use crate::api::{ok, request_base_url, ApiResult, AppState};
use crate::playlist::resolve_playlist;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use fos_common::db::models::{AnalyticsEvent, FranchiseStatus};
use fos_common::db::store::Commit;
use fos_common::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// POST /api/heartbeat - device reports it is alive
pub async fn heartbeat(
    State(state): State<AppState>,
    DeviceAuth(franchise): DeviceAuth,
) -> ApiResult<Json<Value>> {
    let last_sync = state
        .store
        .transact_retry(|doc| {
            let record = doc
                .franchises
                .iter_mut()
                .find(|f| f.id == franchise.id)
                .ok_or_else(|| Error::NotFound("Partner not found during update".into()))?;

            record.status = FranchiseStatus::Online;
            record.last_sync = Some(Utc::now());

            Ok(Commit::value(record.last_sync))
        })
        .await?;

    info!("Heartbeat: {} - {}", franchise.device_id, franchise.name);
    Ok(ok(
        json!({
            "lastSync": last_sync,
            "deviceId": franchise.device_id,
        }),
        "Heartbeat received",
    ))
}

/// GET /api/playlist - the device's resolved playlist
///
/// The requesting connection's host feeds the URL rewrite, so content URLs
/// stay reachable wherever the server is currently addressed.
pub async fn playlist(
    State(state): State<AppState>,
    DeviceAuth(franchise): DeviceAuth,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let base_url = request_base_url(&headers);
    let doc = state.store.load()?;
    let resolved = resolve_playlist(&doc, &franchise.device_id, &base_url)?;
    Ok(ok(resolved, "OK"))
}

/// GET /api/device/info
pub async fn info(DeviceAuth(franchise): DeviceAuth) -> Json<Value> {
    ok(
        json!({
            "id": franchise.id,
            "name": franchise.name,
            "location": franchise.location,
            "deviceId": franchise.device_id,
            "status": franchise.status,
            "lastSync": franchise.last_sync,
        }),
        "OK",
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    content_id: String,
    action: String,
    timestamp: Option<DateTime<Utc>>,
    duration: Option<f64>,
}

/// POST /api/device/report - playback analytics, bounded append
pub async fn report(
    State(state): State<AppState>,
    DeviceAuth(franchise): DeviceAuth,
    Json(body): Json<ReportRequest>,
) -> ApiResult<Json<Value>> {
    info!(
        "Device report {}: {} - {}",
        franchise.device_id, body.action, body.content_id
    );

    state
        .store
        .transact_retry(|doc| {
            doc.push_analytics(AnalyticsEvent {
                device_id: franchise.device_id.clone(),
                franchise_id: franchise.id.clone(),
                content_id: body.content_id.clone(),
                action: body.action.clone(),
                timestamp: body.timestamp.unwrap_or_else(Utc::now),
                duration: body.duration,
            });
            Ok(Commit::value(()))
        })
        .await?;

    Ok(ok(Value::Null, "Report received"))
}
