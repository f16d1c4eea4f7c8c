//! Integration tests for the REST surface
//!
//! Drives the real router over a real store in a temp directory with
//! `tower::ServiceExt::oneshot`, covering authentication guards, the
//! franchise token lifecycle, assignment writes, and the device playlist
//! end to end (folder expansion + host rewrite).

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::{setup_app, TEST_API_KEY};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

/// Build a JSON request with optional admin/device auth headers
fn request(
    method: &str,
    uri: &str,
    body: Option<Value>,
    api_key: Option<&str>,
    device_token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    if let Some(token) = device_token {
        builder = builder.header("x-device-token", token);
    }
    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Register a franchise and return (id, deviceId, plaintext token)
async fn register_franchise(app: &axum::Router, device_id: &str) -> (String, String, String) {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/franchises",
            Some(json!({
                "name": format!("Store {}", device_id),
                "location": "Pune",
                "deviceId": device_id,
            })),
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let data = &body["data"];
    (
        data["id"].as_str().unwrap().to_string(),
        data["deviceId"].as_str().unwrap().to_string(),
        data["token"].as_str().unwrap().to_string(),
    )
}

/// Register a content record and return its id
async fn register_content(app: &axum::Router, name: &str, filename: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/content",
            Some(json!({
                "name": name,
                "filename": filename,
                "mimeType": "video/mp4",
                "size": 2048,
            })),
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = setup_app(&dir);

    let (status, body) = send(&app, request("GET", "/api/health", None, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["database"], "connected");
}

#[tokio::test]
async fn admin_routes_require_api_key() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = setup_app(&dir);

    let (status, _) = send(&app, request("GET", "/api/franchises", None, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        request("GET", "/api/franchises", None, Some("wrong-key"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_is_plaintext_once_then_masked() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = setup_app(&dir);

    let (_, _, token) = register_franchise(&app, "dev-1").await;
    assert_ne!(token, "***MASKED***");

    let (status, body) = send(
        &app,
        request("GET", "/api/franchises", None, Some(TEST_API_KEY), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["token"], "***MASKED***");
}

#[tokio::test]
async fn duplicate_device_id_conflicts() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = setup_app(&dir);

    register_franchise(&app, "dev-1").await;
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/franchises",
            Some(json!({"name": "Again", "location": "Delhi", "deviceId": "dev-1"})),
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn device_routes_require_valid_token() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = setup_app(&dir);

    let (status, _) = send(&app, request("GET", "/api/playlist", None, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        request("GET", "/api/playlist", None, None, Some("bogus")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn heartbeat_marks_device_online() {
    let dir = TempDir::new().unwrap();
    let (app, store, _) = setup_app(&dir);

    let (_, device_id, token) = register_franchise(&app, "dev-1").await;

    let (status, body) = send(
        &app,
        request("POST", "/api/heartbeat", None, None, Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deviceId"], device_id);

    let doc = store.load_fresh().unwrap();
    let franchise = doc.franchise_by_device(&device_id).unwrap();
    assert_eq!(
        serde_json::to_value(franchise.status).unwrap(),
        json!("online")
    );
    assert!(franchise.last_sync.is_some());
}

#[tokio::test]
async fn playlist_expands_folders_and_rewrites_urls() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = setup_app(&dir);

    let (_, device_id, token) = register_franchise(&app, "dev-1").await;

    let content_a = register_content(&app, "content-A", "a.mp4").await;
    let content_b = register_content(&app, "content-B", "b.mp4").await;
    let content_c = register_content(&app, "content-C", "c.mp4").await;

    // folder-1 holds B then C
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/folders",
            Some(json!({"name": "folder-1", "contentIds": [content_b, content_c]})),
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let folder_id = body["data"]["id"].as_str().unwrap().to_string();

    // Assign content-A (legacy bare string) then the folder (tagged)
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/assignments",
            Some(json!({
                "deviceId": device_id,
                "items": [content_a, {"type": "folder", "id": folder_id}],
                "playbackOrder": "sequential",
            })),
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // The write normalized the bare string to the tagged form
    assert_eq!(body["data"]["assignedItems"][0]["type"], "content");

    let mut req = request("GET", "/api/playlist", None, None, Some(&token));
    req.headers_mut()
        .insert("host", "signage.example.com:8080".parse().unwrap());
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["playbackOrder"], "sequential");
    assert_eq!(data["playlistCount"], 3);

    let names: Vec<&str> = data["playlist"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["content-A", "content-B", "content-C"]);

    for item in data["playlist"].as_array().unwrap() {
        let url = item["url"].as_str().unwrap();
        assert!(
            url.starts_with("http://signage.example.com:8080/content/"),
            "url not rewritten: {}",
            url
        );
    }
}

#[tokio::test]
async fn deleting_a_folder_empties_its_contribution() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = setup_app(&dir);

    let (_, device_id, token) = register_franchise(&app, "dev-1").await;
    let content_b = register_content(&app, "B", "b.mp4").await;

    let (_, body) = send(
        &app,
        request(
            "POST",
            "/api/folders",
            Some(json!({"name": "F", "contentIds": [content_b]})),
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;
    let folder_id = body["data"]["id"].as_str().unwrap().to_string();

    send(
        &app,
        request(
            "POST",
            "/api/assignments",
            Some(json!({
                "deviceId": device_id,
                "items": [{"type": "folder", "id": folder_id}],
            })),
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/api/folders/{}", folder_id),
            None,
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        request("GET", "/api/playlist", None, None, Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["playlistCount"], 0);
}

#[tokio::test]
async fn assignments_reject_unknown_device() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = setup_app(&dir);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/assignments",
            Some(json!({"deviceId": "ghost", "items": []})),
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn assignments_drop_unknown_targets() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = setup_app(&dir);

    let (_, device_id, _) = register_franchise(&app, "dev-1").await;
    let content_a = register_content(&app, "A", "a.mp4").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/assignments",
            Some(json!({
                "deviceId": device_id,
                "items": [content_a, "no-such-content", {"type": "folder", "id": "no-such-folder"}],
            })),
            Some(TEST_API_KEY),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["assignedItems"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["invalidItems"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn device_report_lands_in_analytics() {
    let dir = TempDir::new().unwrap();
    let (app, store, _) = setup_app(&dir);

    let (_, device_id, token) = register_franchise(&app, "dev-1").await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/device/report",
            Some(json!({"contentId": "c-1", "action": "play", "duration": 12.5})),
            None,
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let doc = store.load_fresh().unwrap();
    assert_eq!(doc.analytics.len(), 1);
    assert_eq!(doc.analytics[0].device_id, device_id);
    assert_eq!(doc.analytics[0].action, "play");
}

#[tokio::test]
async fn otp_endpoints_pair_a_device_end_to_end() {
    let dir = TempDir::new().unwrap();
    let (app, _, sender) = setup_app(&dir);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/device/send-otp",
            Some(json!({"phone": "+91 98765 43210"})),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "919876543210");

    let code = sender.last_code_for("919876543210").unwrap();
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/device/verify-otp",
            Some(json!({
                "phone": "9876543210",
                "otp": code,
                "deviceName": "Window Display",
            })),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isNewPartner"], true);
    let device_token = body["data"]["deviceToken"].as_str().unwrap().to_string();

    // The issued token authenticates device routes immediately
    let (status, body) = send(
        &app,
        request("GET", "/api/device/info", None, None, Some(&device_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Window Display");
}

#[tokio::test]
async fn wrong_otp_reports_remaining_attempts_over_http() {
    let dir = TempDir::new().unwrap();
    let (app, _, sender) = setup_app(&dir);

    send(
        &app,
        request(
            "POST",
            "/api/auth/device/send-otp",
            Some(json!({"phone": "9876543210"})),
            None,
            None,
        ),
    )
    .await;
    let code = sender.last_code_for("919876543210").unwrap();
    let wrong = if code == "0000" { "0001" } else { "0000" };

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/device/verify-otp",
            Some(json!({"phone": "9876543210", "otp": wrong})),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("2 attempts remaining"));
}
