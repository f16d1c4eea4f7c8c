//! Phone-OTP device pairing routes

use crate::api::{ok, ApiResult, AppState};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use fos_common::Error;
use serde::Deserialize;
use serde_json::{json, Value};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/check-status", post(check_status))
}

#[derive(Debug, Deserialize)]
struct PhoneRequest {
    phone: String,
}

/// POST /api/auth/device/send-otp
async fn send_otp(
    State(state): State<AppState>,
    Json(body): Json<PhoneRequest>,
) -> ApiResult<Json<Value>> {
    if body.phone.trim().is_empty() {
        return Err(Error::InvalidInput("Phone number is required".into()).into());
    }
    let phone = state.otp.send_or_resend(&body.phone).await?;
    Ok(ok(
        json!({ "phone": phone, "message": "OTP sent successfully" }),
        "OTP sent to your phone",
    ))
}

/// POST /api/auth/device/resend-otp
async fn resend_otp(
    State(state): State<AppState>,
    Json(body): Json<PhoneRequest>,
) -> ApiResult<Json<Value>> {
    if body.phone.trim().is_empty() {
        return Err(Error::InvalidInput("Phone number is required".into()).into());
    }
    let phone = state.otp.send_or_resend(&body.phone).await?;
    Ok(ok(
        json!({ "phone": phone, "message": "OTP resent successfully" }),
        "OTP resent to your phone",
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    phone: String,
    otp: String,
    device_name: Option<String>,
    location: Option<String>,
}

/// POST /api/auth/device/verify-otp
async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> ApiResult<Json<Value>> {
    if body.phone.trim().is_empty() || body.otp.trim().is_empty() {
        return Err(Error::InvalidInput("Phone and OTP are required".into()).into());
    }

    let verified = state
        .otp
        .verify(
            &body.phone,
            &body.otp,
            body.device_name.as_deref(),
            body.location.as_deref(),
        )
        .await?;

    let message = if verified.is_new_partner {
        "Registration successful"
    } else {
        "Login successful"
    };
    Ok(ok(verified, message))
}

/// POST /api/auth/device/check-status
async fn check_status(
    State(state): State<AppState>,
    Json(body): Json<PhoneRequest>,
) -> ApiResult<Json<Value>> {
    if body.phone.trim().is_empty() {
        return Err(Error::InvalidInput("Phone number is required".into()).into());
    }
    let status = state.otp.check_status(&body.phone)?;
    Ok(ok(status, "OK"))
}
