//! Request authentication extractors
//!
//! Admin routes require the configured API key in `X-API-Key`; device
//! routes require a franchise bearer token in `X-Device-Token`. Both are
//! modeled as extractors so handlers state their requirement in the
//! signature.

use crate::api::{ApiError, AppState};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use fos_common::db::models::Franchise;
use fos_common::Error;

/// Admin authentication via API key
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok());

        if provided == Some(state.api_key.as_str()) {
            Ok(AdminAuth)
        } else {
            Err(Error::Unauthorized("Invalid or missing API key".into()).into())
        }
    }
}

/// Device authentication via franchise bearer token
///
/// Resolves the token to its franchise; handlers receive the matched
/// record. Lookups go through the cached read path - a heartbeat arriving
/// moments after a token regeneration may still see the old token, which
/// is acceptable staleness.
pub struct DeviceAuth(pub Franchise);

#[async_trait]
impl FromRequestParts<AppState> for DeviceAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("x-device-token")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError(Error::Unauthorized("Missing device token".into())))?;

        let doc = state.store.load().map_err(ApiError)?;
        let franchise = doc
            .franchises
            .iter()
            .find(|f| f.token == token)
            .cloned()
            .ok_or_else(|| ApiError(Error::Unauthorized("Invalid device token".into())))?;

        Ok(DeviceAuth(franchise))
    }
}
