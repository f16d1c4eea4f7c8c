//! SMS dispatch collaborators
//!
//! The OTP state machine talks to phones through the [`SmsSender`] seam.
//! Production uses the MSG91 OTP API; deployments without credentials get
//! [`ConsoleSender`], which logs the code instead of dispatching it.

use axum::async_trait;
use fos_common::{Error, Result};
use serde::Deserialize;
use tracing::{error, info};

/// Outbound one-time-code dispatch
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Deliver `code` to `phone` (normalized, country-code prefixed).
    ///
    /// An `Err` means the code did not reach a carrier; the caller must
    /// retract any stored pending record.
    async fn send_otp(&self, phone: &str, code: &str) -> Result<()>;
}

/// MSG91 OTP API client
pub struct Msg91Sender {
    client: reqwest::Client,
    auth_key: String,
    template_id: String,
    base_url: String,
}

const MSG91_BASE_URL: &str = "https://control.msg91.com/api/v5";

#[derive(Debug, Deserialize)]
struct Msg91Response {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
}

impl Msg91Sender {
    pub fn new(auth_key: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth_key: auth_key.into(),
            template_id: template_id.into(),
            base_url: MSG91_BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl SmsSender for Msg91Sender {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/otp", self.base_url))
            .query(&[
                ("template_id", self.template_id.as_str()),
                ("mobile", phone),
                ("authkey", self.auth_key.as_str()),
                ("otp", code),
            ])
            .send()
            .await
            .map_err(|e| Error::DispatchFailed(e.to_string()))?;

        let body: Msg91Response = response
            .json()
            .await
            .map_err(|e| Error::DispatchFailed(e.to_string()))?;

        if body.kind == "success" {
            info!("OTP dispatched to {}", phone);
            Ok(())
        } else {
            let message = body.message.unwrap_or_else(|| "Failed to send OTP".into());
            error!("MSG91 send failed: {}", message);
            Err(Error::DispatchFailed(message))
        }
    }
}

/// Development fallback: logs the code instead of sending it.
///
/// Selected when no MSG91 credentials are configured, so local setups can
/// pair devices by reading the server log.
pub struct ConsoleSender;

#[async_trait]
impl SmsSender for ConsoleSender {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<()> {
        info!("SMS dispatch not configured; OTP for {} is {}", phone, code);
        Ok(())
    }
}
