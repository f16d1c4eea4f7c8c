//! Phone-OTP device pairing
//!
//! Short-lived one-time codes keyed by normalized phone number, stored in
//! the same transactional document as everything else so they get the same
//! atomicity and recovery guarantees as franchises and content.
//!
//! Lifecycle per phone: absent -> pending (otp, expiry, attempts=0) ->
//! consumed on successful verify (deleted), or deleted on expiry /
//! third failed attempt. Sending always overwrites any pending record with
//! a fresh one. The whole verify-then-upsert-franchise sequence runs inside
//! one store transaction: a consumed code with no franchise behind it
//! cannot happen.

use crate::sms::SmsSender;
use chrono::{Duration, Utc};
use fos_common::db::models::{Franchise, FranchiseStatus, OtpToken, PlaybackOrder};
use fos_common::db::store::{Commit, DocumentStore};
use fos_common::{Error, Result};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Pending codes expire this long after (re)send
const OTP_EXPIRY_MINUTES: i64 = 10;

/// A pending code is purged after this many failed attempts
pub const MAX_ATTEMPTS: u32 = 3;

/// Credentials handed to a freshly verified device.
///
/// The token is not retrievable again in plaintext; the device must
/// persist it client-side, same as admin-issued franchise tokens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedDevice {
    pub device_token: String,
    pub device_id: String,
    pub partner_id: String,
    pub partner_name: String,
    pub location: String,
    pub is_new_partner: bool,
}

/// Registration state for a phone number
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingStatus {
    pub is_registered: bool,
    pub partner_name: Option<String>,
}

/// Outcome of the verify transaction. Failure outcomes still commit (the
/// attempt counter and purges must persist), so the closure returns a value
/// and the service maps it to an error afterwards.
enum VerifyOutcome {
    Missing,
    Expired,
    Exhausted,
    Mismatch { remaining: u32 },
    Verified(VerifiedDevice),
}

/// OTP pairing state machine over the shared document store
pub struct OtpService {
    store: Arc<DocumentStore>,
    sms: Arc<dyn SmsSender>,
}

impl OtpService {
    pub fn new(store: Arc<DocumentStore>, sms: Arc<dyn SmsSender>) -> Self {
        Self { store, sms }
    }

    /// Generate a fresh code for `phone`, overwriting any pending record,
    /// and dispatch it. A dispatch failure retracts the stored record so no
    /// ghost code stays valid for a phone that never received it.
    ///
    /// Returns the normalized phone number.
    pub async fn send_or_resend(&self, raw_phone: &str) -> Result<String> {
        let phone = normalize_phone(raw_phone)?;
        let code = generate_otp();
        let now = Utc::now();

        self.store
            .transact_retry(|doc| {
                doc.otp_tokens.insert(
                    phone.clone(),
                    OtpToken {
                        otp: code.clone(),
                        expires_at: now + Duration::minutes(OTP_EXPIRY_MINUTES),
                        attempts: 0,
                        created_at: now,
                    },
                );
                Ok(Commit::value(()))
            })
            .await?;

        if let Err(err) = self.sms.send_otp(&phone, &code).await {
            let retracted = self
                .store
                .transact_retry(|doc| {
                    doc.otp_tokens.remove(&phone);
                    Ok(Commit::value(()))
                })
                .await;
            if retracted.is_err() {
                warn!("Failed to retract undelivered OTP for {}", phone);
            }
            return Err(err);
        }

        info!("OTP sent to {}", phone);
        Ok(phone)
    }

    /// Verify `code` for `phone` and log the device in, creating a new
    /// franchise when the phone is unknown.
    ///
    /// The check, the code consumption, and the franchise upsert happen in
    /// one transaction. Failed attempts persist their bookkeeping: a wrong
    /// code increments the counter, and the third wrong code purges the
    /// record (later calls see "expired or not found").
    pub async fn verify(
        &self,
        raw_phone: &str,
        code: &str,
        device_name: Option<&str>,
        location: Option<&str>,
    ) -> Result<VerifiedDevice> {
        let phone = normalize_phone(raw_phone)?;

        let outcome = self
            .store
            .transact_retry(|doc| {
                let now = Utc::now();
                let Some(token) = doc.otp_tokens.get(&phone).cloned() else {
                    return Ok(Commit::value(VerifyOutcome::Missing));
                };

                if now > token.expires_at {
                    doc.otp_tokens.remove(&phone);
                    return Ok(Commit::value(VerifyOutcome::Expired));
                }

                if token.attempts >= MAX_ATTEMPTS {
                    doc.otp_tokens.remove(&phone);
                    return Ok(Commit::value(VerifyOutcome::Exhausted));
                }

                if token.otp != code {
                    let attempts = token.attempts + 1;
                    if attempts >= MAX_ATTEMPTS {
                        // Third strike: purge now, report zero remaining
                        doc.otp_tokens.remove(&phone);
                    } else if let Some(stored) = doc.otp_tokens.get_mut(&phone) {
                        stored.attempts = attempts;
                    }
                    return Ok(Commit::value(VerifyOutcome::Mismatch {
                        remaining: MAX_ATTEMPTS - attempts,
                    }));
                }

                // Single use: consume before touching the franchise
                doc.otp_tokens.remove(&phone);

                if let Some(franchise) = doc
                    .franchises
                    .iter_mut()
                    .find(|f| f.phone.as_deref() == Some(phone.as_str()))
                {
                    franchise.last_login = Some(now);
                    franchise.status = FranchiseStatus::Online;
                    if let Some(name) = device_name {
                        franchise.name = name.to_string();
                    }
                    if let Some(loc) = location {
                        franchise.location = loc.to_string();
                    }

                    let verified = VerifiedDevice {
                        device_token: franchise.token.clone(),
                        device_id: franchise.device_id.clone(),
                        partner_id: franchise.id.clone(),
                        partner_name: franchise.name.clone(),
                        location: franchise.location.clone(),
                        is_new_partner: false,
                    };
                    Ok(Commit::value(VerifyOutcome::Verified(verified))
                        .with_audit("DEVICE_LOGIN", json!({ "phone": phone })))
                } else {
                    let device_id = generate_device_id();
                    let device_token = uuid::Uuid::new_v4().to_string();
                    let suffix = &phone[phone.len().saturating_sub(4)..];

                    let franchise = Franchise {
                        id: uuid::Uuid::new_v4().to_string(),
                        device_id: device_id.clone(),
                        name: device_name
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("Partner {}", suffix)),
                        location: location
                            .map(str::to_string)
                            .unwrap_or_else(|| "Not specified".to_string()),
                        token: device_token.clone(),
                        phone: Some(phone.clone()),
                        status: FranchiseStatus::Online,
                        last_sync: Some(now),
                        last_login: Some(now),
                        playback_order: PlaybackOrder::Sequential,
                        auth_method: Some("phone_otp".to_string()),
                        created_at: now,
                        updated_at: None,
                    };

                    let verified = VerifiedDevice {
                        device_token,
                        device_id: device_id.clone(),
                        partner_id: franchise.id.clone(),
                        partner_name: franchise.name.clone(),
                        location: franchise.location.clone(),
                        is_new_partner: true,
                    };
                    doc.franchises.push(franchise);

                    Ok(Commit::value(VerifyOutcome::Verified(verified)).with_audit(
                        "DEVICE_REGISTER",
                        json!({ "phone": phone, "deviceId": device_id }),
                    ))
                }
            })
            .await?;

        match outcome {
            VerifyOutcome::Missing | VerifyOutcome::Expired => Err(Error::OtpExpired),
            VerifyOutcome::Exhausted => Err(Error::OtpExhausted),
            VerifyOutcome::Mismatch { remaining } => Err(Error::OtpMismatch { remaining }),
            VerifyOutcome::Verified(verified) => {
                info!(
                    "{}: {}",
                    if verified.is_new_partner {
                        "New partner registered"
                    } else {
                        "Partner logged in"
                    },
                    phone
                );
                Ok(verified)
            }
        }
    }

    /// Whether `phone` is already paired, and to which partner name
    pub fn check_status(&self, raw_phone: &str) -> Result<PairingStatus> {
        let phone = normalize_phone(raw_phone)?;
        // Pairing UIs call this right after verify; bypass the read cache
        let doc = self.store.load_fresh()?;
        let partner = doc
            .franchises
            .iter()
            .find(|f| f.phone.as_deref() == Some(phone.as_str()));
        Ok(PairingStatus {
            is_registered: partner.is_some(),
            partner_name: partner.map(|f| f.name.clone()),
        })
    }
}

/// Normalize a raw phone input to `91XXXXXXXXXX`.
///
/// Strips spaces, `+` and `-`; accepts a 10-digit Indian mobile number
/// (leading digit 6-9) with or without the 91 country prefix.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let clean: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '+' | '-'))
        .collect();

    if !clean.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidInput(
            "Invalid phone number format. Use 10 digit Indian mobile number.".into(),
        ));
    }

    let national = match clean.strip_prefix("91") {
        Some(rest) if rest.len() == 10 => rest,
        _ => clean.as_str(),
    };

    let valid = national.len() == 10
        && national
            .chars()
            .next()
            .map(|c| ('6'..='9').contains(&c))
            .unwrap_or(false);
    if !valid {
        return Err(Error::InvalidInput(
            "Invalid phone number format. Use 10 digit Indian mobile number.".into(),
        ));
    }

    Ok(format!("91{}", national))
}

/// 4-digit numeric one-time code
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Device ids issued to OTP-paired devices: `DEV-<base36 millis>`
fn generate_device_id() -> String {
    format!("DEV-{}", to_base36(Utc::now().timestamp_millis() as u64))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
