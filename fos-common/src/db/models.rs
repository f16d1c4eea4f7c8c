//! The persisted document model
//!
//! The whole application state is one JSON document: every collection the
//! backend serves lives under the single root [`Document`]. Collections are
//! defaulted so that documents written by any earlier schema version (or
//! restored from an old backup snapshot) still deserialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root persisted state object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub franchises: Vec<Franchise>,

    #[serde(default)]
    pub content: Vec<Content>,

    #[serde(default)]
    pub folders: Vec<Folder>,

    /// deviceId -> ordered assignment items
    #[serde(default)]
    pub assignments: BTreeMap<String, Vec<AssignmentItem>>,

    /// normalized phone -> pending one-time code
    #[serde(default, rename = "otpTokens")]
    pub otp_tokens: BTreeMap<String, OtpToken>,

    /// Append-only playback reports, capped at the most recent
    /// [`ANALYTICS_CAP`] entries
    #[serde(default)]
    pub analytics: Vec<AnalyticsEvent>,

    #[serde(default, rename = "_metadata")]
    pub metadata: Metadata,
}

/// Upper bound on retained analytics events (oldest dropped first)
pub const ANALYTICS_CAP: usize = 10_000;

impl Document {
    /// Empty schema, version 0 - the state a brand-new deployment starts from
    pub fn empty() -> Self {
        Self {
            franchises: Vec::new(),
            content: Vec::new(),
            folders: Vec::new(),
            assignments: BTreeMap::new(),
            otp_tokens: BTreeMap::new(),
            analytics: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Append a playback report, dropping the oldest entries past the cap
    pub fn push_analytics(&mut self, event: AnalyticsEvent) {
        self.analytics.push(event);
        if self.analytics.len() > ANALYTICS_CAP {
            let excess = self.analytics.len() - ANALYTICS_CAP;
            self.analytics.drain(..excess);
        }
    }

    pub fn franchise_by_device(&self, device_id: &str) -> Option<&Franchise> {
        self.franchises.iter().find(|f| f.device_id == device_id)
    }

    pub fn content_by_id(&self, id: &str) -> Option<&Content> {
        self.content.iter().find(|c| c.id == id)
    }

    pub fn folder_by_id(&self, id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }
}

/// Schema version gate and modification timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub version: u32,

    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            version: 0,
            created_at: Utc::now(),
            last_modified: None,
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered playback device/location ("partner")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Franchise {
    pub id: String,

    /// Client-supplied stable pairing key, globally unique
    pub device_id: String,

    pub name: String,
    pub location: String,

    /// Secret bearer credential. Returned in plaintext only at creation and
    /// regeneration; masked everywhere else.
    pub token: String,

    /// Set for OTP-paired devices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default)]
    pub status: FranchiseStatus,

    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,

    #[serde(default)]
    pub playback_order: PlaybackOrder,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,

    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Mask shown in place of the bearer token in listings
pub const TOKEN_MASK: &str = "***MASKED***";

impl Franchise {
    /// Copy with the bearer token masked, for listings and lookups
    pub fn masked(&self) -> Self {
        Self {
            token: TOKEN_MASK.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FranchiseStatus {
    Online,
    Offline,
}

impl Default for FranchiseStatus {
    fn default() -> Self {
        FranchiseStatus::Offline
    }
}

/// Device playback ordering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackOrder {
    /// Assignment order, folders expanded in place
    Sequential,
    /// Full shuffle, recomputed on every resolution
    Random,
}

impl Default for PlaybackOrder {
    fn default() -> Self {
        PlaybackOrder::Sequential
    }
}

/// An uploaded media item (the file itself lives with the upload layer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: String,
    pub name: String,

    /// Storage key under the content directory
    pub filename: String,

    #[serde(rename = "type")]
    pub content_type: ContentType,

    pub mime_type: String,
    pub size: u64,
    pub url: String,

    /// Display seconds for images; a video's own length governs videos
    #[serde(default = "default_duration")]
    pub duration: u32,

    #[serde(default = "epoch")]
    pub upload_date: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_duration() -> u32 {
    10
}

/// Default for timestamps absent from documents written by older schemas;
/// the v1 migration backfills these.
fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Image,
}

impl ContentType {
    /// Derived from the MIME type at registration time
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video") {
            ContentType::Video
        } else {
            ContentType::Image
        }
    }
}

/// A named, ordered group of content ids, expandable inline into a playlist
///
/// Duplicate member ids are allowed but meaningless; dangling ids are
/// tolerated and filtered at resolution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub content_ids: Vec<String>,

    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One entry in a device's assignment list
///
/// Two encodings exist in the wild: a legacy bare content id (string) and
/// the tagged `{type, id}` object. Deserialization normalizes both to this
/// single tagged type (via [`RawAssignmentItem`]); serialization always
/// emits the tagged form, so no write path re-introduces the legacy
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAssignmentItem")]
pub struct AssignmentItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub id: String,
}

impl AssignmentItem {
    pub fn content(id: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Content,
            id: id.into(),
        }
    }

    pub fn folder(id: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Folder,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Content,
    Folder,
}

impl Default for ItemKind {
    fn default() -> Self {
        ItemKind::Content
    }
}

/// The two on-disk encodings of an assignment item. This is the single
/// place that knows about the legacy bare-string form.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAssignmentItem {
    Tagged {
        #[serde(rename = "type", default)]
        kind: ItemKind,
        id: String,
    },
    Bare(String),
}

impl From<RawAssignmentItem> for AssignmentItem {
    fn from(raw: RawAssignmentItem) -> Self {
        match raw {
            RawAssignmentItem::Bare(id) => AssignmentItem {
                kind: ItemKind::Content,
                id,
            },
            RawAssignmentItem::Tagged { kind, id } => AssignmentItem { kind, id },
        }
    }
}

/// A pending one-time pairing code, keyed by normalized phone number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpToken {
    pub otp: String,
    pub expires_at: DateTime<Utc>,

    #[serde(default)]
    pub attempts: u32,

    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

/// One playback report from a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub device_id: String,
    pub franchise_id: String,
    pub content_id: String,

    /// 'play', 'complete', 'skip', ...
    pub action: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}
