//! Playlist resolution
//!
//! Pure functions that turn a device's raw assignment list into the
//! concrete, ordered, URL-correct playlist its player loops over. No store
//! or HTTP dependencies: the caller hands in a loaded document and the
//! request's externally-reachable base URL.
//!
//! Resolution is tolerant by design. A deleted content id, a deleted
//! folder, or folder members that no longer exist are dropped silently -
//! partial expansion is correct behavior, not a failure. The only error is
//! an unknown deviceId.

use chrono::{DateTime, Utc};
use fos_common::db::models::{Content, Document, ItemKind, PlaybackOrder};
use fos_common::{Error, Result};
use rand::seq::SliceRandom;
use serde::Serialize;

/// A resolved playlist plus echoed device metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlaylist {
    pub device_id: String,
    pub partner_name: String,
    pub location: String,
    pub playback_order: PlaybackOrder,
    pub playlist: Vec<Content>,
    pub playlist_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Resolve the playlist for `device_id` against `document`.
///
/// Content and folder references expand in assignment order; a folder
/// contributes its surviving members as a contiguous run at the folder's
/// position. Under [`PlaybackOrder::Random`] the entire flattened playlist
/// is shuffled fresh on every call (Fisher-Yates; no persisted seed), so
/// consecutive requests may observe different orders. Every delivered
/// `url` is rewritten to `base_url`.
pub fn resolve_playlist(
    document: &Document,
    device_id: &str,
    base_url: &str,
) -> Result<ResolvedPlaylist> {
    let franchise = document
        .franchise_by_device(device_id)
        .ok_or_else(|| Error::NotFound(format!("Partner not found: {}", device_id)))?;

    let items = document
        .assignments
        .get(device_id)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut playlist: Vec<Content> = Vec::new();
    for item in items {
        match item.kind {
            ItemKind::Content => {
                if let Some(content) = document.content_by_id(&item.id) {
                    playlist.push(content.clone());
                }
            }
            ItemKind::Folder => {
                let Some(folder) = document.folder_by_id(&item.id) else {
                    continue;
                };
                for content_id in &folder.content_ids {
                    if let Some(content) = document.content_by_id(content_id) {
                        playlist.push(content.clone());
                    }
                }
            }
        }
    }

    if franchise.playback_order == PlaybackOrder::Random {
        playlist.shuffle(&mut rand::thread_rng());
    }

    for content in &mut playlist {
        content.url = rewrite_origin(&content.url, base_url);
    }

    Ok(ResolvedPlaylist {
        device_id: device_id.to_string(),
        partner_name: franchise.name.clone(),
        location: franchise.location.clone(),
        playback_order: franchise.playback_order,
        playlist_count: playlist.len(),
        playlist,
        last_updated: Utc::now(),
    })
}

/// Replace the origin (scheme://host[:port]) of an http(s) URL with
/// `base_url`, preserving path and filename exactly.
///
/// Content URLs embed the serving address current at creation time; when
/// the server moves behind a proxy, a tunnel, or a redeploy, the embedded
/// host goes stale. Rewriting at resolution time keeps playback working
/// without touching the stored records. A URL whose origin already matches
/// comes back unchanged, and non-http URLs pass through untouched.
pub fn rewrite_origin(url: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    for scheme in ["http://", "https://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            let path = rest.find('/').map(|i| &rest[i..]).unwrap_or("");
            return format!("{}{}", base, path);
        }
    }
    url.to_string()
}
