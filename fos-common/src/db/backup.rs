//! Hourly backup snapshots with rotation and restore
//!
//! A snapshot is a faithful copy of the persisted database file, named
//! `db-YYYY-MM-DD-HH.json` (hour granularity, so a later snapshot within
//! the same hour overwrites the earlier one). The scheduler copies the
//! persisted file only; it never holds the store's mutation lock.

use crate::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};

/// Retain at most this many hourly snapshots
pub const MAX_BACKUPS: usize = 24;

/// Snapshot cadence
const BACKUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct BackupManager {
    db_path: PathBuf,
    backup_dir: PathBuf,
}

impl BackupManager {
    pub fn new(db_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Copy the persisted database into this hour's snapshot, then rotate.
    ///
    /// Returns the snapshot path, or `None` if there was nothing to back up.
    pub fn snapshot(&self) -> Result<Option<PathBuf>> {
        if !self.db_path.exists() {
            warn!("Database file not found, skipping backup");
            return Ok(None);
        }
        std::fs::create_dir_all(&self.backup_dir)?;

        let stamp = Utc::now().format("%Y-%m-%d-%H");
        let backup_path = self.backup_dir.join(format!("db-{}.json", stamp));
        std::fs::copy(&self.db_path, &backup_path)?;
        info!("Backup created: {}", backup_path.display());

        self.rotate()?;
        Ok(Some(backup_path))
    }

    /// Delete all but the [`MAX_BACKUPS`] newest snapshots (by mtime)
    pub fn rotate(&self) -> Result<()> {
        let snapshots = self.list_snapshots()?;
        for (path, _) in snapshots.into_iter().skip(MAX_BACKUPS) {
            std::fs::remove_file(&path)?;
            info!("Rotated old backup: {}", path.display());
        }
        Ok(())
    }

    /// Restore the newest snapshot that still fully deserializes.
    ///
    /// Each candidate is validated by parsing before it is promoted to the
    /// live database file; unparseable snapshots are skipped in favor of
    /// the next-newest. Returns whether a restore happened.
    pub fn restore_latest(&self) -> bool {
        let snapshots = match self.list_snapshots() {
            Ok(snapshots) => snapshots,
            Err(_) => return false,
        };
        if snapshots.is_empty() {
            error!("No backups available for restore");
            return false;
        }

        for (path, _) in snapshots {
            match self.try_restore(&path) {
                Ok(()) => {
                    info!("Restored database from {}", path.display());
                    return true;
                }
                Err(err) => {
                    warn!("Skipping invalid backup {}: {}", path.display(), err);
                }
            }
        }
        false
    }

    fn try_restore(&self, snapshot: &Path) -> Result<()> {
        let content = std::fs::read_to_string(snapshot)?;
        // Validate before promoting
        serde_json::from_str::<crate::db::models::Document>(&content)?;
        std::fs::write(&self.db_path, content)?;
        Ok(())
    }

    /// Snapshot files, newest first by mtime
    fn list_snapshots(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let mut snapshots = Vec::new();
        let entries = match std::fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(snapshots),
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with("db-") || !name.ends_with(".json") {
                continue;
            }
            let mtime = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            snapshots.push((entry.path(), mtime));
        }
        snapshots.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(snapshots)
    }
}

/// Run one snapshot immediately, then hourly.
///
/// The task reads post-commit persisted state from disk and writes to a
/// separate location, so it never contends with the mutation lock.
pub fn spawn_backup_scheduler(manager: BackupManager) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(BACKUP_INTERVAL);
        loop {
            interval.tick().await;
            match manager.snapshot() {
                Ok(Some(_)) => {}
                Ok(None) => {}
                Err(err) => error!("Scheduled backup failed: {}", err),
            }
        }
    })
}
