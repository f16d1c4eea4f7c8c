//! Store startup: recovery, migration, initial state
//!
//! [`open_store`] is the single entry point the server calls before the
//! HTTP listener accepts any traffic. It validates (or restores, or
//! initializes) the persisted document, runs the migration batch, and
//! returns the ready store. Nothing here is fatal except a state where no
//! document exists, no backup restores, and an empty document cannot be
//! written - the sole unrecoverable startup condition.

use crate::db::audit::AuditLogger;
use crate::db::backup::BackupManager;
use crate::db::migrations::run_migrations;
use crate::db::models::Document;
use crate::db::store::DocumentStore;
use crate::Result;
use chrono::Utc;
use std::path::Path;
use tracing::{error, info, warn};

/// Database file name inside the data directory
pub const DB_FILE: &str = "database.json";

/// Backup directory name inside the data directory
pub const BACKUP_DIR: &str = "backups";

/// Audit log file name inside the data directory
pub const AUDIT_FILE: &str = "audit.log";

/// Open the document store rooted at `data_dir`, recovering and migrating
/// as needed.
///
/// Recovery policy:
/// - missing document: restore the newest valid backup, else initialize
///   an empty version-0 schema
/// - corrupt document: preserve it as `database.json.corrupt.<millis>`
///   for forensics, then restore or initialize as above
///
/// Returns the store and the backup manager (for the caller to schedule).
pub fn open_store(data_dir: &Path) -> Result<(DocumentStore, BackupManager)> {
    std::fs::create_dir_all(data_dir)?;

    let db_path = data_dir.join(DB_FILE);
    let backups = BackupManager::new(&db_path, data_dir.join(BACKUP_DIR));
    let audit = AuditLogger::new(data_dir.join(AUDIT_FILE));
    let store = DocumentStore::new(&db_path, audit);

    if !db_path.exists() {
        warn!("Database file missing. Attempting restoration...");
        if backups.restore_latest() {
            info!("Recovered from backup");
        } else {
            info!("No backup found. Initializing new database.");
            store.persist(&mut Document::empty())?;
        }
    } else {
        match store.load_fresh() {
            Ok(_) => info!("Database loaded successfully"),
            Err(err) => {
                error!("Corrupted database detected: {}", err);
                // Preserve the corrupt file before anything overwrites it
                let corrupt_path = data_dir.join(format!(
                    "{}.corrupt.{}",
                    DB_FILE,
                    Utc::now().timestamp_millis()
                ));
                std::fs::rename(&db_path, &corrupt_path)?;
                info!("Corrupt file moved to: {}", corrupt_path.display());

                if backups.restore_latest() {
                    info!("Recovered from backup");
                } else {
                    error!("Could not recover database. Initializing new database.");
                    store.persist(&mut Document::empty())?;
                }
            }
        }
    }

    migrate(&store)?;
    Ok((store, backups))
}

/// Run the migration batch and persist once if anything changed
fn migrate(store: &DocumentStore) -> Result<()> {
    let mut document = store.load_fresh()?;
    let report = run_migrations(&mut document);
    if report.changed() {
        store.persist(&mut document)?;
        info!("Database schema updated");
    }
    Ok(())
}
