//! Versioned schema migrations for the persisted document
//!
//! Migrations are a static, ordered, compiled-in list: each declares a
//! target version and a pure `up` function mutating the document in place.
//! At startup (after recovery) every migration whose version exceeds the
//! document's recorded version runs in ascending order, and the document is
//! persisted once after the batch.
//!
//! A failing step is logged and skipped: its effects are discarded (each
//! step runs against a scratch copy) and the recorded version never
//! advances past it, so the failed step and every later sibling run again
//! on the next startup. Steps are therefore written idempotent.
//!
//! # Migration Guidelines
//!
//! 1. Never modify existing migrations - they must remain stable for
//!    deployments upgrading from older versions
//! 2. Always add new migrations - one new entry per schema change
//! 3. Keep steps idempotent - a step may see a document it already shaped

use crate::db::models::Document;
use crate::{Error, Result};
use chrono::Utc;
use tracing::{info, warn};

/// One schema-upgrade step
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub up: fn(&mut Document) -> Result<()>,
}

/// All known migrations, ascending by version
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial-metadata",
        up: migrate_v1,
    },
    Migration {
        version: 2,
        name: "orphan-assignment-cleanup",
        up: migrate_v2,
    },
    Migration {
        version: 3,
        name: "otp-hygiene",
        up: migrate_v3,
    },
];

/// Outcome of one runner invocation
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Versions applied this run
    pub applied: Vec<u32>,
    /// Versions that failed and were skipped
    pub skipped: Vec<u32>,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Apply every pending migration to the in-memory document.
///
/// The caller persists the document once afterwards if the report says
/// anything changed. Never fails: a failing step is recorded in the report
/// and startup continues.
pub fn run_migrations(document: &mut Document) -> MigrationReport {
    let current = document.metadata.version;
    let mut report = MigrationReport::default();
    let mut new_version = current;
    let mut blocked = false;

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        info!("Applying migration v{} ({})", migration.version, migration.name);

        // Scratch copy: a failing step must leave no partial effects
        let mut scratch = document.clone();
        match (migration.up)(&mut scratch) {
            Ok(()) => {
                *document = scratch;
                report.applied.push(migration.version);
                if !blocked {
                    new_version = migration.version;
                }
            }
            Err(err) => {
                let failure = Error::MigrationFailed {
                    version: migration.version,
                    reason: err.to_string(),
                };
                warn!("{} - skipping", failure);
                report.skipped.push(migration.version);
                // Later siblings still run, but the version stays below the
                // failed step so the whole tail re-runs next startup.
                blocked = true;
            }
        }
    }

    document.metadata.version = new_version;
    if report.changed() {
        info!(
            "Database schema migrated: v{} -> v{}",
            current, new_version
        );
    }
    report
}

/// v1: ensure base structure and backfill franchise creation timestamps
fn migrate_v1(document: &mut Document) -> Result<()> {
    // createdAt defaulted to the epoch by earlier schemas reads as "unset"
    let now = Utc::now();
    for franchise in &mut document.franchises {
        if franchise.created_at.timestamp() == 0 {
            franchise.created_at = now;
        }
    }
    Ok(())
}

/// v2: drop assignment lists keyed by devices that no longer exist
///
/// Earlier versions deleted a franchise without deleting its assignment
/// list. Dangling item ids inside surviving lists stay in place - the
/// resolver filters those. Loading a legacy document also normalizes
/// bare-string items to the tagged form, so the batch persist after this
/// migration rewrites them on disk as a side effect.
fn migrate_v2(document: &mut Document) -> Result<()> {
    let known: std::collections::BTreeSet<String> = document
        .franchises
        .iter()
        .map(|f| f.device_id.clone())
        .collect();
    document
        .assignments
        .retain(|device_id, _| known.contains(device_id));
    Ok(())
}

/// v3: prune OTP records that predate attempt tracking or already expired
fn migrate_v3(document: &mut Document) -> Result<()> {
    let now = Utc::now();
    document
        .otp_tokens
        .retain(|_, token| token.attempts <= 3 && token.expires_at > now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Metadata, OtpToken};

    #[test]
    fn fresh_document_migrates_to_current_version() {
        let mut doc = Document::empty();
        let report = run_migrations(&mut doc);
        assert_eq!(report.applied, vec![1, 2, 3]);
        assert!(report.skipped.is_empty());
        assert_eq!(doc.metadata.version, 3);
    }

    #[test]
    fn second_run_is_a_noop() {
        let mut doc = Document::empty();
        run_migrations(&mut doc);
        let before = serde_json::to_string(&doc).unwrap();

        let report = run_migrations(&mut doc);
        assert!(!report.changed());
        assert_eq!(before, serde_json::to_string(&doc).unwrap());
    }

    #[test]
    fn up_to_date_document_is_untouched() {
        let mut doc = Document::empty();
        doc.metadata = Metadata {
            version: 3,
            ..Metadata::new()
        };
        let report = run_migrations(&mut doc);
        assert!(report.applied.is_empty());
        assert_eq!(doc.metadata.version, 3);
    }

    #[test]
    fn v2_drops_orphan_assignment_lists() {
        let mut doc = Document::empty();
        doc.assignments
            .insert("ghost-device".into(), vec![]);
        run_migrations(&mut doc);
        assert!(doc.assignments.is_empty());
    }

    #[test]
    fn v3_prunes_exhausted_otp_records() {
        let mut doc = Document::empty();
        doc.otp_tokens.insert(
            "911234567890".into(),
            OtpToken {
                otp: "1234".into(),
                expires_at: Utc::now(),
                attempts: 99,
                created_at: Utc::now(),
            },
        );
        run_migrations(&mut doc);
        assert!(doc.otp_tokens.is_empty());
    }

    #[test]
    fn failed_step_skips_and_holds_version_back() {
        // Simulate by running against a custom list through the same logic:
        // a v2 failure must keep the recorded version at v1 even though v3
        // applied.
        fn fail(_: &mut Document) -> Result<()> {
            Err(Error::Internal("exploded".into()))
        }
        let list = [
            Migration { version: 1, name: "ok-1", up: |_| Ok(()) },
            Migration { version: 2, name: "bad", up: fail },
            Migration { version: 3, name: "ok-3", up: |_| Ok(()) },
        ];

        let mut doc = Document::empty();
        let mut new_version = doc.metadata.version;
        let mut blocked = false;
        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        for migration in &list {
            let mut scratch = doc.clone();
            match (migration.up)(&mut scratch) {
                Ok(()) => {
                    doc = scratch;
                    applied.push(migration.version);
                    if !blocked {
                        new_version = migration.version;
                    }
                }
                Err(_) => {
                    skipped.push(migration.version);
                    blocked = true;
                }
            }
        }
        doc.metadata.version = new_version;

        assert_eq!(applied, vec![1, 3]);
        assert_eq!(skipped, vec![2]);
        assert_eq!(doc.metadata.version, 1);
    }
}
