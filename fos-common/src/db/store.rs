//! Document store with whole-document transactions
//!
//! The store exclusively owns the persisted document's lifecycle. Readers
//! get a deep copy (optionally served from a short-lived cache); writers go
//! through [`DocumentStore::transact`], which loads the current persisted
//! state, mutates a copy, and commits it atomically only if the mutation
//! callback succeeds.
//!
//! Concurrency policy is fail-fast single-writer: a mutation attempted
//! while another is in flight gets [`Error::StoreBusy`]. The
//! [`DocumentStore::transact_retry`] wrapper retries with a bounded linear
//! backoff for callers that prefer queue-like behavior. Two mutations never
//! interleave their reads and writes.

use crate::db::audit::AuditLogger;
use crate::db::models::Document;
use crate::{Error, Result};
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error};

/// How long a cached read may be served before re-reading the file
const CACHE_TTL: Duration = Duration::from_secs(2);

/// Retry attempts for [`DocumentStore::transact_retry`]
const RETRY_ATTEMPTS: u32 = 3;

/// Base backoff between retry attempts (multiplied by the attempt number)
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Result of a successful mutation callback
///
/// Carries the value returned to the caller plus an optional audit
/// descriptor logged after the commit succeeds.
pub struct Commit<T> {
    pub value: T,
    pub audit: Option<AuditEvent>,
}

/// Audit descriptor attached to a commit
pub struct AuditEvent {
    pub action: String,
    pub details: Value,
}

impl<T> Commit<T> {
    /// Commit carrying only a caller value
    pub fn value(value: T) -> Self {
        Self { value, audit: None }
    }

    /// Attach an audit descriptor to log after the commit
    pub fn with_audit(mut self, action: impl Into<String>, details: Value) -> Self {
        self.audit = Some(AuditEvent {
            action: action.into(),
            details,
        });
        self
    }
}

struct CachedDocument {
    loaded_at: Instant,
    document: Document,
}

/// The single-document transactional store
pub struct DocumentStore {
    db_path: PathBuf,
    audit: AuditLogger,

    /// Exclusive mutation rights. Owned by the store; never a module-level
    /// flag.
    write_gate: AsyncMutex<()>,

    /// Bounded-age read cache. Readers tolerate observing state slightly
    /// stale relative to a just-committed write.
    cache: StdMutex<Option<CachedDocument>>,
}

impl DocumentStore {
    /// Create a store over an existing, already-recovered database file.
    ///
    /// Use [`crate::db::open_store`] for the full startup sequence
    /// (recovery, migrations).
    pub fn new(db_path: impl Into<PathBuf>, audit: AuditLogger) -> Self {
        Self {
            db_path: db_path.into(),
            audit,
            write_gate: AsyncMutex::new(()),
            cache: StdMutex::new(None),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Deep copy of current persisted state, served from the bounded-age
    /// cache when fresh enough
    pub fn load(&self) -> Result<Document> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.as_ref() {
                if cached.loaded_at.elapsed() < CACHE_TTL {
                    return Ok(cached.document.clone());
                }
            }
        }
        self.load_fresh()
    }

    /// Deep copy of current persisted state, bypassing the cache
    ///
    /// Callers that need the absolute latest value (e.g. OTP verification
    /// across a multi-step external call) use this.
    pub fn load_fresh(&self) -> Result<Document> {
        let document = self.read_disk()?;
        self.refresh_cache(&document);
        Ok(document)
    }

    /// Atomic read-modify-write transaction.
    ///
    /// Acquires exclusive mutation rights (failing fast with
    /// [`Error::StoreBusy`] if another mutation is in flight), loads the
    /// current persisted document, invokes `mutate` on a copy, and commits
    /// the copy atomically only if `mutate` returns `Ok`. An `Err` from
    /// `mutate` discards the copy; no partial state is ever persisted.
    ///
    /// The commit's audit descriptor, if any, is logged strictly after the
    /// successful write and cannot fail the transaction.
    pub fn transact<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<Commit<T>>,
    {
        let _guard = self.write_gate.try_lock().map_err(|_| Error::StoreBusy)?;

        let mut document = self.read_disk()?;
        let commit = match mutate(&mut document) {
            Ok(commit) => commit,
            Err(err) => {
                error!("Transaction failed. Rolled back. {}", err);
                return Err(err);
            }
        };

        self.persist(&mut document)?;

        if let Some(event) = commit.audit {
            self.audit.log(&event.action, &event.details);
        }

        Ok(commit.value)
    }

    /// [`Self::transact`] with bounded retry on [`Error::StoreBusy`]
    ///
    /// Retries up to 3 times with a linear backoff (50 ms, 100 ms, ...).
    /// Any other error propagates immediately; `mutate` is only re-invoked
    /// when the prior attempt never ran it.
    pub async fn transact_retry<T, F>(&self, mutate: F) -> Result<T>
    where
        F: Fn(&mut Document) -> Result<Commit<T>>,
    {
        for attempt in 0..RETRY_ATTEMPTS {
            match self.transact(&mutate) {
                Err(Error::StoreBusy) => {
                    debug!("Store busy, retrying (attempt {})", attempt + 1);
                    tokio::time::sleep(RETRY_BACKOFF * (attempt + 1)).await;
                }
                other => return other,
            }
        }
        Err(Error::StoreBusy)
    }

    /// Write a document directly, outside a transaction.
    ///
    /// Only the startup path (recovery initialization, migration batch
    /// commit) uses this, before the server accepts any traffic.
    pub(crate) fn persist(&self, document: &mut Document) -> Result<()> {
        document.metadata.last_modified = Some(Utc::now());
        let json = serde_json::to_string_pretty(document)?;

        // Temp-file + rename keeps a crash mid-write from corrupting the
        // previous good state.
        let tmp_path = self.db_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.db_path)?;

        self.refresh_cache(document);
        Ok(())
    }

    fn read_disk(&self) -> Result<Document> {
        let content = std::fs::read_to_string(&self.db_path)?;
        let document = serde_json::from_str(&content)?;
        Ok(document)
    }

    fn refresh_cache(&self, document: &Document) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some(CachedDocument {
                loaded_at: Instant::now(),
                document: document.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Metadata;
    use tempfile::TempDir;

    fn setup_store(dir: &TempDir) -> DocumentStore {
        let db_path = dir.path().join("database.json");
        let audit = AuditLogger::new(dir.path().join("audit.log"));
        let store = DocumentStore::new(&db_path, audit);
        let mut doc = Document::empty();
        store.persist(&mut doc).unwrap();
        store
    }

    #[tokio::test]
    async fn transact_commits_mutation() {
        let dir = TempDir::new().unwrap();
        let store = setup_store(&dir);

        let version = store
            .transact(|doc| {
                doc.metadata.version = 7;
                Ok(Commit::value(doc.metadata.version))
            })
            .unwrap();

        assert_eq!(version, 7);
        assert_eq!(store.load_fresh().unwrap().metadata.version, 7);
    }

    #[tokio::test]
    async fn failed_mutation_rolls_back() {
        let dir = TempDir::new().unwrap();
        let store = setup_store(&dir);
        let before = store.load_fresh().unwrap();

        let result: Result<()> = store.transact(|doc| {
            doc.metadata.version = 99;
            doc.franchises.clear();
            Err(Error::Internal("boom".into()))
        });
        assert!(result.is_err());

        // Byte-for-byte identical to the state before the attempt
        let after = store.load_fresh().unwrap();
        assert_eq!(
            serde_json::to_string(&before).unwrap(),
            serde_json::to_string(&after).unwrap()
        );
    }

    #[tokio::test]
    async fn sequential_increments_lose_no_updates() {
        let dir = TempDir::new().unwrap();
        let store = setup_store(&dir);

        for _ in 0..20 {
            store
                .transact(|doc| {
                    doc.metadata.version += 1;
                    Ok(Commit::value(()))
                })
                .unwrap();
        }
        assert_eq!(store.load_fresh().unwrap().metadata.version, 20);
    }

    #[tokio::test]
    async fn concurrent_mutation_fails_fast() {
        let dir = TempDir::new().unwrap();
        let store = setup_store(&dir);

        // Hold the gate as a second in-flight mutation would
        let _guard = store.write_gate.try_lock().unwrap();

        let result: Result<()> = store.transact(|_| Ok(Commit::value(())));
        assert!(matches!(result, Err(Error::StoreBusy)));
    }

    #[tokio::test]
    async fn commit_writes_last_modified() {
        let dir = TempDir::new().unwrap();
        let store = setup_store(&dir);

        store
            .transact(|doc| {
                doc.metadata = Metadata::new();
                Ok(Commit::value(()))
            })
            .unwrap();

        assert!(store.load_fresh().unwrap().metadata.last_modified.is_some());
    }

    #[tokio::test]
    async fn cached_load_reflects_own_commit() {
        let dir = TempDir::new().unwrap();
        let store = setup_store(&dir);

        store.load().unwrap(); // warm the cache
        store
            .transact(|doc| {
                doc.metadata.version = 3;
                Ok(Commit::value(()))
            })
            .unwrap();

        // Cache was refreshed by the commit: read-your-writes
        assert_eq!(store.load().unwrap().metadata.version, 3);
    }
}
