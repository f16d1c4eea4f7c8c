//! Document store, recovery, migrations and audit logging

pub mod audit;
pub mod backup;
pub mod init;
pub mod migrations;
pub mod models;
pub mod store;

pub use audit::AuditLogger;
pub use backup::{spawn_backup_scheduler, BackupManager};
pub use init::open_store;
pub use migrations::{run_migrations, MIGRATIONS};
pub use models::*;
pub use store::{Commit, DocumentStore};
