//! Best-effort append-only audit log
//!
//! One line per mutating operation: `[timestamp] [ACTION] {details}`.
//! Logging happens strictly after a successful commit and is decoupled from
//! transaction atomicity: a write failure here (disk full, permissions)
//! degrades to a warning and never rolls back the committed mutation.
//! There is no read API; the log exists for operational forensics only.

use chrono::Utc;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AuditLogger {
    path: PathBuf,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one audit line. Fire-and-forget: failures are logged, not
    /// returned.
    pub fn log(&self, action: &str, details: &Value) {
        let line = format!("[{}] [{}] {}\n", Utc::now().to_rfc3339(), action, details);
        if let Err(err) = self.append(&line) {
            warn!("Failed to write audit log: {}", err);
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn appends_one_line_per_event() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.log"));

        logger.log("REGISTER_FRANCHISE", &json!({"deviceId": "dev-1"}));
        logger.log("DELETE_FOLDER", &json!({"id": "folder-1"}));

        let content = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[REGISTER_FRANCHISE]"));
        assert!(lines[0].contains("dev-1"));
        assert!(lines[1].contains("[DELETE_FOLDER]"));
    }

    #[test]
    fn unwritable_path_does_not_panic() {
        let logger = AuditLogger::new("/nonexistent-dir/audit.log");
        logger.log("NOOP", &json!({}));
    }
}
