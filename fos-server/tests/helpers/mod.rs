//! Shared test harness for fos-server integration tests
//!
//! Each integration binary uses a different slice of this module.
#![allow(dead_code)]

use axum::async_trait;
use fos_common::db::open_store;
use fos_common::db::store::DocumentStore;
use fos_common::{Error, Result};
use fos_server::api::{build_router, AppState};
use fos_server::sms::SmsSender;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Admin key used by the test router
pub const TEST_API_KEY: &str = "test-api-key";

/// Records every dispatched code; optionally fails on demand
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: Mutex<bool>,
}

impl RecordingSender {
    /// The code most recently dispatched to `phone`
    pub fn last_code_for(&self, phone: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == phone)
            .map(|(_, code)| code.clone())
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl SmsSender for RecordingSender {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(Error::DispatchFailed("carrier unreachable".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), code.to_string()));
        Ok(())
    }
}

/// A fresh store in a temp directory plus the recording SMS sender.
///
/// The TempDir must stay alive for the duration of the test.
pub fn setup_state(dir: &TempDir) -> (AppState, Arc<DocumentStore>, Arc<RecordingSender>) {
    let (store, _backups) = open_store(dir.path()).expect("open store");
    let store = Arc::new(store);
    let sender = Arc::new(RecordingSender::default());
    let state = AppState::new(
        Arc::clone(&store),
        Arc::clone(&sender) as Arc<dyn SmsSender>,
        TEST_API_KEY.to_string(),
    );
    (state, store, sender)
}

/// Router over a fresh store
pub fn setup_app(dir: &TempDir) -> (axum::Router, Arc<DocumentStore>, Arc<RecordingSender>) {
    let (state, store, sender) = setup_state(dir);
    (build_router(state), store, sender)
}
