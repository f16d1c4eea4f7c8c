//! # FranchiseOS Common Library
//!
//! Shared code for the FranchiseOS signage backend:
//! - The persisted document model (franchises, content, folders,
//!   assignments, OTP tokens, analytics)
//! - The document store with whole-document transactions
//! - Crash recovery, hourly backups, and schema migrations
//! - Audit logging
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
