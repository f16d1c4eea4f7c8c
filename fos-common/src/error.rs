//! Common error types for FranchiseOS

use thiserror::Error;

/// Common result type for FranchiseOS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared across the persistence core and the service layer
///
/// The OTP and store variants are expected, recoverable-by-caller
/// conditions; the route layer translates them into client-facing
/// responses. `Corrupt` is handled internally by recovery at startup and
/// never escapes it.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique-key violation (e.g. deviceId already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A mutation is already in flight; caller should retry
    #[error("Store is busy. Try again later.")]
    StoreBusy,

    /// Persisted document failed to deserialize
    #[error("Corrupt document: {0}")]
    Corrupt(String),

    /// A migration step failed; logged and skipped at startup
    #[error("Migration v{version} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    /// OTP record missing or past its expiry
    #[error("OTP expired or not found. Please request a new OTP.")]
    OtpExpired,

    /// OTP record exhausted its allowed attempts
    #[error("Too many failed attempts. Please request a new OTP.")]
    OtpExhausted,

    /// Wrong OTP code; carries how many attempts remain
    #[error("Invalid OTP. {remaining} attempts remaining.")]
    OtpMismatch { remaining: u32 },

    /// SMS dispatch collaborator reported failure
    #[error("SMS dispatch failed: {0}")]
    DispatchFailed(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
