//! Error types for gitsave
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, missing repo, missing or misplaced entries)
//! - 4: Operation failed (git error, transport failure, retries exhausted)
//! - 5: Merge conflicts against the published mainline

use std::path::PathBuf;
use thiserror::Error;

use crate::merge::ConflictReport;

/// Exit codes for the gitsave CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
    pub const CONFLICT: i32 = 5;
}

/// Main error type for gitsave operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Entry missing: {0}")]
    EntryMissing(String),

    #[error("Entry is not a directory: {0}")]
    EntryNotADirectory(String),

    #[error("Directory already exists: {0}")]
    DirectoryAlreadyExists(String),

    #[error("Repository not found at {0}")]
    RepoNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Conflicts (exit code 5)
    #[error("Merge conflicts in {0}")]
    GitConflicts(ConflictReport),

    // Operation failures (exit code 4)
    #[error("Lock {0} could not be acquired")]
    LockTimeout(String),

    #[error("Push rejected after {0} attempts")]
    PushRetriesExhausted(u32),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::EntryMissing(_)
            | Error::EntryNotADirectory(_)
            | Error::DirectoryAlreadyExists(_)
            | Error::RepoNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => exit_codes::USER_ERROR,

            Error::GitConflicts(_) => exit_codes::CONFLICT,

            // Operation failures
            Error::LockTimeout(_)
            | Error::PushRetriesExhausted(_)
            | Error::Git(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for machine-readable output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::EntryMissing(path)
            | Error::EntryNotADirectory(path)
            | Error::DirectoryAlreadyExists(path) => Some(serde_json::json!({ "path": path })),
            Error::GitConflicts(report) => serde_json::to_value(report).ok(),
            Error::InvalidConfig(message) | Error::InvalidArgument(message) => {
                Some(serde_json::json!({ "message": message }))
            }
            Error::LockTimeout(name) => Some(serde_json::json!({ "lock": name })),
            Error::PushRetriesExhausted(attempts) => {
                Some(serde_json::json!({ "attempts": attempts }))
            }
            _ => None,
        }
    }

    /// Whether this error reports a content collision with the mainline.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::GitConflicts(_))
    }
}

/// Result type alias for gitsave operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
