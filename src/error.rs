//! Error types for cdo
//!
//! Command-level failures (bad format, failed validation, missing tasks)
//! never surface here: the engine converts them to response strings. This
//! enum covers the faults that must stop a command instead of producing a
//! reply, mostly I/O and store corruption.
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad CLI args, missing directory)
//! - 4: Operation failed (I/O error, corrupt store file)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the cdo CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for cdo operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt store file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Identity keys exhausted")]
    IdSpaceExhausted,

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotADirectory(_) | Error::InvalidArgument(_) => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::Corrupt { .. }
            | Error::IdSpaceExhausted
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Build a corruption error for a store file
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for cdo operations
pub type Result<T> = std::result::Result<T, Error>;
