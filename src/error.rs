//! Error types for taskmirror
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (validation, bad args, no signed-in owner)
//! - 3: Blocked by the store (permission denied)
//! - 4: Operation failed (transport, io, missing record)

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the taskmirror CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const PERMISSION_DENIED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Failure reported by a remote document store.
///
/// Permission and transport failures stay distinguishable from a missing
/// record so callers can decide whether a retry makes sense.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Write-through operation that was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WriteOp::Create => "create",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Main error type for taskmirror operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No signed-in owner")]
    NotBound,

    // Store failures (exit code 3 or 4 depending on the remote cause)
    #[error("Write rejected ({op}): {source}")]
    Write {
        op: WriteOp,
        #[source]
        source: RemoteError,
    },

    #[error("Subscription failed: {0}")]
    Subscription(RemoteError),

    #[error("Timed out waiting for the first snapshot after {0} ms")]
    SyncTimeout(u64),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    pub fn write(op: WriteOp, source: RemoteError) -> Self {
        Error::Write { op, source }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::Validation(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::NotBound => exit_codes::USER_ERROR,

            Error::Write { source, .. } | Error::Subscription(source) => match source {
                RemoteError::PermissionDenied(_) => exit_codes::PERMISSION_DENIED,
                RemoteError::NotFound(_) | RemoteError::Transport(_) => {
                    exit_codes::OPERATION_FAILED
                }
            },

            // Operation failures
            Error::SyncTimeout(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Watch(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Write { op, source } => Some(serde_json::json!({
                "op": op.to_string(),
                "remote": remote_kind(source),
            })),
            Error::Subscription(source) => Some(serde_json::json!({
                "remote": remote_kind(source),
            })),
            Error::LockFailed(path) => Some(serde_json::json!({
                "path": path.to_string_lossy(),
            })),
            _ => None,
        }
    }
}

fn remote_kind(err: &RemoteError) -> &'static str {
    match err {
        RemoteError::PermissionDenied(_) => "permission_denied",
        RemoteError::NotFound(_) => "not_found",
        RemoteError::Transport(_) => "transport",
    }
}

/// Result type alias for taskmirror operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_remote_cause() {
        let denied = Error::write(
            WriteOp::Create,
            RemoteError::PermissionDenied("tasks".to_string()),
        );
        assert_eq!(denied.exit_code(), exit_codes::PERMISSION_DENIED);

        let missing = Error::write(WriteOp::Update, RemoteError::NotFound("t1".to_string()));
        assert_eq!(missing.exit_code(), exit_codes::OPERATION_FAILED);

        assert_eq!(
            Error::Validation("title".to_string()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(Error::NotBound.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn write_error_details_name_op_and_cause() {
        let err = Error::write(WriteOp::Delete, RemoteError::Transport("offline".to_string()));
        let details = err.details().expect("details");
        assert_eq!(details["op"], "delete");
        assert_eq!(details["remote"], "transport");
        assert!(err.to_string().contains("delete"));
    }
}
