//! Error handling and custom error types
//!
//! Provides unified error handling across the asset pipeline using thiserror.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How a failed object-store call should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Network trouble, throttling or a 5xx. Worth another attempt.
    Transient,
    /// Credentials rejected or access denied.
    PermissionDenied,
    Other,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageErrorKind::Transient => "transient",
            StorageErrorKind::PermissionDenied => "permission denied",
            StorageErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// One URL that could not be deleted during a batch deletion.
#[derive(Debug)]
pub struct DeleteFailure {
    pub url: String,
    pub error: Error,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {message}")]
    Decode { message: String },

    #[error("Image encode error: {message}")]
    Encode { message: String },

    #[error("Storage error during {operation} of '{key}' ({kind}): {message}")]
    Storage {
        operation: &'static str,
        key: String,
        kind: StorageErrorKind,
        message: String,
    },

    #[error("Asset not found: {key}")]
    AssetNotFound { key: String },

    #[error("Malformed asset URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: &'static str },

    #[error("Invalid group id '{group_id}'")]
    InvalidGroupId { group_id: String },

    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("Failed to delete {} asset(s): {}", .failures.len(), summarize(.failures))]
    BatchDelete { failures: Vec<DeleteFailure> },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    pub(crate) fn decode(err: impl fmt::Display) -> Self {
        Error::Decode {
            message: err.to_string(),
        }
    }

    pub(crate) fn encode(err: impl fmt::Display) -> Self {
        Error::Encode {
            message: err.to_string(),
        }
    }

    /// Stable name for logs and aggregate reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Decode { .. } => "decode",
            Error::Encode { .. } => "encode",
            Error::Storage { .. } => "storage_io",
            Error::AssetNotFound { .. } => "asset_not_found",
            Error::MalformedUrl { .. } => "malformed_url",
            Error::InvalidGroupId { .. } => "invalid_group_id",
            Error::InvalidKey { .. } => "invalid_key",
            Error::BatchDelete { .. } => "batch_delete",
            Error::Timeout { .. } => "timeout",
            Error::Config(_) | Error::EnvVar(_) => "config",
            Error::Invariant(_) => "invariant",
        }
    }

    /// Only transport-level storage failures are retried. Codec errors are
    /// deterministic for a given input and never qualify.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Storage {
                kind: StorageErrorKind::Transient,
                ..
            }
        )
    }
}

fn summarize(failures: &[DeleteFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.url, f.error.kind()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
