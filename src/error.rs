//! Error types for assetdeps.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring, scanning, persisting or querying.
///
/// Per-file read failures during a scan are not surfaced here; they are
/// logged and the file is skipped. Cancellation is not an error either.
#[derive(Debug, Error)]
pub enum AssetDepsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid ignore pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid file filter `{filter}`: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: globset::Error,
    },

    #[error("config error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot format {found} is not supported (expected {expected})")]
    IncompatibleSnapshot { found: u32, expected: u32 },

    #[error("no node matches `{0}`")]
    UnknownNode(String),

    #[error("nothing has been scanned yet")]
    NotScanned,

    #[error("package source failed: {0}")]
    PackageSource(String),
}

/// Result type alias using [`AssetDepsError`].
pub type Result<T> = std::result::Result<T, AssetDepsError>;
