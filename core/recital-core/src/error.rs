//! Error types for recital-core operations.
//!
//! Only startup-time loading can fail. Once the coordinator is running, every
//! outcome (rejection, clamping, missing content) is a routine value.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RecitalError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Content Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Content file not found: {0}")]
    ContentNotFound(PathBuf),

    #[error("Content file malformed: {path}: {source}")]
    ContentMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using RecitalError.
pub type Result<T> = std::result::Result<T, RecitalError>;
