//! Local file output.
//!
//! - CSV exports of the matches and seasons tables
//! - Diagnostic snapshots of fetched bundles, replayable as a source

pub mod csv;
pub mod snapshot;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}
