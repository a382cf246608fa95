//! Error types for the tagging pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while tagging a directory of audio files
///
/// Everything except [`TagError::Directory`] is scoped to a single file:
/// the batch keeps running and the failed file is reported and left
/// untouched at its original path.
#[derive(Error, Debug)]
pub enum TagError {
    /// The target directory cannot be enumerated. Fatal for the whole run.
    #[error("failed to read directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("decoded audio contains no samples")]
    EmptySignal,

    #[error("estimation failed: {0}")]
    Estimation(String),

    #[error("failed to rename {path}: {source}")]
    Rename {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl TagError {
    /// Name of the pipeline stage this error terminated, for per-file
    /// log lines and outcome reports.
    pub fn stage(&self) -> &'static str {
        match self {
            TagError::Directory { .. } => "scanning",
            TagError::Read { .. } => "reading",
            TagError::Decode(_) => "decoding",
            TagError::EmptySignal => "downmixing",
            TagError::Estimation(_) => "estimating",
            TagError::Rename { .. } => "renaming",
        }
    }
}

pub type Result<T> = std::result::Result<T, TagError>;
