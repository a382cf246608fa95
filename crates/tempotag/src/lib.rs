//! Batch BPM tagger for audio files
//!
//! Analyzes every untagged audio file in a directory and renames it to
//! `bpm_<bpm>_<original name>`, so the tempo is visible in any file
//! browser and a re-run skips work already done.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod decode;
pub mod error;

pub use error::{Result, TagError};

#[cfg(test)]
procspawn::enable_test_support!();
