//! Error types for the ingestion core.
//!
//! Orchestration code (the runner, the binary) works with `anyhow::Result`;
//! the per-record parsing layer returns these typed errors so the configured
//! [`ErrorStrategy`](crate::config::ErrorStrategy) can decide whether a bad
//! line is skipped, reported, or fatal.

use std::io;

use thiserror::Error;

/// Errors raised while turning raw input into records.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The line could not be split into delimited fields.
    #[error("malformed line at row {row}: {reason}")]
    MalformedLine { row: usize, reason: String },

    /// The line split cleanly but had the wrong number of fields.
    #[error("malformed record: expected {expected} fields, found {found}")]
    MalformedRecord { expected: usize, found: usize },

    /// A synonym table could not be parsed.
    #[error("synonym table error: {0}")]
    Dictionary(String),

    /// Invalid pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl IngestError {
    /// True for errors caused by a single bad input row.
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            IngestError::MalformedLine { .. } | IngestError::MalformedRecord { .. }
        )
    }
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
