//! Error types for sigforge.
//!
//! Parsing is lenient and generation is fail-soft: individual bad lines and
//! unresolvable targets degrade into counters and partial results. Only a
//! fully unrecognizable listing and invalid option combinations surface as
//! hard errors.

use thiserror::Error;

/// Primary error type for signature generation.
#[derive(Debug, Error)]
pub enum SigforgeError {
    /// IO error during file operations (CLI only; the core opens no files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No line of the input matched any known listing format.
    #[error("unrecognized listing: no line matches any format (best guess {best_guess}, {matched}/{scanned} lines)")]
    UnrecognizedListing {
        best_guess: String,
        matched: usize,
        scanned: usize,
    },

    /// A byte field is not a valid hex sequence or exceeds the x86 limit.
    ///
    /// Never propagated out of `parse`; offending lines are dropped and
    /// counted in `ParseStats::dropped`.
    #[error("invalid byte field {field:?}: {reason}")]
    InvalidBytes { field: String, reason: String },

    /// A caller-supplied target did not resolve to any instruction.
    ///
    /// Recorded in `GenerationResult::unresolved`; the rest of the batch
    /// proceeds.
    #[error("unknown target {target:?}")]
    UnknownTarget { target: String },

    /// Invalid option combination (e.g. `min_length > max_length`).
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },

    /// Unknown export format name.
    #[error("unknown export format {name:?}")]
    UnknownExportFormat { name: String },

    /// JSON serialization failure in a formatter.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for sigforge operations.
pub type Result<T> = std::result::Result<T, SigforgeError>;
