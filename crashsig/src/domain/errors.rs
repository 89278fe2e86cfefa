//! Structured error types for crashsig
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

/// The memory map text contained no usable line at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapParseError {
    #[error("No valid memory map lines found ({lines} non-blank lines examined)")]
    NoValidLines { lines: usize },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Core dump is truncated (debugger reported an unexpected core file size)")]
    InvalidCoreDump,

    #[error("Unknown problem type: {0}")]
    UnknownProblemType(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid signature config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to spawn {program}: {error}")]
    SpawnFailed { program: String, error: std::io::Error },

    /// `output` is stdout followed by stderr, as far as the program got
    #[error("{program} exited with {status}")]
    Failed { program: String, status: std::process::ExitStatus, output: String },

    #[error("Capture cancelled")]
    Cancelled,

    #[error("Capture worker exited without reporting")]
    WorkerLost,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Batch worker panicked")]
    WorkerPanicked,
}
