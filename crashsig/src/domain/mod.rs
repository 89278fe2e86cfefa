//! Domain model for crashsig
//!
//! This module contains core domain types and errors that provide:
//! - Plain data shared with the parsers (re-exported from `crashsig-common`)
//! - Structured error handling

pub mod errors;

// Re-export common types for convenience
pub use crashsig_common::{
    Frame, MappedRegion, ProblemContext, ProblemType, SIGABRT, SIGNAL_HANDLER_MARKER,
};

pub use errors::{BatchError, CaptureError, ConfigError, MapParseError, ReportError};

/// Canonical duplicate-identity string.
pub type Signature = String;
