//! Signature analysis
//!
//! Pure logic turning parsed frames and report metadata into duplicate
//! signatures, separated from text parsing and from the report pipeline.

pub mod assertion;
pub mod signature;

pub use assertion::extract_assertion_message;
pub use signature::{normalize_addresses, SignatureBuilder};
