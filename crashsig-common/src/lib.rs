//! # Shared Data Model (Parser ↔ Signature Engine)
//!
//! Defines the plain data types passed between the text parsers, the unwind
//! filter and the signature builder. Every type here is created fresh for a
//! single report and discarded once its signatures have been computed; nothing
//! is cached across reports.
//!
//! ## Key Types
//!
//! - [`Frame`] - One parsed stack frame (debugger transcript or kernel oops)
//! - [`MappedRegion`] - One `/proc/pid/maps` range
//! - [`ProblemType`] - Kind of report (`Crash`, `KernelOops`, ...)
//! - [`ProblemContext`] - Report metadata consumed by the signature builder
//!
//! The optional `serde` feature derives `Serialize`/`Deserialize` for all of them.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Text gdb prints in place of a function name for a signal trampoline frame.
pub const SIGNAL_HANDLER_MARKER: &str = "<signal handler called>";

/// Signal number (as reported by the kernel) of `SIGABRT`.
///
/// Only aborts are eligible for assertion-message signatures.
pub const SIGABRT: &str = "6";

// ============================================================================
// Frame
// ============================================================================

/// A single stack frame, normalized from debugger or kernel oops text.
///
/// Frames are ordered the way the debugger printed them: index 0 is the
/// innermost frame (the crash site).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    /// Frame number as printed by the debugger (`#3` → 3)
    pub index: u32,

    /// Program counter of the frame, when the debugger printed one
    ///
    /// gdb omits the address for frame 0 when the pc sits exactly at the
    /// start of a line, so this is routinely `None` for the innermost frame.
    pub raw_address: Option<u64>,

    /// Function name without argument list; `None` when unresolved (`??`)
    pub function: Option<String>,

    /// Whether this frame is gdb's `<signal handler called>` trampoline
    pub is_signal_marker: bool,

    /// Full frame text after the address (function, arguments, location)
    pub description: String,
}

impl Frame {
    /// Create a frame with a resolved or unresolved function name.
    #[must_use]
    pub fn new(
        index: u32,
        raw_address: Option<u64>,
        function: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        Self { index, raw_address, function, is_signal_marker: false, description: description.into() }
    }

    /// Create a `<signal handler called>` marker frame.
    #[must_use]
    pub fn signal_marker(index: u32, raw_address: Option<u64>) -> Self {
        Self {
            index,
            raw_address,
            function: None,
            is_signal_marker: true,
            description: SIGNAL_HANDLER_MARKER.to_string(),
        }
    }

    /// Function name, or `None` for markers and unresolved frames.
    #[must_use]
    pub fn function_name(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// Returns true if the debugger could not name this frame.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        !self.is_signal_marker && self.function.is_none()
    }
}

// ============================================================================
// Mapped Region
// ============================================================================

/// One address range from a process memory map.
///
/// `end` is treated as an inclusive bound, matching how report tooling has
/// historically compared addresses against `/proc/pid/maps` ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MappedRegion {
    pub start: u64,
    pub end: u64,
    /// Backing file path; `None` for anonymous or unparsable entries
    pub module: Option<String>,
}

impl MappedRegion {
    /// Check if an address falls within this region (inclusive of `end`)
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr <= self.end
    }
}

// ============================================================================
// Problem Type
// ============================================================================

/// Kind of problem a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProblemType {
    /// User-space process killed by a signal
    #[default]
    Crash,
    /// Kernel crash dump (kdump)
    KernelCrash,
    /// Kernel oops
    KernelOops,
    /// Manually filed bug, no crash data
    Bug,
    /// Hung process
    Hang,
}

impl ProblemType {
    /// Literal name used in report metadata.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemType::Crash => "Crash",
            ProblemType::KernelCrash => "KernelCrash",
            ProblemType::KernelOops => "KernelOops",
            ProblemType::Bug => "Bug",
            ProblemType::Hang => "Hang",
        }
    }

    /// Returns true for kernel-side problems (signatures never carry an executable path).
    #[must_use]
    pub fn is_kernel(self) -> bool {
        matches!(self, ProblemType::KernelCrash | ProblemType::KernelOops)
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a `ProblemType` string is not one of the known names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProblemType(pub String);

impl fmt::Display for UnknownProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown problem type '{}'", self.0)
    }
}

impl std::error::Error for UnknownProblemType {}

impl FromStr for ProblemType {
    type Err = UnknownProblemType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Crash" => Ok(ProblemType::Crash),
            "KernelCrash" => Ok(ProblemType::KernelCrash),
            "KernelOops" => Ok(ProblemType::KernelOops),
            "Bug" => Ok(ProblemType::Bug),
            "Hang" => Ok(ProblemType::Hang),
            other => Err(UnknownProblemType(other.to_string())),
        }
    }
}

// ============================================================================
// Problem Context
// ============================================================================

/// Read-only report metadata needed to build signatures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProblemContext {
    pub problem_type: ProblemType,
    pub executable_path: String,
    /// Signal number as a decimal string (`"11"` for SIGSEGV)
    pub signal: Option<String>,
    pub assertion_message: Option<String>,

    /// Precomputed signature that overrides every computed one
    pub duplicate_signature: Option<String>,
    /// Kernel failure description (e.g. `"suspend/resume"`)
    pub failure: Option<String>,
    pub machine_type: Option<String>,
    pub bios_version: Option<String>,
}

impl ProblemContext {
    /// Context for a signal crash of `executable_path`.
    #[must_use]
    pub fn crash(executable_path: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            problem_type: ProblemType::Crash,
            executable_path: executable_path.into(),
            signal: Some(signal.into()),
            ..Self::default()
        }
    }

    /// Context for a kernel oops.
    #[must_use]
    pub fn kernel_oops() -> Self {
        Self { problem_type: ProblemType::KernelOops, ..Self::default() }
    }

    /// Attach an assertion message.
    #[must_use]
    pub fn with_assertion(mut self, message: impl Into<String>) -> Self {
        self.assertion_message = Some(message.into());
        self
    }

    /// Returns true if the process died from `SIGABRT`.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        self.signal.as_deref().map(str::trim) == Some(SIGABRT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_type_round_trip_names() {
        for ty in [
            ProblemType::Crash,
            ProblemType::KernelCrash,
            ProblemType::KernelOops,
            ProblemType::Bug,
            ProblemType::Hang,
        ] {
            assert_eq!(ty.as_str().parse::<ProblemType>(), Ok(ty));
        }
    }

    #[test]
    fn test_problem_type_rejects_unknown() {
        let err = "Segfault".parse::<ProblemType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown problem type 'Segfault'");
    }

    #[test]
    fn test_region_end_is_inclusive() {
        let region =
            MappedRegion { start: 0x1000, end: 0x1fff, module: Some("/bin/app".to_string()) };

        assert!(region.contains(0x1000));
        assert!(region.contains(0x1fff));
        assert!(!region.contains(0x0fff));
        assert!(!region.contains(0x2000));
    }

    #[test]
    fn test_signal_marker_is_not_unresolved() {
        let marker = Frame::signal_marker(2, Some(0x7f00));
        assert!(marker.is_signal_marker);
        assert!(!marker.is_unresolved());
        assert_eq!(marker.description, SIGNAL_HANDLER_MARKER);

        let unknown = Frame::new(3, Some(0x4000), None, "?? ()");
        assert!(unknown.is_unresolved());
    }

    #[test]
    fn test_is_abort() {
        assert!(ProblemContext::crash("/usr/bin/app", "6").is_abort());
        assert!(!ProblemContext::crash("/usr/bin/app", "11").is_abort());
        assert!(!ProblemContext::kernel_oops().is_abort());
    }
}
