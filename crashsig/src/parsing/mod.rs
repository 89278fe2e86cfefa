//! Text parsers that normalize debugger and kernel output into [`Frame`]s.
//!
//! - [`gdb`]: gdb `bt` transcripts (`#3  0x... in foo (x=1) at foo.c:12`)
//! - [`oops`]: kernel oops dumps (`IP:`, `Call Trace:` and continuation lines)
//! - [`kdump`]: `crash` utility backtraces from kernel crash dumps
//!
//! All return the same shape so the unwind filter and the signature builder
//! don't care where a frame came from. No parser ever fails: lines they
//! don't recognise are skipped.
//!
//! [`Frame`]: crate::domain::Frame

pub mod gdb;
pub mod kdump;
pub mod oops;

pub use gdb::{parse_line, parse_stacktrace};
pub use kdump::parse_crash_backtrace;
pub use oops::parse_oops;
