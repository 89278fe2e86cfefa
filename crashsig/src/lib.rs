//! # crashsig - Crash Report Duplicate Signatures
//!
//! crashsig turns raw crash report material (gdb backtraces, `/proc/pid/maps`,
//! kernel oops dumps) into short canonical strings that are identical for
//! every report of the same bug, so reports from many machines can be
//! clustered without a human reading each one.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │           Host (debugger capture, report storage)            │
//! └──────────────┬───────────────────────────────┬───────────────┘
//!                │ gdb transcript / oops text     │ /proc/pid/maps
//!                ▼                                ▼
//!        ┌──────────────┐                ┌────────────────┐
//!        │   parsing    │                │ symbolization  │
//!        │ (gdb, oops)  │                │ MemoryMapTable │
//!        └──────┬───────┘                └───────┬────────┘
//!               │ Vec<Frame>                     │
//!               ▼                                │
//!        ┌──────────────┐                        │
//!        │classification│ unwind noise           │
//!        │ UnwindFilter │ (top 5 frames)         │
//!        └──────┬───────┘                        │
//!               ▼                                ▼
//!        ┌─────────────────────────────────────────────┐
//!        │      analysis::SignatureBuilder             │
//!        │  symbolic  │  address fallback  │  kernel   │
//!        └─────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`parsing`]: gdb backtrace, kernel oops and kdump backtrace parsers
//! - [`symbolization`]: `/proc/pid/maps` table, address → module + offset
//! - [`classification`]: frame classes and the unwind state machine
//! - [`analysis`]: signature grammar and assertion message extraction
//! - [`report`]: single-report pipeline ([`report::ReportAnalyzer`])
//! - [`batch`]: parallel analysis of many reports
//! - [`capture`]: cancellable debugger invocation
//! - [`config`]: tunable thresholds
//! - [`export`]: JSON and text output
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: shared types and errors
//!
//! ## Signature Kinds
//!
//! 1. **Symbolic** (`/usr/bin/app:11:do_work:main`): function names of the
//!    unwound top frames. Preferred, and refused if any frame is unnamed.
//! 2. **Address** (`/usr/bin/app:11:/usr/bin/app..1a2b:...`): module offsets,
//!    stable under ASLR. Only computed when the symbolic signature fails.
//! 3. **Assertion** (`/usr/bin/app:Assertion ... failed`): for aborts.
//! 4. **Kernel** (`kernel:foo+0x1/0x10:bar+0x2/0x20`): for oopses and kdumps.
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! let analyzer = ReportAnalyzer::default();
//! let signatures = analyzer.analyze(&ReportInput {
//!     context: ProblemContext::crash("/usr/bin/app", "11"),
//!     stacktrace: Some(gdb_output),
//!     proc_maps: Some(maps),
//!     ..ReportInput::default()
//! })?;
//! ```

pub mod analysis;
pub mod batch;
pub mod capture;
pub mod classification;
pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod parsing;
pub mod report;
pub mod symbolization;
