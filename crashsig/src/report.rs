//! # Report Analysis Pipeline
//!
//! Wires the parsers, the unwind filter and the signature builder together
//! for a single report:
//!
//! ```text
//! Stacktrace ──► parse_stacktrace ──► UnwindFilter ──► StacktraceTop
//!      │                                   │
//!      │                                   ▼
//!      │                          SignatureBuilder ──► CrashSignature
//!      │                                   ▲
//!      └──────────► all frames ────────────┤
//! ProcMaps ────► MemoryMapTable ───────────┴─────────► CrashSignatureAddresses
//! ```
//!
//! Every call builds its own state (frames, map table) and drops it on
//! return, so one analyzer can be shared by any number of threads.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::{extract_assertion_message, SignatureBuilder};
use crate::classification::{stacktrace_top, UnwindFilter};
use crate::config::SignatureConfig;
use crate::domain::{ProblemContext, ProblemType, ReportError};
use crate::parsing::{parse_crash_backtrace, parse_oops, parse_stacktrace};
use crate::symbolization::MemoryMapTable;

/// Text gdb prints when the core file was cut short.
pub const TRUNCATED_CORE_MARKER: &str = "is truncated: expected core file size";

/// Raw report material handed over by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportInput {
    pub context: ProblemContext,
    /// gdb `bt full` (or `bt`) transcript
    pub stacktrace: Option<String>,
    /// `/proc/pid/maps` at crash time
    pub proc_maps: Option<String>,
    /// Kernel oops text
    pub oops_text: Option<String>,
    /// gdb `print` output for the abort/assert message variables
    pub assertion_dump: Option<String>,
}

/// Everything the engine derives from a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportSignatures {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace_top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_signature_addresses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_message: Option<String>,
    /// Why the maps text was unusable; the address signature was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_error: Option<String>,
}

/// Runs the signature pipeline for one report at a time.
#[derive(Debug, Clone, Default)]
pub struct ReportAnalyzer {
    config: SignatureConfig,
}

impl ReportAnalyzer {
    #[must_use]
    pub fn new(config: SignatureConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Analyze one report.
    ///
    /// # Errors
    /// Returns [`ReportError::InvalidCoreDump`] if the debugger reported a
    /// truncated core. Malformed maps text is not an error: the address
    /// signature is skipped and the symbolic one still computed.
    pub fn analyze(&self, input: &ReportInput) -> Result<ReportSignatures, ReportError> {
        let stacktrace = input.stacktrace.as_deref().unwrap_or("");
        if stacktrace.contains(TRUNCATED_CORE_MARKER) {
            return Err(ReportError::InvalidCoreDump);
        }

        let mut ctx = input.context.clone();
        let mut signatures = ReportSignatures::default();

        if matches!(ctx.problem_type, ProblemType::Bug | ProblemType::Hang) {
            debug!("{} report: signatures are left to the bug pattern matcher", ctx.problem_type);
            return Ok(signatures);
        }

        // An unknown signal counts as SIGABRT
        if ctx.assertion_message.is_none() && (ctx.signal.is_none() || ctx.is_abort()) {
            ctx.assertion_message =
                input.assertion_dump.as_deref().and_then(extract_assertion_message);
        }
        signatures.assertion_message.clone_from(&ctx.assertion_message);

        // Kernel stacktraces come from the crash utility, not gdb
        let (frames, kernel_frames) = if ctx.problem_type.is_kernel() {
            let kernel_frames = match &input.oops_text {
                Some(text) => parse_oops(text),
                None if ctx.problem_type == ProblemType::KernelCrash => {
                    parse_crash_backtrace(stacktrace)
                }
                None => Vec::new(),
            };
            (Vec::new(), kernel_frames)
        } else {
            (parse_stacktrace(stacktrace), Vec::new())
        };

        let top = UnwindFilter::with_max_frames(self.config.top_frames).apply(&frames);
        if !top.is_empty() {
            signatures.stacktrace_top = Some(stacktrace_top(&top));
        }

        let builder = SignatureBuilder::new(&self.config);
        signatures.crash_signature = builder.crash_signature(&ctx, &top, &kernel_frames);

        // Symbols were insufficient: fall back to module offsets
        let symbolic = builder.build_symbolic(&ctx, &top);
        if ctx.problem_type == ProblemType::Crash && symbolic.is_none() {
            if let Some(maps_text) = input.proc_maps.as_deref() {
                match MemoryMapTable::build(maps_text) {
                    Ok(maps) => {
                        signatures.crash_signature_addresses =
                            builder.build_address(&ctx, &frames, &maps);
                    }
                    Err(e) => {
                        warn!("Skipping address signature for {}: {e}", ctx.executable_path);
                        signatures.map_error = Some(e.to_string());
                    }
                }
            }
        }

        info!(
            "Analyzed {} report for {}: {} frames, {} retained, signature {}",
            ctx.problem_type,
            ctx.executable_path,
            frames.len() + kernel_frames.len(),
            top.len(),
            if signatures.crash_signature.is_some() { "found" } else { "missing" },
        );

        Ok(signatures)
    }
}
