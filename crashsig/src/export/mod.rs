//! Signature output formats
//!
//! - **JSON**: one object with report field names, for machine consumers
//! - **Text**: `Key: value` lines in problem report style, multi-line values
//!   indented by one space

use clap::ValueEnum;
use std::io::Write;

use crate::batch::BatchOutcome;
use crate::report::ReportSignatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

/// Write the signatures of one report.
///
/// # Errors
/// Returns an error if writing or serialization fails.
pub fn write_signatures(
    out: &mut impl Write,
    signatures: &ReportSignatures,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, signatures)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            let fields = [
                ("AssertionMessage", &signatures.assertion_message),
                ("CrashSignature", &signatures.crash_signature),
                ("CrashSignatureAddresses", &signatures.crash_signature_addresses),
                ("MapError", &signatures.map_error),
                ("StacktraceTop", &signatures.stacktrace_top),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    write_field(out, key, value)?;
                }
            }
        }
    }
    Ok(())
}

/// Write batch outcomes as JSON lines, one per input report.
///
/// # Errors
/// Returns an error if writing or serialization fails.
pub fn write_outcomes(out: &mut impl Write, outcomes: &[BatchOutcome]) -> anyhow::Result<()> {
    for outcome in outcomes {
        serde_json::to_writer(&mut *out, outcome)?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_field(out: &mut impl Write, key: &str, value: &str) -> std::io::Result<()> {
    if value.contains('\n') {
        writeln!(out, "{key}:")?;
        for line in value.lines() {
            writeln!(out, " {line}")?;
        }
    } else {
        writeln!(out, "{key}: {value}")?;
    }
    Ok(())
}
