//! CLI argument definitions

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::export::OutputFormat;

#[derive(Parser)]
#[command(
    name = "crashsig",
    about = "Compute duplicate signatures for crash reports",
    after_help = "\
EXAMPLES:
    crashsig analyze --executable /usr/bin/app --signal 11 --stacktrace bt.txt --maps maps.txt
    crashsig analyze --problem-type KernelOops --oops oops.txt
    crashsig batch reports.jsonl --jobs 8
    crashsig gdb /usr/bin/app core.1234 --signal 6 --timeout 120"
)]
pub struct Args {
    /// Signature thresholds (JSON); defaults are used when omitted
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze one report given as separate text files
    Analyze(AnalyzeArgs),
    /// Analyze JSON-lines reports in parallel
    Batch(BatchArgs),
    /// Run gdb on a core file and analyze its output
    Gdb(GdbArgs),
}

/// Report metadata shared by `analyze` and `gdb`
#[derive(ClapArgs)]
pub struct ContextArgs {
    /// Problem type: Crash, KernelCrash, KernelOops, Bug or Hang
    #[arg(long, default_value = "Crash")]
    pub problem_type: String,

    /// Signal number that killed the process
    #[arg(short, long)]
    pub signal: Option<String>,

    /// Assertion message, if already known
    #[arg(long)]
    pub assertion: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(ClapArgs)]
pub struct AnalyzeArgs {
    /// Path of the crashed executable
    #[arg(short, long, default_value = "")]
    pub executable: String,

    /// gdb backtrace transcript
    #[arg(long, value_name = "FILE")]
    pub stacktrace: Option<PathBuf>,

    /// `/proc/<pid>/maps` captured at crash time
    #[arg(long, value_name = "FILE")]
    pub maps: Option<PathBuf>,

    /// Kernel oops text
    #[arg(long, value_name = "FILE")]
    pub oops: Option<PathBuf>,

    /// gdb `print` output of the assertion message variables
    #[arg(long, value_name = "FILE")]
    pub assertion_dump: Option<PathBuf>,

    #[command(flatten)]
    pub context: ContextArgs,
}

#[derive(ClapArgs)]
pub struct BatchArgs {
    /// JSON-lines file of reports (`-` for stdin)
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Worker threads
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(ClapArgs)]
pub struct GdbArgs {
    /// Crashed executable
    pub executable: PathBuf,

    /// Core dump
    pub core: PathBuf,

    /// `/proc/<pid>/maps` captured at crash time
    #[arg(long, value_name = "FILE")]
    pub maps: Option<PathBuf>,

    /// Give up on gdb after N seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub timeout: u64,

    #[command(flatten)]
    pub context: ContextArgs,
}
