//! # crashsig - Main Entry Point
//!
//! Three subcommands:
//! - **analyze**: one report from separate files (transcript, maps, oops)
//! - **batch**: JSON-lines reports on a worker pool, JSON-lines outcomes
//! - **gdb**: run gdb on a core file, then analyze its output

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{after, never, Receiver};
use log::info;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crashsig::batch::{analyze_batch, CancelToken};
use crashsig::capture::{capture_transcript, gdb_command};
use crashsig::cli::{AnalyzeArgs, Args, BatchArgs, Command, ContextArgs, GdbArgs};
use crashsig::config::SignatureConfig;
use crashsig::domain::{ProblemContext, ProblemType, ReportError};
use crashsig::export::{write_outcomes, write_signatures};
use crashsig::report::{ReportAnalyzer, ReportInput};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_INVALID_CORE: i32 = 65;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ReportError>() {
        Some(ReportError::InvalidCoreDump) => EXIT_INVALID_CORE,
        Some(ReportError::UnknownProblemType(_)) => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SignatureConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SignatureConfig::default(),
    };
    let analyzer = ReportAnalyzer::new(config);

    match args.command {
        Command::Analyze(analyze) => run_analyze(&analyzer, &analyze),
        Command::Batch(batch) => run_batch(&analyzer, &batch),
        Command::Gdb(gdb) => run_gdb(&analyzer, &gdb),
    }
}

fn run_analyze(analyzer: &ReportAnalyzer, args: &AnalyzeArgs) -> Result<()> {
    let input = ReportInput {
        context: problem_context(&args.context, args.executable.clone())?,
        stacktrace: read_optional(args.stacktrace.as_deref())?,
        proc_maps: read_optional(args.maps.as_deref())?,
        oops_text: read_optional(args.oops.as_deref())?,
        assertion_dump: read_optional(args.assertion_dump.as_deref())?,
    };

    let signatures = analyzer.analyze(&input)?;
    let mut stdout = io::stdout().lock();
    write_signatures(&mut stdout, &signatures, args.context.format)?;
    stdout.flush()?;
    Ok(())
}

fn run_batch(analyzer: &ReportAnalyzer, args: &BatchArgs) -> Result<()> {
    let reader: Box<dyn BufRead> = if args.input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = fs::File::open(&args.input)
            .with_context(|| format!("Failed to open {}", args.input.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut inputs = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let input: ReportInput = serde_json::from_str(&line)
            .with_context(|| format!("Invalid report on line {}", number + 1))?;
        inputs.push(input);
    }

    let start = Instant::now();
    let outcomes = analyze_batch(analyzer, &inputs, args.jobs, &CancelToken::new())?;
    info!("Analyzed {} reports in {:?}", inputs.len(), start.elapsed());

    let mut stdout = io::stdout().lock();
    write_outcomes(&mut stdout, &outcomes)?;
    stdout.flush()?;
    Ok(())
}

fn run_gdb(analyzer: &ReportAnalyzer, args: &GdbArgs) -> Result<()> {
    let executable = args.executable.to_string_lossy().into_owned();
    let cancel: Receiver<Instant> =
        if args.timeout == 0 { never() } else { after(Duration::from_secs(args.timeout)) };

    let transcript = capture_transcript(gdb_command(&args.executable, &args.core), &cancel)
        .context("Failed to capture gdb backtrace")?;

    let input = ReportInput {
        context: problem_context(&args.context, executable)?,
        assertion_dump: Some(transcript.clone()),
        stacktrace: Some(transcript),
        proc_maps: read_optional(args.maps.as_deref())?,
        oops_text: None,
    };

    let signatures = analyzer.analyze(&input)?;
    let mut stdout = io::stdout().lock();
    write_signatures(&mut stdout, &signatures, args.context.format)?;
    stdout.flush()?;
    Ok(())
}

fn problem_context(args: &ContextArgs, executable_path: String) -> Result<ProblemContext> {
    let problem_type: ProblemType = args
        .problem_type
        .parse()
        .map_err(|_| ReportError::UnknownProblemType(args.problem_type.clone()))?;

    Ok(ProblemContext {
        problem_type,
        executable_path,
        signal: args.signal.clone(),
        assertion_message: args.assertion.clone(),
        ..ProblemContext::default()
    })
}

fn read_optional(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|p| fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display())))
        .transpose()
}
