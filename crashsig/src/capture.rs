//! Debugger output capture.
//!
//! Running gdb against a core can take minutes (symbol loading, large
//! cores). The wait happens on reader threads while the caller blocks in a
//! `select!` over the output and a cancel channel, so a user-driven cancel
//! kills the debugger instead of leaving the caller stuck.

use crossbeam_channel::{bounded, select, Receiver};
use log::{info, warn};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;

use crate::domain::CaptureError;

/// gdb `print` commands for the C library and glib assertion strings.
const ASSERTION_PRINTS: &[&str] =
    &["print (char*) __abort_msg->msg", "print (char*) __glib_assert_msg"];

/// Build a batch-mode gdb invocation printing a full backtrace and the
/// assertion message variables of `core`.
#[must_use]
pub fn gdb_command(executable: &Path, core: &Path) -> Command {
    let mut command = Command::new("gdb");
    command.args(["--batch", "--nx", "--ex", "set width 0", "--ex", "set pagination off"]);
    command.args(["--ex", "bt full"]);
    for print in ASSERTION_PRINTS {
        command.args(["--ex", print]);
    }
    command.arg(executable).arg(core);
    command
}

/// Run `command` and return its stdout followed by its stderr.
///
/// gdb reports truncated cores on stderr, so both streams are kept.
///
/// # Errors
/// - [`CaptureError::SpawnFailed`] if the program can't be started
/// - [`CaptureError::Failed`] on a non-zero exit status
/// - [`CaptureError::Cancelled`] if `cancel` received a message first; the
///   child is killed. Pass [`crossbeam_channel::after`] for a timeout or
///   [`crossbeam_channel::never`] to wait indefinitely.
pub fn capture_output<T>(
    mut command: Command,
    cancel: &Receiver<T>,
) -> Result<String, CaptureError> {
    let program = command.get_program().to_string_lossy().into_owned();
    command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|error| CaptureError::SpawnFailed { program: program.clone(), error })?;
    info!("Started {program} (pid {})", child.id());

    let (done_tx, done_rx) = bounded::<std::io::Result<(String, String)>>(1);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    thread::spawn(move || {
        let err_reader = thread::spawn(move || read_stream(stderr));
        let out = read_stream(stdout);
        let err = err_reader.join().unwrap_or_else(|_| Ok(String::new()));
        let _ = done_tx.send(out.and_then(|out| err.map(|err| (out, err))));
    });

    select! {
        recv(done_rx) -> streams => finish(&program, &mut child, streams.ok()),
        recv(cancel) -> msg => {
            if msg.is_err() {
                // Cancel sender dropped without cancelling: keep waiting
                return finish(&program, &mut child, done_rx.recv().ok());
            }
            warn!("Cancelling {program} (pid {})", child.id());
            // The child may already have exited on its own
            let _ = child.kill();
            let _ = child.wait();
            Err(CaptureError::Cancelled)
        }
    }
}

/// Run a debugger batch command and return its transcript.
///
/// `gdb --batch` exits non-zero when any `--ex` command failed, e.g. a
/// `print` of a symbol the program doesn't have. The transcript is still
/// returned then, as long as there is one.
///
/// # Errors
/// As [`capture_output`], except that [`CaptureError::Failed`] is only
/// returned when the debugger printed nothing.
pub fn capture_transcript<T>(
    command: Command,
    cancel: &Receiver<T>,
) -> Result<String, CaptureError> {
    match capture_output(command, cancel) {
        Err(CaptureError::Failed { program, status, output }) if !output.trim().is_empty() => {
            warn!("{program} exited with {status}, keeping its output");
            Ok(output)
        }
        result => result,
    }
}

fn read_stream(stream: Option<impl Read>) -> std::io::Result<String> {
    let mut buf = String::new();
    if let Some(mut stream) = stream {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        buf = String::from_utf8_lossy(&bytes).into_owned();
    }
    Ok(buf)
}

fn finish(
    program: &str,
    child: &mut Child,
    streams: Option<std::io::Result<(String, String)>>,
) -> Result<String, CaptureError> {
    let (stdout, stderr) = streams.ok_or(CaptureError::WorkerLost)??;
    let status = child.wait()?;
    let output = stdout + &stderr;
    if !status.success() {
        return Err(CaptureError::Failed { program: program.to_string(), status, output });
    }
    Ok(output)
}
