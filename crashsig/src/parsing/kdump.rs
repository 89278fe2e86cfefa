//! `crash` utility backtraces, as attached to kdump reports.
//!
//! ```text
//! PID: 0      TASK: ffffffff81c13440  CPU: 0   COMMAND: "swapper/0"
//!  #0 [ffff88003fc03d58] machine_kexec at ffffffff81036d4b
//!  #1 [ffff88003fc03db8] crash_kexec at ffffffff810c1bd2
//!  #2 [ffff88003fc03e88] oops_end at ffffffff8160d548
//! ```
//!
//! Only the function name is kept: stack and text addresses move between
//! boots and kernel builds.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Frame;

/// `#<n> [<stack address>] <function> at <text address>`
static CRASH_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*#(\d+)\s+\[[0-9a-fA-F]+\]\s+(\w+)(?:\s+at\s+([0-9a-fA-F]+))?").unwrap()
});

/// Parse the frames of a crash backtrace; other lines are skipped.
#[must_use]
pub fn parse_crash_backtrace(text: &str) -> Vec<Frame> {
    text.lines()
        .filter_map(|line| {
            let caps = CRASH_FRAME.captures(line)?;
            let index = caps[1].parse().ok()?;
            let address = match caps.get(3) {
                Some(m) => Some(u64::from_str_radix(m.as_str(), 16).ok()?),
                None => None,
            };
            Some(Frame::new(index, address, Some(caps[2].to_string()), line.trim()))
        })
        .collect()
}
