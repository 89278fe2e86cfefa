//! gdb backtrace line parser.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::domain::{Frame, SIGNAL_HANDLER_MARKER};

/// `#3  0x00007f... in foo (x=1) at foo.c:12` or `#2  <signal handler called>`
static FRAME_WITH_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^#(\d+)\s+(?:0x([0-9a-fA-F]+)\s+in\s+\*?(.*)|(<signal handler called>)\s*)$",
    )
    .unwrap()
});

/// `#0  foo (x=1) at foo.c:12` (gdb drops the pc when it is at a line boundary)
static FRAME_WITHOUT_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#(\d+)\s+(.*)$").unwrap());

/// Parse one transcript line into a frame.
///
/// Returns `None` for anything that isn't a backtrace line (banners,
/// register dumps, `print` output).
#[must_use]
pub fn parse_line(line: &str) -> Option<Frame> {
    let line = line.trim_end();

    if let Some(caps) = FRAME_WITH_ADDRESS.captures(line) {
        let index = caps[1].parse().ok()?;
        let address = parse_address(&caps)?;
        let text = caps.get(3).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
        return Some(frame_from_text(index, address, text));
    }

    let caps = FRAME_WITHOUT_ADDRESS.captures(line)?;
    let index = caps[1].parse().ok()?;
    Some(frame_from_text(index, None, &caps[2]))
}

/// Parse every backtrace line of a transcript, in order.
#[must_use]
pub fn parse_stacktrace(text: &str) -> Vec<Frame> {
    text.lines().filter_map(parse_line).collect()
}

/// `Some(None)` when the line has no address, `None` if it overflows.
#[allow(clippy::option_option)]
fn parse_address(caps: &Captures<'_>) -> Option<Option<u64>> {
    match caps.get(2) {
        Some(hex) => u64::from_str_radix(hex.as_str(), 16).ok().map(Some),
        None => Some(None),
    }
}

fn frame_from_text(index: u32, raw_address: Option<u64>, text: &str) -> Frame {
    let text = text.trim();
    if text == SIGNAL_HANDLER_MARKER {
        return Frame::signal_marker(index, raw_address);
    }
    Frame::new(index, raw_address, function_name(text), text)
}

/// Function name with the argument list and location cut off.
fn function_name(text: &str) -> Option<String> {
    let end = text.find([' ', '(']).unwrap_or(text.len());
    let name = &text[..end];
    if name.is_empty() || name == "??" {
        return None;
    }
    Some(name.to_string())
}
