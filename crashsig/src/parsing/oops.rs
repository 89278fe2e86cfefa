//! Kernel oops parser.
//!
//! Understands both the older bracketed layout
//!
//! ```text
//! IP: [<ffffffffa0035d7f>] ext4_foo+0x1f/0x60 [ext4]
//! Call Trace:
//!  [<ffffffff81100000>] vfs_read+0x90/0x130
//! ```
//!
//! and the newer one without raw addresses (`RIP: 0010:func+0x1f/0x60`,
//! call trace entries wrapped in `<TASK>` markers). Entries prefixed with `?`
//! are stale stack contents the kernel could not verify and are skipped.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Frame;

static BUG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^BUG: unable to handle (.+?) at ").unwrap());

/// dmesg-style `[   12.345678] ` prefix
static TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\s*\d+\.\d+\] ").unwrap());

/// `RIP: <segment>:`; `0010` is the kernel code segment, `0033` user mode.
static RIP_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{4}):").unwrap());

const KERNEL_CODE_SEGMENT: &str = "0010";

/// `0x7f8c3c0f5b17`: a raw address with no symbol, e.g. a user-mode RIP
static BARE_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").unwrap());

/// Parse an oops dump into frames, in order of appearance.
#[must_use]
pub fn parse_oops(text: &str) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut in_trace_body = false;

    for raw_line in text.lines() {
        let line = TIMESTAMP.find(raw_line).map_or(raw_line, |m| &raw_line[m.end()..]);
        let line = line.trim_end();

        if let Some(caps) = BUG_LINE.captures(line) {
            push_frame(&mut frames, None, &caps[1]);
        }

        if let Some(rest) = line.strip_prefix("IP:") {
            let (address, entry) = split_address(rest);
            push_frame(&mut frames, address, entry);
        } else if let Some(rest) = line.trim_start().strip_prefix("RIP:") {
            let rest = rest.trim_start();
            let rest = match RIP_SEGMENT.captures(rest) {
                // Syscall entry register dump: where user space was, not the bug
                Some(caps) if &caps[1] != KERNEL_CODE_SEGMENT => continue,
                Some(caps) => &rest[caps[0].len()..],
                None => rest,
            };
            let (address, entry) = split_address(rest);
            push_frame(&mut frames, address, entry);
        } else if line.starts_with("Call Trace:") {
            in_trace_body = true;
        } else if in_trace_body {
            if line.starts_with(' ') || line.starts_with('\t') {
                let (address, entry) = split_address(line);
                push_frame(&mut frames, address, entry);
            } else {
                in_trace_body = false;
            }
        }
    }

    frames
}

/// Strip any number of leading `[<hex>]` groups; returns the last address seen.
fn split_address(text: &str) -> (Option<u64>, &str) {
    let mut rest = text.trim_start();
    let mut address = None;

    while let Some(inner) = rest.strip_prefix("[<") {
        let Some(close) = inner.find(">]") else {
            break;
        };
        address = u64::from_str_radix(&inner[..close], 16).ok();
        rest = inner[close + 2..].trim_start();
    }

    (address, rest.trim())
}

fn push_frame(frames: &mut Vec<Frame>, address: Option<u64>, entry: &str) {
    // `?` = unreliable, `<IRQ>`/`<TASK>` = context markers
    if entry.is_empty()
        || entry.starts_with('?')
        || entry.starts_with('<')
        || BARE_ADDRESS.is_match(entry)
    {
        return;
    }

    let Ok(index) = u32::try_from(frames.len()) else {
        return;
    };
    frames.push(Frame::new(index, address, Some(entry.to_string()), entry));
}
