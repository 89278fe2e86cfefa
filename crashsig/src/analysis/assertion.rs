//! Assertion message extraction from debugger `print` output.
//!
//! For aborts, the debugger is asked to print the C library's and glib's
//! stored assertion strings (`__abort_msg->msg`, `__glib_assert_msg`). The
//! output looks like
//!
//! ```text
//! $1 = 0x5581f2a0 "app: main.c:42: main: Assertion `x > 0' failed.\n"
//! $2 = 0x0
//! ```
//!
//! and only the quoted text is useful.

use once_cell::sync::Lazy;
use regex::Regex;

/// `$N = [(type)] 0xADDR "message"` with an optional `...` truncation marker
static PRINTED_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\$\d+\s*=\s*(?:\(.*?\)\s*)?0x[0-9a-fA-F]+\s+"(.*)"(?:\.\.\.)?\s*$"#).unwrap()
});

/// Pull the first printed string out of a variable dump.
///
/// Returns `None` when nothing was printed as a string (null pointer,
/// missing symbol, unreadable memory); the crash then gets a signal-based
/// signature instead.
#[must_use]
pub fn extract_assertion_message(dump: &str) -> Option<String> {
    dump.lines().find_map(|line| {
        let caps = PRINTED_STRING.captures(line.trim())?;
        let message = caps[1].strip_suffix("\\n").unwrap_or(&caps[1]);
        (!message.is_empty()).then(|| message.to_string())
    })
}
