//! Frame classification and unwind filtering.
//!
//! The innermost frames of a crash are often generic error machinery rather
//! than the code that actually failed: glib's logging and assertion helpers,
//! `abort()`, Xlib's error dispatch, or the kernel's signal trampoline. Those
//! frames are identical across many unrelated bugs, so keeping them in a
//! signature would merge crashes that have nothing in common.
//!
//! # Strategy
//!
//! 1. **Classify** each frame (signal trampoline, unwind entry point, trivial
//!    helper, application code).
//! 2. **Unwind**: whenever an unwind entry point or a signal trampoline is
//!    seen, everything collected so far is discarded. Once a real signal
//!    trampoline has been unwound and application frames follow, unwinding
//!    stops for good.
//! 3. **Retain** the first five application frames, skipping trivial helpers
//!    (SSE string stubs, `__kernel_vsyscall`) that are noise but not an unwind
//!    boundary.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Frame;

/// Frames kept for identity purposes.
///
/// Deep enough to tell bugs apart, shallow enough that a rebuild shifting
/// deeper frames doesn't change the signature.
pub const DEFAULT_TOP_FRAMES: usize = 5;

// =============================================================================
// CLASSIFICATION TABLES
// =============================================================================

/// Logging / assertion / abort entry points that sit above the real fault.
const UNWIND_FUNCTIONS: &[&str] = &[
    "g_logv",
    "g_log",
    "IA__g_log",
    "IA__g_logv",
    "g_assert_warning",
    "IA__g_assert_warning",
    "__GI_abort",
    XERROR_ENTRY,
];

/// Xlib's error handler entry; everything X-related above it is dispatch.
const XERROR_ENTRY: &str = "_XError";

/// Xlib request/response plumbing that doesn't start with `_X`.
const XERROR_HELPERS: &[&str] = &["handle_response", "handle_error", "XWindowEvent"];

/// Vectorized libc stubs and the vsyscall trampoline.
static TRIVIAL_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(__.*_s?sse\d+(?:_\w+)?|__kernel_vsyscall)$").unwrap());

// =============================================================================
// FRAME CLASS
// =============================================================================

/// What role a frame plays for unwinding purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    /// `<signal handler called>`
    SignalTrampoline,
    /// Logging/abort entry point from the unwind set
    UnwindEntry,
    /// `_XError`: starts skipping Xlib dispatch frames
    XErrorEntry,
    /// Internal helper that is dropped but doesn't affect unwinding
    Trivial,
    /// Anything else, including unresolved frames
    Application,
}

impl FrameClass {
    /// Returns true if this frame discards everything collected before it.
    #[must_use]
    pub fn is_unwind_boundary(self) -> bool {
        matches!(self, FrameClass::SignalTrampoline | FrameClass::UnwindEntry | FrameClass::XErrorEntry)
    }
}

/// Classify a frame.
#[must_use]
pub fn classify_frame(frame: &Frame) -> FrameClass {
    if frame.is_signal_marker {
        return FrameClass::SignalTrampoline;
    }

    if let Some(function) = frame.function_name() {
        if function == XERROR_ENTRY {
            return FrameClass::XErrorEntry;
        }
        if UNWIND_FUNCTIONS.contains(&function) {
            return FrameClass::UnwindEntry;
        }
    }

    // The stub name is the first token as printed, before any argument list
    let first_token = frame.description.split_whitespace().next().unwrap_or("");
    if TRIVIAL_FUNCTION.is_match(first_token) {
        return FrameClass::Trivial;
    }

    FrameClass::Application
}

/// Returns true for frames belonging to Xlib's error delivery path.
fn is_xerror_helper(frame: &Frame) -> bool {
    frame
        .function_name()
        .is_some_and(|f| f.starts_with("_X") || XERROR_HELPERS.contains(&f))
}

// =============================================================================
// UNWIND STATE MACHINE
// =============================================================================

/// Unwinder state.
///
/// `settled` latches once a signal trampoline has been unwound: from then on,
/// the first application frame ends unwinding permanently. Without it a glib
/// abort sitting on top of an `XError` would still be unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindState {
    /// Retaining application frames
    Collecting { settled: bool },
    /// Just passed an unwind boundary
    Unwinding { settled: bool },
    /// Dropping Xlib dispatch frames above `_XError`
    UnwindingXError { settled: bool },
}

impl Default for UnwindState {
    fn default() -> Self {
        UnwindState::Collecting { settled: false }
    }
}

/// What to do with the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindStep {
    /// Retain (subject to the ignore list and the output cap)
    Keep,
    /// Discard this frame only
    Skip,
    /// Discard this frame and everything retained so far
    Reset,
}

impl UnwindState {
    /// Advance the state machine by one frame.
    #[must_use]
    pub fn transition(self, frame: &Frame) -> (UnwindState, UnwindStep) {
        let settled = match self {
            // Past a real signal delivery and back in application code
            UnwindState::Collecting { settled: true } => {
                return (self, UnwindStep::Keep);
            }
            UnwindState::UnwindingXError { settled } => {
                if is_xerror_helper(frame) {
                    return (self, UnwindStep::Skip);
                }
                settled
            }
            UnwindState::Collecting { settled } | UnwindState::Unwinding { settled } => settled,
        };

        let class = classify_frame(frame);
        if !class.is_unwind_boundary() {
            return (UnwindState::Collecting { settled }, UnwindStep::Keep);
        }

        let next = match class {
            FrameClass::SignalTrampoline => UnwindState::Unwinding { settled: true },
            FrameClass::XErrorEntry => UnwindState::UnwindingXError { settled },
            _ => UnwindState::Unwinding { settled },
        };
        (next, UnwindStep::Reset)
    }
}

// =============================================================================
// UNWIND FILTER
// =============================================================================

/// Reduces a full backtrace to the frames that identify the crash site.
#[derive(Debug, Clone, Copy)]
pub struct UnwindFilter {
    max_frames: usize,
}

impl Default for UnwindFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl UnwindFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frames(DEFAULT_TOP_FRAMES)
    }

    #[must_use]
    pub fn with_max_frames(max_frames: usize) -> Self {
        Self { max_frames }
    }

    /// Return at most `max_frames` frames, innermost first.
    #[must_use]
    pub fn apply(&self, frames: &[Frame]) -> Vec<Frame> {
        let mut state = UnwindState::default();
        let mut top: Vec<Frame> = Vec::with_capacity(self.max_frames);

        for frame in frames {
            let (next, step) = state.transition(frame);
            state = next;

            match step {
                UnwindStep::Reset => {
                    debug!("Unwinding past frame #{} ({})", frame.index, frame.description);
                    top.clear();
                }
                UnwindStep::Skip => {}
                UnwindStep::Keep => {
                    if top.len() < self.max_frames && classify_frame(frame) != FrameClass::Trivial {
                        top.push(frame.clone());
                    }
                }
            }
        }

        top
    }
}

/// Join retained frame descriptions into the `StacktraceTop` text.
#[must_use]
pub fn stacktrace_top(frames: &[Frame]) -> String {
    frames.iter().map(|f| f.description.as_str()).collect::<Vec<_>>().join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_stacktrace;

    fn names(frames: &[Frame]) -> Vec<&str> {
        frames.iter().map(|f| f.function_name().unwrap_or("<marker>")).collect()
    }

    fn filter(text: &str) -> Vec<Frame> {
        UnwindFilter::new().apply(&parse_stacktrace(text))
    }

    #[test]
    fn test_plain_stack_is_kept() {
        let top = filter(
            "#0 0x1 in raise ()\n#1 0x2 in abort ()\n#2 0x3 in my_func ()\n#3 0x4 in main ()\n",
        );
        assert_eq!(names(&top), ["raise", "abort", "my_func", "main"]);
    }

    #[test]
    fn test_caps_at_five() {
        let text: String = (0..9).map(|i| format!("#{i} 0x{:x} in f{i} ()\n", i + 1)).collect();
        let top = filter(&text);
        assert_eq!(names(&top), ["f0", "f1", "f2", "f3", "f4"]);
    }

    #[test]
    fn test_signal_handler_unwinds() {
        let top = filter(
            "#0  0x1 in __kernel_vsyscall ()\n\
             #1  0x2 in raise ()\n\
             #2  0x3 in crash_handler ()\n\
             #3  <signal handler called>\n\
             #4  0x4 in do_work (p=0x0) at work.c:10\n\
             #5  0x5 in main () at main.c:3\n",
        );
        assert_eq!(names(&top), ["do_work", "main"]);
    }

    #[test]
    fn test_glib_assertion_unwinds() {
        let top = filter(
            "#0  0x1 in raise ()\n\
             #1  0x2 in abort ()\n\
             #2  0x3 in g_assert_warning (domain=0x0)\n\
             #3  0x4 in widget_show ()\n\
             #4  0x5 in main ()\n",
        );
        assert_eq!(names(&top), ["widget_show", "main"]);
    }

    #[test]
    fn test_stops_unwinding_after_signal_and_app_frame() {
        // A g_log below the signal handler's caller is application territory
        let top = filter(
            "#0  0x1 in raise ()\n\
             #1  <signal handler called>\n\
             #2  0x2 in app_fn ()\n\
             #3  0x3 in g_log ()\n\
             #4  0x4 in main ()\n",
        );
        assert_eq!(names(&top), ["app_fn", "g_log", "main"]);
    }

    #[test]
    fn test_keeps_unwinding_without_signal() {
        let top = filter(
            "#0  0x1 in g_log ()\n\
             #1  0x2 in app_fn ()\n\
             #2  0x3 in g_logv ()\n\
             #3  0x4 in caller ()\n",
        );
        assert_eq!(names(&top), ["caller"]);
    }

    #[test]
    fn test_xerror_unwinding() {
        let top = filter(
            "#0  0x1 in g_logv ()\n\
             #1  0x2 in g_log ()\n\
             #2  0x3 in gdk_x_error ()\n\
             #3  0x4 in _XError ()\n\
             #4  0x5 in handle_error ()\n\
             #5  0x6 in _XReply ()\n\
             #6  0x7 in XWindowEvent ()\n\
             #7  0x8 in gdk_window_foo ()\n\
             #8  0x9 in main ()\n",
        );
        assert_eq!(names(&top), ["gdk_window_foo", "main"]);
    }

    #[test]
    fn test_trivial_helpers_dropped() {
        let top = filter(
            "#0  0x1 in __strlen_sse2 () from /lib/libc.so.6\n\
             #1  0x2 in __memcpy_ssse3_back ()\n\
             #2  0x3 in parse ()\n\
             #3  0x4 in main ()\n",
        );
        assert_eq!(names(&top), ["parse", "main"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let top = filter(
            "#0  0x1 in raise ()\n\
             #1  <signal handler called>\n\
             #2  0x2 in a ()\n#3 0x3 in b ()\n#4 0x4 in c ()\n#5 0x5 in d ()\n#6 0x6 in e ()\n",
        );
        assert_eq!(UnwindFilter::new().apply(&top), top);
    }

    #[test]
    fn test_classify_frame() {
        let frames = parse_stacktrace(
            "#0 <signal handler called>\n#1 0x1 in __GI_abort ()\n#2 0x2 in _XError ()\n\
             #3 0x3 in __kernel_vsyscall ()\n#4 0x4 in ?? ()\n",
        );
        let classes: Vec<_> = frames.iter().map(classify_frame).collect();
        assert_eq!(
            classes,
            [
                FrameClass::SignalTrampoline,
                FrameClass::UnwindEntry,
                FrameClass::XErrorEntry,
                FrameClass::Trivial,
                FrameClass::Application,
            ]
        );
        assert!(classes[0].is_unwind_boundary());
        assert!(!classes[4].is_unwind_boundary());
    }

    #[test]
    fn test_stacktrace_top_text() {
        let top = filter("#0  0x1 in foo (x=1) at a.c:3\n#1  0x2 in main () at a.c:9\n");
        assert_eq!(stacktrace_top(&top), "foo (x=1) at a.c:3\nmain () at a.c:9");
        assert_eq!(stacktrace_top(&[]), "");
    }
}
