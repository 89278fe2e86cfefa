//! Duplicate signature construction.
//!
//! A signature is a plain string that is byte-identical for every report of
//! the same bug. Consumers cluster on exact string equality, so the grammar
//! below must never drift:
//!
//! ```text
//! kernel:<frame>:<frame>...                      kernel oops
//! <exe>:<assertion message, 0x... → ADDR>         abort with assertion message
//! <exe>:<signal>:<fn>:<fn>...                    symbolic, 2..=5 frames
//! <exe>:<signal>:<module>..<hex offset>:...      address fallback, up to 15 entries
//! ```
//!
//! The builder prefers returning no signature over an unstable one: a wrong
//! signature silently merges unrelated bugs, a missing one is merely inert.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

use crate::config::SignatureConfig;
use crate::domain::{Frame, ProblemContext, ProblemType, Signature, SIGNAL_HANDLER_MARKER};
use crate::symbolization::MemoryMapTable;

/// Pointer values printed inside assertion messages.
static LONG_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x[0-9a-fA-F]{6,}").unwrap());

/// Leading identifier of a function name (C++ scopes and destructors included).
static LEADING_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w:~]+").unwrap());

/// Replace pointer-sized hex literals with `ADDR`.
#[must_use]
pub fn normalize_addresses(text: &str) -> Cow<'_, str> {
    LONG_HEX.replace_all(text, "ADDR")
}

/// Builds signature strings for one report.
#[derive(Debug, Clone, Copy)]
pub struct SignatureBuilder<'a> {
    config: &'a SignatureConfig,
}

impl<'a> SignatureBuilder<'a> {
    #[must_use]
    pub fn new(config: &'a SignatureConfig) -> Self {
        Self { config }
    }

    /// Pick the signature for a report by precedence.
    ///
    /// `top_frames` are the unwound gdb frames, `oops_frames` the parsed
    /// kernel oops (empty for user-space crashes).
    #[must_use]
    pub fn crash_signature(
        &self,
        ctx: &ProblemContext,
        top_frames: &[Frame],
        oops_frames: &[Frame],
    ) -> Option<Signature> {
        if let Some(signature) = &ctx.duplicate_signature {
            return Some(signature.clone());
        }

        match ctx.problem_type {
            ProblemType::Bug | ProblemType::Hang => None,
            ProblemType::KernelOops | ProblemType::KernelCrash => {
                self.build_suspend_resume(ctx).or_else(|| self.build_kernel(ctx, oops_frames))
            }
            ProblemType::Crash => {
                self.build_assertion(ctx).or_else(|| self.build_symbolic(ctx, top_frames))
            }
        }
    }

    /// `kernel:<frame>:<frame>...` from oops frames.
    #[must_use]
    pub fn build_kernel(&self, ctx: &ProblemContext, frames: &[Frame]) -> Option<Signature> {
        if !ctx.problem_type.is_kernel() {
            return None;
        }

        let parts: Vec<&str> = frames.iter().filter_map(Frame::function_name).collect();
        if parts.is_empty() {
            return None;
        }
        Some(format!("kernel:{}", parts.join(":")))
    }

    /// Suspend/resume failures cluster per machine model and firmware.
    #[must_use]
    pub fn build_suspend_resume(&self, ctx: &ProblemContext) -> Option<Signature> {
        if ctx.problem_type != ProblemType::KernelOops {
            return None;
        }
        let failure = ctx.failure.as_deref()?;
        if !failure.contains("suspend") && !failure.contains("resume") {
            return None;
        }

        let mut signature = failure.to_string();
        for extra in [&ctx.machine_type, &ctx.bios_version].into_iter().flatten() {
            if !extra.is_empty() {
                signature.push(':');
                signature.push_str(extra);
            }
        }
        Some(signature)
    }

    /// `<exe>:<message>` for aborts that left an assertion message.
    ///
    /// Applies when the signal is `SIGABRT` or unknown. Reports without a
    /// signal field (assertion captured by the host, no core) still cluster
    /// on the message; any other known signal means the message is stale.
    #[must_use]
    pub fn build_assertion(&self, ctx: &ProblemContext) -> Option<Signature> {
        if ctx.signal.is_some() && !ctx.is_abort() {
            return None;
        }
        let message = ctx.assertion_message.as_deref()?;
        Some(format!("{}:{}", ctx.executable_path, normalize_addresses(message)))
    }

    /// `<exe>:<signal>:<fn>...` from unwound frames.
    ///
    /// Fails if any frame is unnamed or there are too few frames.
    #[must_use]
    pub fn build_symbolic(&self, ctx: &ProblemContext, frames: &[Frame]) -> Option<Signature> {
        let signal = ctx.signal.as_deref()?.trim();

        if frames.len() < self.config.min_symbolic_frames {
            debug!(
                "Symbolic signature needs {} frames, have {}",
                self.config.min_symbolic_frames,
                frames.len()
            );
            return None;
        }

        let mut signature = format!("{}:{signal}", ctx.executable_path);
        for frame in frames {
            let Some(segment) = symbolic_segment(frame) else {
                debug!("Frame #{} has no usable function name", frame.index);
                return None;
            };
            signature.push(':');
            signature.push_str(segment);
        }
        Some(signature)
    }

    /// `<exe>:<signal>:<module>..<offset>...` from all frames with addresses.
    ///
    /// Used when symbols are missing. Without unwinding, more entries are
    /// needed to tell crashes apart, so up to `max_address_frames` are taken
    /// from the full stack.
    #[must_use]
    pub fn build_address(
        &self,
        ctx: &ProblemContext,
        frames: &[Frame],
        maps: &MemoryMapTable,
    ) -> Option<Signature> {
        let signal = ctx.signal.as_deref()?.trim();

        let mut stack: Vec<String> = Vec::new();
        let mut failed = 0usize;

        for frame in frames {
            let Some(addr) = frame.raw_address else {
                continue;
            };

            match maps.resolve(addr) {
                Some((module, offset)) => {
                    stack.push(format!("{}..{offset:x}", escape_module(module)));
                }
                None => failed += 1,
            }

            if stack.len() >= self.config.max_address_frames {
                break;
            }
        }

        if failed > 0 && stack.len() < failed * self.config.max_failure_ratio_denominator {
            debug!("Address signature rejected: {failed} failed vs {} resolved", stack.len());
            return None;
        }

        let minimum = if failed == 0 {
            self.config.min_address_frames
        } else {
            self.config.min_address_frames_with_failures
        };
        if stack.len() < minimum {
            debug!("Address signature rejected: {} entries, need {minimum}", stack.len());
            return None;
        }

        Some(format!("{}:{signal}:{}", ctx.executable_path, stack.join(":")))
    }
}

fn symbolic_segment(frame: &Frame) -> Option<&str> {
    if frame.is_unresolved() {
        return None;
    }
    if frame.is_signal_marker {
        return Some(SIGNAL_HANDLER_MARKER);
    }
    let function = frame.function_name()?;
    LEADING_IDENT.find(function).map(|m| m.as_str())
}

/// `:` separates fields and `..` separates module from offset; both are
/// doubled into `..` inside paths.
fn escape_module(module: &str) -> String {
    module.replace(['.', ':'], "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::UnwindFilter;
    use crate::parsing::{parse_oops, parse_stacktrace};

    const MAPS: &str = "\
00400000-0040ffff r-xp 00000000 08:01 1048602      /usr/bin/app
7f0000000000-7f00000fffff r-xp 00000000 08:01 2097283      /lib/libc.so.6
";

    fn frames(names: &[&str]) -> Vec<Frame> {
        let text: String = names
            .iter()
            .enumerate()
            .map(|(i, name)| format!("#{i}  0x{:x} in {name} ()\n", 0x40_1000 + i))
            .collect();
        parse_stacktrace(&text)
    }

    #[test]
    fn test_symbolic_signature() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");

        let sig = builder.build_symbolic(&ctx, &frames(&["do_work", "main"]));
        assert_eq!(sig.as_deref(), Some("/usr/bin/app:11:do_work:main"));
    }

    #[test]
    fn test_symbolic_is_deterministic() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");
        let stack = frames(&["a", "b", "c"]);

        assert_eq!(builder.build_symbolic(&ctx, &stack), builder.build_symbolic(&ctx, &stack));
    }

    #[test]
    fn test_symbolic_threshold() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");

        assert_eq!(builder.build_symbolic(&ctx, &frames(&["main"])), None);
        assert_eq!(builder.build_symbolic(&ctx, &[]), None);
        assert!(builder.build_symbolic(&ctx, &frames(&["f", "main"])).is_some());
    }

    #[test]
    fn test_symbolic_rejects_unresolved() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");

        assert_eq!(builder.build_symbolic(&ctx, &frames(&["a", "??", "main"])), None);
    }

    #[test]
    fn test_symbolic_requires_signal() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext { signal: None, ..ProblemContext::crash("/usr/bin/app", "11") };

        assert_eq!(builder.build_symbolic(&ctx, &frames(&["a", "main"])), None);
    }

    #[test]
    fn test_symbolic_cxx_names_use_leading_identifier() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");

        let sig = builder.build_symbolic(
            &ctx,
            &frames(&["Foo::~Foo", "std::vector<int>::push_back", "main"]),
        );
        assert_eq!(sig.as_deref(), Some("/usr/bin/app:11:Foo::~Foo:std::vector:main"));
    }

    #[test]
    fn test_symbolic_keeps_signal_marker() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");
        let stack = parse_stacktrace("#0 0x1 in handler ()\n#1 <signal handler called>\n");

        assert_eq!(
            builder.build_symbolic(&ctx, &stack).as_deref(),
            Some("/usr/bin/app:11:handler:<signal handler called>")
        );
    }

    #[test]
    fn test_assertion_signature_normalizes_pointers() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "6")
            .with_assertion("failed at 0x7fffabcd1234 in foo");

        assert_eq!(
            builder.build_assertion(&ctx).as_deref(),
            Some("/usr/bin/app:failed at ADDR in foo")
        );
    }

    #[test]
    fn test_assertion_without_signal() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext {
            executable_path: "/usr/bin/app".into(),
            ..ProblemContext::default()
        }
        .with_assertion("buffer overflow detected");

        assert_eq!(
            builder.build_assertion(&ctx).as_deref(),
            Some("/usr/bin/app:buffer overflow detected")
        );
    }

    #[test]
    fn test_short_hex_is_kept() {
        assert_eq!(normalize_addresses("errno 0x1f at 0xABCDEF01"), "errno 0x1f at ADDR");
    }

    #[test]
    fn test_assertion_ignored_for_other_signals() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11").with_assertion("stale");

        assert_eq!(builder.build_assertion(&ctx), None);
        let sig = builder.crash_signature(&ctx, &frames(&["a", "main"]), &[]);
        assert_eq!(sig.as_deref(), Some("/usr/bin/app:11:a:main"));
    }

    #[test]
    fn test_address_signature() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");
        let maps = MemoryMapTable::build(MAPS).unwrap();
        let stack = parse_stacktrace(
            "#0 0x7f0000001234 in ?? ()\n#1 0x401000 in ?? ()\n#2 0x401abc in ?? ()\n",
        );

        assert_eq!(
            builder.build_address(&ctx, &stack, &maps).as_deref(),
            Some("/usr/bin/app:11:/lib/libc..so..6..1234:/usr/bin/app..1000:/usr/bin/app..1abc")
        );
    }

    #[test]
    fn test_address_signature_needs_three_entries() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");
        let maps = MemoryMapTable::build(MAPS).unwrap();
        let stack = parse_stacktrace("#0 0x401000 in ?? ()\n#1 0x401abc in ?? ()\n");

        assert_eq!(builder.build_address(&ctx, &stack, &maps), None);
    }

    #[test]
    fn test_address_signature_failure_ratio() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");
        let maps = MemoryMapTable::build(MAPS).unwrap();

        // 7 resolved, 2 failed: 7 < 2 * 4
        let mut text: String = (0..7).map(|i| format!("#{i} 0x{:x} in ?? ()\n", 0x40_1000 + i)).collect();
        text.push_str("#7 0x900000 in ?? ()\n#8 0x900001 in ?? ()\n");
        assert_eq!(builder.build_address(&ctx, &parse_stacktrace(&text), &maps), None);

        // 8 resolved, 2 failed: accepted
        text.push_str("#9 0x401010 in ?? ()\n");
        assert!(builder.build_address(&ctx, &parse_stacktrace(&text), &maps).is_some());
    }

    #[test]
    fn test_address_signature_needs_six_with_failures() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");
        let maps = MemoryMapTable::build(MAPS).unwrap();

        // 5 resolved, 1 failed: ratio fine but too short
        let mut text: String = (0..5).map(|i| format!("#{i} 0x{:x} in ?? ()\n", 0x40_1000 + i)).collect();
        text.push_str("#5 0x900000 in ?? ()\n");
        assert_eq!(builder.build_address(&ctx, &parse_stacktrace(&text), &maps), None);
    }

    #[test]
    fn test_address_signature_caps_at_fifteen() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");
        let maps = MemoryMapTable::build(MAPS).unwrap();
        let text: String = (0..30).map(|i| format!("#{i} 0x{:x} in ?? ()\n", 0x40_1000 + i)).collect();

        let sig = builder.build_address(&ctx, &parse_stacktrace(&text), &maps).unwrap();
        assert_eq!(sig.matches("/usr/bin/app..").count(), 15);
        assert!(sig.ends_with(":/usr/bin/app..100e"));
    }

    #[test]
    fn test_address_signature_skips_frames_without_address() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");
        let maps = MemoryMapTable::build(MAPS).unwrap();
        let stack = parse_stacktrace(
            "#0 raise () at raise.c:50\n#1 0x401001 in ?? ()\n#2 0x401002 in ?? ()\n#3 0x401003 in ?? ()\n",
        );

        assert_eq!(
            builder.build_address(&ctx, &stack, &maps).as_deref(),
            Some("/usr/bin/app:11:/usr/bin/app..1001:/usr/bin/app..1002:/usr/bin/app..1003")
        );
    }

    #[test]
    fn test_kernel_signature() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let oops = parse_oops(
            "BUG: unable to handle kernel paging request at ffff880000000000\n\
             IP: [<ffffffff81000001>] foo+0x1/0x10\n\
             Call Trace:\n [<ffffffff81000002>] bar+0x2/0x20\n",
        );

        let sig = builder.crash_signature(&ProblemContext::kernel_oops(), &[], &oops);
        assert_eq!(sig.as_deref(), Some("kernel:kernel paging request:foo+0x1/0x10:bar+0x2/0x20"));
        assert_eq!(builder.crash_signature(&ProblemContext::kernel_oops(), &[], &[]), None);
    }

    #[test]
    fn test_kernel_signature_requires_kernel_problem() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let oops = parse_oops("IP: [<ffffffff81000001>] foo+0x1/0x10\n");

        assert_eq!(builder.build_kernel(&ProblemContext::crash("/bin/x", "11"), &oops), None);
    }

    #[test]
    fn test_suspend_resume_signature() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext {
            failure: Some("suspend/resume".to_string()),
            machine_type: Some("LENOVO 20HR".to_string()),
            bios_version: Some("N1MET31W".to_string()),
            ..ProblemContext::kernel_oops()
        };

        assert_eq!(
            builder.crash_signature(&ctx, &[], &[]).as_deref(),
            Some("suspend/resume:LENOVO 20HR:N1MET31W")
        );
    }

    #[test]
    fn test_duplicate_signature_override_and_bug() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let stack = frames(&["a", "main"]);

        let ctx = ProblemContext {
            duplicate_signature: Some("manual:sig".to_string()),
            ..ProblemContext::crash("/usr/bin/app", "11")
        };
        assert_eq!(builder.crash_signature(&ctx, &stack, &[]).as_deref(), Some("manual:sig"));

        let bug = ProblemContext { problem_type: ProblemType::Bug, ..ProblemContext::crash("/usr/bin/app", "11") };
        assert_eq!(builder.crash_signature(&bug, &stack, &[]), None);
    }

    #[test]
    fn test_unwound_frames_feed_symbolic() {
        let config = SignatureConfig::default();
        let builder = SignatureBuilder::new(&config);
        let ctx = ProblemContext::crash("/usr/bin/app", "11");
        let top = UnwindFilter::new().apply(&parse_stacktrace(
            "#0 0x1 in raise ()\n#1 <signal handler called>\n#2 0x2 in crash_here ()\n#3 0x3 in main ()\n",
        ));

        assert_eq!(
            builder.build_symbolic(&ctx, &top).as_deref(),
            Some("/usr/bin/app:11:crash_here:main")
        );
    }
}
