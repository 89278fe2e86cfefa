//! # Address Translation
//!
//! Crash reports from different machines never agree on raw addresses:
//! ASLR (Address Space Layout Randomization) loads the same binary and its
//! libraries at a different base address on every run.
//!
//! ```text
//! Run 1: libc loaded at 0x7f3c2a000000, crash pc 0x7f3c2a0b1c4e
//! Run 2: libc loaded at 0x7f8b3c1a0000, crash pc 0x7f8b3c251c4e
//! ```
//!
//! Both pcs are the same instruction. Subtracting the mapping start from
//! `/proc/<pid>/maps` gives an offset that is identical across runs:
//!
//! ```text
//! offset = pc - region.start = 0xb1c4e
//! ```
//!
//! When a stack trace lacks symbols, these `module + offset` pairs are the
//! only stable identity available for a frame; the address signature in
//! [`crate::analysis::signature`] is built from them.
//!
//! ## Module Structure
//!
//! - **`memory_maps`**: `/proc/<pid>/maps` parsing and address lookup
//!
//! ## References
//!
//! - [Linux `/proc/pid/maps` format](https://man7.org/linux/man-pages/man5/proc.5.html)

pub mod memory_maps;

pub use memory_maps::{MemoryMapTable, MIN_CODE_ADDRESS};
