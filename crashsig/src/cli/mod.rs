//! Command-line interface

pub mod args;

pub use args::{AnalyzeArgs, Args, BatchArgs, Command, ContextArgs, GdbArgs};
