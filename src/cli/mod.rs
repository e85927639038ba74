//! Command-line interface components
//!
//! This module contains CLI-specific code for ytdlp-queue, including
//! argument parsing, command handlers and the progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{AddArgs, ClipArgs, Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, JobArgs};
pub use commands::{execute, load_settings, open_coordinator, run_queue, CommandContext, LoadedSettings};
pub use progress::{ProgressConfig, ProgressDisplay};
