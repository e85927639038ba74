//! Process runner
//!
//! One download tool invocation per job:
//! - `args` builds the command line from job options and settings
//! - `progress` parses output lines into progress events
//! - `handle` is the per-run event stream and cancellation handle
//! - `process` launches and supervises the child process
//! - `info` queries a URL's metadata without downloading

pub mod args;
pub mod handle;
pub mod info;
pub mod process;
pub mod progress;

pub use args::{build_args, info_args, RunnerConfig};
pub use handle::{
    CancelHandle, RunEvent, RunHandle, RunOutcome, RunReporter, StopRequest, StopSignal,
};
pub use info::{MediaFormat, MediaInfo};
pub use process::{JobLauncher, ProcessRunner};
pub use progress::{OutputLine, OutputParser, ProgressEvent, Stage};
