//! Command-line argument parsing for ytdlp-queue
//!
//! This module defines the CLI structure using clap derive macros: queue
//! editing commands, the `run` command that drives downloads, settings
//! management and tool diagnostics.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::format::{FormatKind, Quality};

/// ytdlp-queue - persistent download queue for yt-dlp
#[derive(Parser, Debug)]
#[command(
    name = "ytdlp-queue",
    version,
    about = "Queue, schedule and monitor yt-dlp downloads",
    long_about = "A persistent download queue that drives yt-dlp (and ffmpeg for merging).
Jobs survive restarts, run in priority order under a concurrency limit, and can be
paused, cancelled, retried and reprioritized while the queue runs."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add one or more URLs to the queue
    Add(AddArgs),

    /// Add a partial download between two timestamps
    Clip(ClipArgs),

    /// Add every URL listed in a text file
    Import {
        /// File with one URL per line; '#' and ';' start comments
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show the queue
    List,

    /// Run queued downloads until the queue is idle
    Run {
        /// Override the concurrency limit for this run
        #[arg(short, long, value_name = "N")]
        concurrency: Option<usize>,
    },

    /// Cancel a job
    Cancel { id: String },

    /// Pause a job
    Pause { id: String },

    /// Resume a paused job
    Resume { id: String },

    /// Queue a fresh copy of a failed or cancelled job
    Retry { id: String },

    /// Change a job's priority (higher runs first)
    Priority {
        id: String,
        #[arg(allow_negative_numbers = true)]
        priority: i32,
    },

    /// Remove a job that is not running
    Remove { id: String },

    /// Remove completed, failed and cancelled jobs
    Clear,

    /// Manage settings
    Config(ConfigArgs),

    /// Show the external tools in use
    Tools,

    /// Show a URL's title, duration and available qualities without queueing it
    Info {
        #[arg(value_name = "URL")]
        url: String,
    },
}

/// Options shared by commands that create jobs
#[derive(Args, Debug, Clone, Default)]
pub struct JobArgs {
    /// video_audio, video_only, audio_mp3, audio_m4a, audio_opus, audio_best
    #[arg(short, long)]
    pub format: Option<FormatKind>,

    /// best, 4k, 1080, 720, 480, 360, worst
    #[arg(long)]
    pub quality: Option<Quality>,

    /// Job priority (higher runs first)
    #[arg(short, long, allow_negative_numbers = true)]
    pub priority: Option<i32>,

    /// Output directory for these jobs
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Arguments for the add command
#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// URLs to download
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    #[command(flatten)]
    pub job: JobArgs,

    /// Clip start (HH:MM:SS, MM:SS or seconds)
    #[arg(long, value_name = "TIME")]
    pub clip_start: Option<String>,

    /// Clip end; the end of the media when omitted
    #[arg(long, value_name = "TIME", requires = "clip_start")]
    pub clip_end: Option<String>,

    /// Display title for the job
    #[arg(long)]
    pub title: Option<String>,
}

/// Arguments for the clip command
#[derive(Args, Debug, Clone)]
pub struct ClipArgs {
    /// URL to download
    pub url: String,

    /// Clip start (HH:MM:SS, MM:SS or seconds)
    #[arg(long, value_name = "TIME")]
    pub start: String,

    /// Clip end; the end of the media when omitted
    #[arg(long, value_name = "TIME")]
    pub end: Option<String>,

    #[command(flatten)]
    pub job: JobArgs,
}

/// Arguments for settings management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Settings actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,

    /// Print the settings file location
    Path,

    /// Set a dotted key, e.g. `download.concurrent_downloads 4`
    Set { key: String, value: String },

    /// Restore the default settings file
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }

    /// Whether the level came from a command-line flag
    pub fn verbosity_overridden(&self) -> bool {
        self.global.quiet || self.global.verbose || self.global.very_verbose
    }
}

impl JobArgs {
    /// Whether any option was given
    pub fn is_empty(&self) -> bool {
        self.format.is_none() && self.quality.is_none() && self.output_dir.is_none()
    }
}
