//! Application constants for ytdlp_queue
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// External tool names and discovery
pub mod tools {
    /// Executable name of the download tool
    #[cfg(windows)]
    pub const YTDLP_BINARY: &str = "yt-dlp.exe";
    /// Executable name of the download tool
    #[cfg(not(windows))]
    pub const YTDLP_BINARY: &str = "yt-dlp";

    /// Executable name of the merge tool
    #[cfg(windows)]
    pub const FFMPEG_BINARY: &str = "ffmpeg.exe";
    /// Executable name of the merge tool
    #[cfg(not(windows))]
    pub const FFMPEG_BINARY: &str = "ffmpeg";

    /// Directory next to the running executable that may hold bundled tools
    pub const BUNDLED_BIN_DIR: &str = "bin";
}

/// Download tool invocation
pub mod ytdlp {
    use super::Duration;

    /// Output template appended to the output directory
    pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

    /// Default container for merged video+audio downloads
    pub const DEFAULT_MERGE_FORMAT: &str = "mp4";

    /// Marker that identifies error lines in tool output
    pub const ERROR_MARKER: &str = "ERROR:";

    /// Number of trailing error lines kept as failure text
    pub const MAX_ERROR_LINES: usize = 3;

    /// Upper bound on a metadata query
    pub const INFO_TIMEOUT: Duration = Duration::from_secs(60);
}

/// Queue scheduling and persistence
pub mod queue {
    use super::Duration;

    /// Default number of simultaneously running jobs
    pub const DEFAULT_CONCURRENCY: usize = 3;

    /// Upper bound accepted for the concurrency limit
    pub const MAX_CONCURRENCY: usize = 16;

    /// Default priority for new jobs (higher runs first)
    pub const DEFAULT_PRIORITY: i32 = 0;

    /// Time a running job gets to exit after a termination request
    pub const CANCEL_TIMEOUT: Duration = Duration::from_secs(10);

    /// Capacity of the queue event broadcast channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

    /// Buffer of each job's runner event channel
    pub const RUN_EVENT_BUFFER: usize = 64;

    /// File name of the persisted queue inside the config directory
    pub const QUEUE_FILE_NAME: &str = "queue.json";

    /// Suffix of the scratch file written before the queue file is replaced
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Suffix of the sibling file locked by the process that owns the queue
    pub const LOCK_FILE_SUFFIX: &str = ".lock";

    /// Length of generated job identifiers
    pub const JOB_ID_LEN: usize = 8;
}

/// Settings file locations
pub mod settings {
    /// Application directory name under the platform config dir
    pub const APP_DIR_NAME: &str = "ytdlp-queue";

    /// Settings file name
    pub const SETTINGS_FILE_NAME: &str = "settings.toml";

    /// Default download directory name under the home directory
    pub const DEFAULT_DOWNLOAD_DIR: &str = "Downloads";
}

/// Batch import
pub mod import {
    /// Line prefixes treated as comments
    pub const COMMENT_PREFIXES: &[&str] = &["#", ";"];
}

/// Progress display
pub mod progress {
    use super::Duration;

    /// Redraw interval for the terminal board
    pub const REFRESH_INTERVAL: Duration = Duration::from_millis(150);

    /// Maximum width of a title column
    pub const MAX_TITLE_WIDTH: usize = 48;
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

pub use queue::{CANCEL_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_PRIORITY};
pub use tools::{FFMPEG_BINARY, YTDLP_BINARY};
