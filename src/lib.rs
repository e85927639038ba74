//! ytdlp_queue Library
//!
//! A persistent, concurrent download queue that drives yt-dlp (and ffmpeg for
//! merging) as external processes. Jobs survive restarts, run under a
//! configurable concurrency limit in priority order, and report live progress
//! parsed from the tool's output.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(DEFAULT_CONCURRENCY, 3);
        assert_eq!(CANCEL_TIMEOUT.as_secs(), 10);
        assert!(YTDLP_BINARY.starts_with("yt-dlp"));
    }

    #[test]
    fn test_error_types() {
        let queue_error = errors::QueueError::InvalidUrl {
            url: "nope".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        let app_error = AppError::Queue(queue_error);

        assert_eq!(app_error.category(), "queue");
        assert!(!app_error.is_recoverable());
    }
}
