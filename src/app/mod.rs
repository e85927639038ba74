//! Core application logic for ytdlp_queue
//!
//! This module contains the main application components: the job model, tool
//! discovery, the process runner that drives the download tool, the
//! persistent queue manager and the coordinator facade used by front-ends.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ytdlp_queue::app::{
//!     CoordinatorConfig, DownloadCoordinator, ProcessRunner, QueueConfig, QueueManager,
//!     QueueStore, RunnerConfig, ToolLocator,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = ProcessRunner::new(ToolLocator::default(), RunnerConfig::default());
//! let store = QueueStore::new("queue.json");
//! let queue = QueueManager::open(QueueConfig::default(), Arc::new(runner), store).await?;
//!
//! let coordinator = DownloadCoordinator::new(queue, CoordinatorConfig::default());
//! coordinator.submit("https://www.youtube.com/watch?v=dQw4w9WgXcQ", None).await?;
//! coordinator.start_all().await;
//! coordinator.wait_idle().await;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod format;
pub mod models;
pub mod queue;
pub mod runner;
pub mod tools;

// Re-export main public API
pub use coordinator::{Board, CoordinatorConfig, DownloadCoordinator, ImportReport, JobSnapshot};
pub use format::{format_selector, ClipRange, FormatKind, Quality};
pub use models::{validate_url, JobId, JobOptions, JobRecord, JobStatus};
pub use queue::{QueueConfig, QueueEvent, QueueLock, QueueManager, QueueStats, QueueStore};
pub use runner::{
    build_args, CancelHandle, JobLauncher, MediaInfo, OutputParser, ProcessRunner, ProgressEvent,
    RunHandle, RunOutcome, RunnerConfig, Stage,
};
pub use tools::{tool_version, ToolLocator, ToolPaths};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(JobStatus::Queued.label(), "queued");
    }
}
