//! Prelude module for ytdlp_queue
//!
//! Re-exports the items a typical integration needs, so that
//! `use ytdlp_queue::prelude::*;` is enough to build and drive a queue.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ytdlp_queue::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = AppConfig::load(None).await?;
//!     let (queue_config, runner_config, coordinator_config, tools) = settings.to_runtime_config();
//!
//!     let runner = Arc::new(ProcessRunner::new(tools, runner_config));
//!     let store = QueueStore::new(settings.queue_file()?);
//!     let queue = QueueManager::open(queue_config, runner, store).await?;
//!     let coordinator = DownloadCoordinator::new(queue, coordinator_config);
//!
//!     coordinator.submit("https://example.com/watch?v=1", None).await?;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Orchestration
    CoordinatorConfig,
    DownloadCoordinator,
    JobSnapshot,

    // Queue
    QueueConfig,
    QueueEvent,
    QueueManager,
    QueueStats,
    QueueStore,

    // Process runner
    JobLauncher,
    ProcessRunner,
    RunOutcome,
    RunnerConfig,
    ToolLocator,

    // Data types
    ClipRange,
    FormatKind,
    JobId,
    JobOptions,
    JobRecord,
    JobStatus,
    Quality,
};

// Settings
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{CANCEL_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_PRIORITY};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

// Common external crate re-exports for convenience
pub use tokio;
