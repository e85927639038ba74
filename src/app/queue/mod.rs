//! Download queue
//!
//! Owns the ordered collection of job records, runs at most the configured
//! number of jobs at once, and keeps the collection persisted so it survives
//! restarts.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ytdlp_queue::app::queue::{QueueConfig, QueueManager, QueueStore};
//! use ytdlp_queue::app::runner::{ProcessRunner, RunnerConfig};
//! use ytdlp_queue::app::tools::ToolLocator;
//! use ytdlp_queue::app::models::JobOptions;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = ProcessRunner::new(ToolLocator::default(), RunnerConfig::default());
//! let queue = QueueManager::open(
//!     QueueConfig::default(),
//!     Arc::new(runner),
//!     QueueStore::new("/tmp/queue.json"),
//! )
//! .await?;
//!
//! queue
//!     .enqueue("https://www.youtube.com/watch?v=dQw4w9WgXcQ", JobOptions::default(), None)
//!     .await?;
//! queue.start().await;
//! queue.wait_idle().await;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod lock;
pub mod persist;
pub mod state;
pub mod testing;
pub mod types;

#[cfg(test)]
mod tests;

pub use core::QueueManager;
pub use lock::QueueLock;
pub use persist::QueueStore;
pub use state::StopIntent;
pub use testing::{Script, ScriptedLauncher};
pub use types::{QueueConfig, QueueEvent, QueueStats};
