//! Download coordination
//!
//! The coordinator is the front-end's only entry point into the queue. It
//! translates user intents (submit, clip, import, start, cancel...) into queue
//! manager calls and turns queue events into display snapshots. It holds no
//! persisted state of its own.
//!
//! - [`config`] - submission defaults
//! - [`import`] - batch import parsing and reporting
//! - [`board`] - display snapshots kept current from queue events
//! - [`signals`] - Ctrl-C / SIGTERM handling for graceful shutdown
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ytdlp_queue::app::coordinator::{CoordinatorConfig, DownloadCoordinator};
//! use ytdlp_queue::app::queue::{QueueConfig, QueueManager, Script, ScriptedLauncher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
//! let queue = QueueManager::in_memory(QueueConfig::default(), launcher)?;
//! let coordinator = DownloadCoordinator::new(queue, CoordinatorConfig::default());
//!
//! coordinator.submit("https://example.com/watch?v=1", None).await?;
//! coordinator.start_all().await;
//! for job in coordinator.snapshots().await {
//!     println!("{} {} {:.1}%", job.id, job.status_label, job.progress);
//! }
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod config;
pub mod import;
pub mod signals;

#[cfg(test)]
mod tests;

use std::path::Path;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::format::ClipRange;
use crate::app::models::{JobId, JobOptions, JobRecord};
use crate::app::queue::{QueueManager, QueueStats};
use crate::app::runner::MediaInfo;
use crate::errors::{ImportError, QueueResult, RunnerResult};

pub use board::{spawn_board_refresher, Board, JobSnapshot};
pub use config::CoordinatorConfig;
pub use import::{ImportReport, RejectedLine};
pub use signals::{create_shutdown_channel, shutdown_requested, spawn_signal_listener};

/// Facade between the front-end and the queue manager
pub struct DownloadCoordinator {
    queue: QueueManager,
    config: CoordinatorConfig,
    board: watch::Sender<Board>,
    refresher: JoinHandle<()>,
}

impl DownloadCoordinator {
    /// Create a coordinator; must be called inside a Tokio runtime
    pub fn new(queue: QueueManager, config: CoordinatorConfig) -> Self {
        let (board, _) = watch::channel(Board::default());
        let refresher = spawn_board_refresher(queue.clone(), board.clone());
        Self {
            queue,
            config,
            board,
            refresher,
        }
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Queue a URL; `None` uses the configured default options
    pub async fn submit(&self, url: &str, options: Option<JobOptions>) -> QueueResult<JobId> {
        self.submit_with_priority(url, options, None).await
    }

    /// Queue a URL at a given priority
    pub async fn submit_with_priority(
        &self,
        url: &str,
        options: Option<JobOptions>,
        priority: Option<i32>,
    ) -> QueueResult<JobId> {
        let options = options.unwrap_or_else(|| self.config.default_options());
        let priority = priority.unwrap_or(self.config.default_priority);
        self.queue.enqueue(url, options, Some(priority)).await
    }

    /// Queue a partial download between two timestamps
    ///
    /// Timestamps accept `HH:MM:SS`, `MM:SS` or seconds; a missing end means
    /// until the end of the media.
    pub async fn submit_clip(
        &self,
        url: &str,
        start: &str,
        end: Option<&str>,
        options: Option<JobOptions>,
    ) -> QueueResult<JobId> {
        let clip = ClipRange::parse(start, end)?;
        let options = options
            .unwrap_or_else(|| self.config.default_options())
            .with_clip(clip);
        self.submit(url, Some(options)).await
    }

    /// Queue every URL in a text file
    pub async fn import_file(&self, path: &Path) -> Result<ImportReport, ImportError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ImportError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let report = self.import_text(&content).await;
        info!("Imported {}: {}", path.display(), report.summary());
        Ok(report)
    }

    /// Queue every URL in a block of text
    pub async fn import_text(&self, content: &str) -> ImportReport {
        let (candidates, skipped) = import::candidate_lines(content);
        let mut report = ImportReport {
            skipped,
            ..Default::default()
        };

        for (line, url) in candidates {
            match self.submit(url, None).await {
                Ok(id) => report.added.push(id),
                Err(e) => {
                    warn!("Import line {} rejected: {}", line, e);
                    report.rejected.push(RejectedLine {
                        line,
                        text: url.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Start scheduling queued jobs
    pub async fn start_all(&self) {
        self.board.send_modify(|b| b.notice = None);
        self.queue.start().await;
    }

    /// Stop scheduling; running jobs finish
    pub async fn stop_all(&self) {
        self.queue.stop().await;
    }

    /// Stop everything, returning running jobs to the queue
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }

    pub async fn cancel(&self, id: &JobId) -> QueueResult<JobRecord> {
        self.queue.cancel(id).await
    }

    pub async fn pause(&self, id: &JobId) -> QueueResult<JobRecord> {
        self.queue.pause(id).await
    }

    pub async fn resume(&self, id: &JobId) -> QueueResult<JobRecord> {
        self.queue.resume(id).await
    }

    pub async fn retry(&self, id: &JobId) -> QueueResult<JobId> {
        self.queue.retry(id).await
    }

    pub async fn reprioritize(&self, id: &JobId, priority: i32) -> QueueResult<JobRecord> {
        self.queue.reprioritize(id, priority).await
    }

    pub async fn rename(&self, id: &JobId, title: Option<String>) -> QueueResult<JobRecord> {
        self.queue.set_title(id, title).await
    }

    /// Metadata for a URL, without queueing it
    pub async fn media_info(&self, url: &str) -> RunnerResult<MediaInfo> {
        self.queue.media_info(url).await
    }

    /// Look up titles for untitled jobs; returns how many now have one
    pub async fn fill_titles(&self, ids: &[JobId]) -> usize {
        let mut named = 0;
        for id in ids {
            match self.queue.fetch_title(id).await {
                Ok(Some(title)) => {
                    debug!("Job {} is \"{}\"", id, title);
                    named += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("Could not name job {}: {}", id, e),
            }
        }
        named
    }

    pub async fn remove(&self, id: &JobId) -> QueueResult<JobRecord> {
        self.queue.remove(id).await
    }

    pub async fn clear_finished(&self) -> usize {
        self.queue.clear_finished().await
    }

    /// Current display snapshots, read straight from the queue
    pub async fn snapshots(&self) -> Vec<JobSnapshot> {
        self.queue
            .snapshot()
            .await
            .iter()
            .map(JobSnapshot::from)
            .collect()
    }

    pub async fn stats(&self) -> QueueStats {
        self.queue.stats().await
    }

    /// Board that follows queue events
    pub fn watch(&self) -> watch::Receiver<Board> {
        self.board.subscribe()
    }

    /// Resolve once the queue has nothing left to do
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    /// Tear down the board refresher and release the queue
    ///
    /// Dropping the coordinator aborts the refresher too, but the queue (and
    /// its file lock) is only released once the runtime has reaped the task.
    pub async fn close(mut self) {
        self.refresher.abort();
        let _ = (&mut self.refresher).await;
    }
}

impl Drop for DownloadCoordinator {
    fn drop(&mut self) {
        self.refresher.abort();
    }
}
