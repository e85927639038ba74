//! Display snapshots
//!
//! The front-end never sees job records directly; it reads [`JobSnapshot`]s
//! collected on a [`Board`] that a background task keeps current from queue
//! events.

use std::path::PathBuf;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::models::{JobId, JobRecord, JobStatus};
use crate::app::queue::{QueueEvent, QueueManager, QueueStats};

/// Display-ready view of one job
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: JobId,
    /// Title when known, URL otherwise
    pub name: String,
    pub url: String,
    pub status: JobStatus,
    /// Status plus stage, e.g. "running (processing)"
    pub status_label: String,
    pub progress: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub error: Option<String>,
    pub output_path: Option<PathBuf>,
    pub priority: i32,
}

impl From<&JobRecord> for JobSnapshot {
    fn from(record: &JobRecord) -> Self {
        let status_label = match (record.status, record.stage) {
            (JobStatus::Running, Some(stage)) => format!("running ({})", stage.label()),
            (status, _) => status.label().to_string(),
        };
        Self {
            id: record.id.clone(),
            name: record.display_name().to_string(),
            url: record.url.clone(),
            status: record.status,
            status_label,
            progress: record.progress,
            speed: record.speed.clone(),
            eta: record.eta.clone(),
            error: record.error.clone(),
            output_path: record.output_path.clone(),
            priority: record.priority,
        }
    }
}

/// Everything the front-end renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    /// Jobs in scheduling order
    pub jobs: Vec<JobSnapshot>,
    pub stats: QueueStats,
    /// Latest condition worth showing to the user
    pub notice: Option<String>,
}

impl Board {
    pub fn from_records(records: &[JobRecord], stats: QueueStats) -> Self {
        Self {
            jobs: records.iter().map(JobSnapshot::from).collect(),
            stats,
            notice: None,
        }
    }

    /// Replace one job's snapshot in place; `false` if it is not on the board
    pub fn patch(&mut self, record: &JobRecord) -> bool {
        match self.jobs.iter_mut().find(|j| j.id == record.id) {
            Some(slot) => {
                *slot = JobSnapshot::from(record);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &JobId) -> Option<&JobSnapshot> {
        self.jobs.iter().find(|j| &j.id == id)
    }
}

/// Keep `board` in step with the queue until the queue's event channel closes
pub fn spawn_board_refresher(queue: QueueManager, board: watch::Sender<Board>) -> JoinHandle<()> {
    let mut events = queue.subscribe();
    tokio::spawn(async move {
        refresh(&queue, &board, None).await;
        loop {
            match events.recv().await {
                Ok(QueueEvent::Progress(record)) => {
                    let patched = board.send_if_modified(|b| b.patch(&record));
                    if !patched {
                        refresh(&queue, &board, None).await;
                    }
                }
                Ok(QueueEvent::ToolMissing { message }) => {
                    refresh(&queue, &board, Some(message)).await;
                }
                Ok(QueueEvent::PersistenceFailed { message }) => {
                    refresh(&queue, &board, Some(format!("queue not saved: {}", message))).await;
                }
                Ok(QueueEvent::Added(_))
                | Ok(QueueEvent::Updated(_))
                | Ok(QueueEvent::Removed(_))
                | Ok(QueueEvent::Idle) => {
                    refresh(&queue, &board, None).await;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!("Board refresher lagged by {} events", missed);
                    refresh(&queue, &board, None).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        warn!("Queue event channel closed; board no longer updated");
    })
}

async fn refresh(queue: &QueueManager, board: &watch::Sender<Board>, notice: Option<String>) {
    let records = queue.snapshot().await;
    let stats = queue.stats().await;
    board.send_modify(|b| {
        let previous = b.notice.take();
        *b = Board::from_records(&records, stats);
        b.notice = notice.or(previous);
    });
}
