//! Core data structures for the queue manager
//!
//! Configuration, the events broadcast to observers, and per-status counts.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::models::{JobId, JobRecord, JobStatus};
use crate::constants::queue::{CANCEL_TIMEOUT, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
use crate::constants::DEFAULT_PRIORITY;
use crate::errors::{QueueError, QueueResult};

/// Configuration for the queue manager
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Maximum number of simultaneously running jobs
    pub concurrency_limit: usize,
    /// Grace period a running job gets after a stop request
    pub cancel_timeout: Duration,
    /// Priority used when the caller does not give one
    pub default_priority: i32,
}

impl QueueConfig {
    pub fn new() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            cancel_timeout: CANCEL_TIMEOUT,
            default_priority: DEFAULT_PRIORITY,
        }
    }

    /// Small limits and short timeouts for tests
    pub fn for_testing() -> Self {
        Self {
            concurrency_limit: 2,
            cancel_timeout: Duration::from_millis(200),
            default_priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_timeout = timeout;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> QueueResult<()> {
        if self.concurrency_limit == 0 || self.concurrency_limit > MAX_CONCURRENCY {
            return Err(QueueError::InvalidConfig {
                reason: format!(
                    "concurrency limit must be between 1 and {}, got {}",
                    MAX_CONCURRENCY, self.concurrency_limit
                ),
            });
        }
        if self.cancel_timeout.is_zero() {
            return Err(QueueError::InvalidConfig {
                reason: "cancel timeout must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifications broadcast by the queue manager
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A record was inserted
    Added(JobRecord),
    /// Status, priority or outcome changed
    Updated(JobRecord),
    /// Progress-only change of a running job
    Progress(JobRecord),
    /// A record left the queue
    Removed(JobId),
    /// The download tool is missing; scheduling halted
    ToolMissing { message: String },
    /// Writing the queue file failed
    PersistenceFailed { message: String },
    /// Nothing running and nothing left to schedule
    Idle,
}

/// Per-status counts plus scheduler state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    pub paused: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Whether the scheduling loop is started
    pub scheduling: bool,
}

impl QueueStats {
    /// Count records by status
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a JobRecord>, scheduling: bool) -> Self {
        let mut stats = Self {
            scheduling,
            ..Default::default()
        };
        for record in records {
            match record.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Paused => stats.paused += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.queued + self.running + self.paused + self.completed + self.failed + self.cancelled
    }

    pub fn finished(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }

    /// No job running, and none waiting while the scheduler is started
    pub fn is_idle(&self) -> bool {
        self.running == 0 && (!self.scheduling || self.queued == 0)
    }
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total: {} running, {} queued, {} paused, {} completed, {} failed, {} cancelled",
            self.total(),
            self.running,
            self.queued,
            self.paused,
            self.completed,
            self.failed,
            self.cancelled
        )
    }
}
