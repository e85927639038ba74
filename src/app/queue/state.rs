//! Internal state of the queue manager
//!
//! Holds the ordered job records and the bookkeeping for running jobs. All
//! methods are synchronous; the manager calls them under its mutex.

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::debug;

use super::types::QueueStats;
use crate::app::models::{JobId, JobRecord, JobStatus};
use crate::app::runner::CancelHandle;

/// Why a running job was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopIntent {
    /// User cancel; ends as Cancelled
    Cancel,
    /// User pause; parks as Paused
    Pause,
    /// Shutdown; returns to Queued
    Requeue,
}

impl StopIntent {
    /// Status the record ends in once the run stops
    pub fn target_status(&self) -> JobStatus {
        match self {
            StopIntent::Cancel => JobStatus::Cancelled,
            StopIntent::Pause => JobStatus::Paused,
            StopIntent::Requeue => JobStatus::Queued,
        }
    }
}

/// Bookkeeping for one running job
#[derive(Debug)]
pub struct ActiveRun {
    pub cancel: CancelHandle,
    pub intent: Option<StopIntent>,
    /// Flips to `true` once the outcome has been applied
    pub done: watch::Receiver<bool>,
}

/// Ordered job records plus scheduler flags
#[derive(Debug, Default)]
pub struct QueueState {
    /// Records in scheduling order
    jobs: Vec<JobRecord>,
    /// Running jobs by id
    active: HashMap<JobId, ActiveRun>,
    next_seq: u64,
    /// Scheduling loop started
    pub scheduling: bool,
    /// Tool-missing condition already surfaced
    pub tool_missing: bool,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build state from persisted records
    pub fn from_records(records: Vec<JobRecord>) -> Self {
        let next_seq = records.iter().map(|r| r.seq + 1).max().unwrap_or(0);
        let mut state = Self {
            jobs: records,
            next_seq,
            ..Self::default()
        };
        state.resort();
        state
    }

    /// Move records persisted as Running back to Queued
    ///
    /// Returns how many records were reset.
    pub fn reconcile(&mut self) -> usize {
        let mut reset = 0;
        for job in self.jobs.iter_mut().filter(|j| j.status == JobStatus::Running) {
            debug!("Reconciling interrupted job {}", job.id);
            job.requeue(JobStatus::Queued);
            reset += 1;
        }
        reset
    }

    /// Allocate the next insertion sequence number
    pub fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.iter().any(|j| &j.id == id)
    }

    /// Insert keeping scheduling order
    pub fn insert(&mut self, record: JobRecord) {
        let key = record.sort_key();
        let pos = self.jobs.partition_point(|j| j.sort_key() <= key);
        self.jobs.insert(pos, record);
    }

    pub fn get(&self, id: &JobId) -> Option<&JobRecord> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    pub fn get_mut(&mut self, id: &JobId) -> Option<&mut JobRecord> {
        self.jobs.iter_mut().find(|j| &j.id == id)
    }

    pub fn remove(&mut self, id: &JobId) -> Option<JobRecord> {
        let pos = self.jobs.iter().position(|j| &j.id == id)?;
        Some(self.jobs.remove(pos))
    }

    /// Remove every record matching the predicate, returning them
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&JobRecord) -> bool) -> Vec<JobRecord> {
        let (removed, kept): (Vec<JobRecord>, Vec<JobRecord>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|j| predicate(j));
        self.jobs = kept;
        removed
    }

    /// Restore scheduling order after a priority change
    pub fn resort(&mut self) {
        self.jobs.sort_by_key(JobRecord::sort_key);
    }

    pub fn records(&self) -> &[JobRecord] {
        &self.jobs
    }

    pub fn running_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .count()
    }

    /// Highest-priority Queued record
    pub fn next_eligible(&self) -> Option<JobId> {
        self.jobs
            .iter()
            .find(|j| j.status == JobStatus::Queued)
            .map(|j| j.id.clone())
    }

    pub fn attach(&mut self, id: JobId, cancel: CancelHandle, done: watch::Receiver<bool>) {
        self.active.insert(
            id,
            ActiveRun {
                cancel,
                intent: None,
                done,
            },
        );
    }

    pub fn active(&self, id: &JobId) -> Option<&ActiveRun> {
        self.active.get(id)
    }

    pub fn active_mut(&mut self, id: &JobId) -> Option<&mut ActiveRun> {
        self.active.get_mut(id)
    }

    pub fn detach(&mut self, id: &JobId) -> Option<ActiveRun> {
        self.active.remove(id)
    }

    pub fn active_ids(&self) -> Vec<JobId> {
        self.active.keys().cloned().collect()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::from_records(&self.jobs, self.scheduling)
    }
}
