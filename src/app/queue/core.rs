//! Core queue manager implementation
//!
//! The [`QueueManager`] owns every job record. All mutations and scheduling
//! passes run under one async mutex, so each pass sees a consistent snapshot
//! and the concurrency limit cannot be overshot. One supervisor task per
//! running job consumes the job's [`RunHandle`] and folds its events back
//! into the queue.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, watch, Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::lock::QueueLock;
use super::persist::QueueStore;
use super::state::{QueueState, StopIntent};
use super::types::{QueueConfig, QueueEvent, QueueStats};
use crate::app::models::{validate_url, JobId, JobOptions, JobRecord, JobStatus};
use crate::app::runner::{
    CancelHandle, JobLauncher, MediaInfo, ProgressEvent, RunEvent, RunHandle, RunOutcome,
};
use crate::constants::queue::EVENT_CHANNEL_CAPACITY;
use crate::errors::{QueueError, QueueResult, RunnerResult};

/// Extra wait after the runner's own grace period before forcing
const CONFIRM_MARGIN: Duration = Duration::from_secs(2);

/// Persisted, concurrency-limited download queue
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: QueueConfig,
    state: Mutex<QueueState>,
    launcher: Arc<dyn JobLauncher>,
    store: Option<QueueStore>,
    events: broadcast::Sender<QueueEvent>,
    activity: watch::Sender<QueueStats>,
    // Released when the last clone is dropped
    _lock: Option<QueueLock>,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

impl QueueManager {
    /// Open a queue backed by a file
    ///
    /// The queue file is locked for the lifetime of the manager; a file
    /// already owned by another manager fails with [`QueueError::InUse`].
    /// Records persisted as Running are reconciled to Queued and the file is
    /// rewritten before anything can be scheduled. Scheduling starts halted.
    pub async fn open(
        config: QueueConfig,
        launcher: Arc<dyn JobLauncher>,
        store: QueueStore,
    ) -> QueueResult<Self> {
        config.validate()?;
        let lock = QueueLock::acquire(store.path())?;

        let records = store.load_or_empty().await;
        let mut state = QueueState::from_records(records);
        let reset = state.reconcile();
        if reset > 0 {
            info!("Reconciled {} interrupted job(s) back to queued", reset);
        }

        let manager = Self::build(config, launcher, Some((store, lock)), state);
        if reset > 0 {
            let state = manager.inner.state.lock().await;
            manager.persist(&state).await;
        }
        Ok(manager)
    }

    /// Queue without a backing file
    pub fn in_memory(config: QueueConfig, launcher: Arc<dyn JobLauncher>) -> QueueResult<Self> {
        config.validate()?;
        Ok(Self::build(config, launcher, None, QueueState::new()))
    }

    fn build(
        config: QueueConfig,
        launcher: Arc<dyn JobLauncher>,
        backing: Option<(QueueStore, QueueLock)>,
        state: QueueState,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (activity, _) = watch::channel(state.stats());
        let (store, lock) = backing.unzip();
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(state),
                launcher,
                store,
                events,
                activity,
                _lock: lock,
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Subscribe to queue events
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    /// Add a download; returns the new job's id
    pub async fn enqueue(
        &self,
        url: &str,
        options: JobOptions,
        priority: Option<i32>,
    ) -> QueueResult<JobId> {
        let url = validate_url(url)?;
        if let Some(clip) = &options.clip {
            clip.validate()?;
        }
        let priority = priority.unwrap_or(self.inner.config.default_priority);

        let mut state = self.inner.state.lock().await;
        let id = unique_id(&state);
        let seq = state.allocate_seq();
        let record = JobRecord::new(id.clone(), url.as_str(), options, priority, seq);
        info!("Enqueued job {} (priority {}): {}", id, priority, record.url);
        state.insert(record.clone());
        self.emit(QueueEvent::Added(record));

        self.settle(&mut state).await;
        Ok(id)
    }

    /// Cancel a job
    ///
    /// Queued and paused jobs leave the queue. A running job is asked to stop
    /// and this call waits for the runner to confirm (forcing after the
    /// timeout). Cancelling a finished job is a no-op.
    pub async fn cancel(&self, id: &JobId) -> QueueResult<JobRecord> {
        let mut state = self.inner.state.lock().await;
        let record = lookup(&state, id)?.clone();

        match record.status {
            status if status.is_terminal() => Ok(record),
            JobStatus::Queued | JobStatus::Paused => {
                let mut removed = state.remove(id).unwrap_or(record);
                removed.mark_cancelled();
                info!("Cancelled job {} before it ran", id);
                self.emit(QueueEvent::Removed(id.clone()));
                self.settle(&mut state).await;
                Ok(removed)
            }
            _ => {
                drop(state);
                self.stop_running(id, StopIntent::Cancel).await
            }
        }
    }

    /// Park a job so it is never scheduled
    ///
    /// A running job is stopped first; the tool picks its partial file up
    /// again on the next run.
    pub async fn pause(&self, id: &JobId) -> QueueResult<JobRecord> {
        let mut state = self.inner.state.lock().await;
        let record = lookup(&state, id)?.clone();

        match record.status {
            JobStatus::Paused => Ok(record),
            JobStatus::Queued => {
                let updated = self.update(&mut state, id, |job| job.status = JobStatus::Paused)?;
                self.settle(&mut state).await;
                Ok(updated)
            }
            JobStatus::Running => {
                drop(state);
                self.stop_running(id, StopIntent::Pause).await
            }
            status => Err(invalid(id, "pause", status)),
        }
    }

    /// Return a paused job to the waiting line
    pub async fn resume(&self, id: &JobId) -> QueueResult<JobRecord> {
        let mut state = self.inner.state.lock().await;
        let record = lookup(&state, id)?.clone();

        match record.status {
            JobStatus::Queued | JobStatus::Running => Ok(record),
            JobStatus::Paused => {
                let updated = self.update(&mut state, id, |job| job.status = JobStatus::Queued)?;
                self.settle(&mut state).await;
                Ok(updated)
            }
            status => Err(invalid(id, "resume", status)),
        }
    }

    /// Change a job's priority and re-sort
    pub async fn reprioritize(&self, id: &JobId, priority: i32) -> QueueResult<JobRecord> {
        let mut state = self.inner.state.lock().await;
        lookup(&state, id)?;
        let updated = self.update(&mut state, id, |job| job.priority = priority)?;
        state.resort();
        debug!("Job {} priority set to {}", id, priority);
        self.settle(&mut state).await;
        Ok(updated)
    }

    /// Set or clear the display title of a job
    pub async fn set_title(&self, id: &JobId, title: Option<String>) -> QueueResult<JobRecord> {
        let mut state = self.inner.state.lock().await;
        lookup(&state, id)?;
        let title = title.filter(|t| !t.trim().is_empty());
        let updated = self.update(&mut state, id, |job| job.title = title)?;
        self.settle(&mut state).await;
        Ok(updated)
    }

    /// Read a URL's metadata through the launcher
    pub async fn media_info(&self, url: &str) -> RunnerResult<MediaInfo> {
        self.inner.launcher.media_info(url).await
    }

    /// Fill a missing title from the URL's metadata; returns the job's title
    ///
    /// The query runs without holding the queue lock. A failed query leaves
    /// the job untitled and never changes its status.
    pub async fn fetch_title(&self, id: &JobId) -> QueueResult<Option<String>> {
        let (url, title) = {
            let state = self.inner.state.lock().await;
            let job = lookup(&state, id)?;
            (job.url.clone(), job.title.clone())
        };
        if title.is_some() {
            return Ok(title);
        }

        let found = match self.media_info(&url).await {
            Ok(info) => info.display_title().map(str::to_string),
            Err(e) => {
                warn!("No title for job {}: {}", id, e);
                None
            }
        };
        let Some(found) = found else {
            return Ok(None);
        };

        let mut state = self.inner.state.lock().await;
        // A title set while the query ran is kept
        let updated = self.update(&mut state, id, |job| {
            job.title.get_or_insert(found);
        })?;
        self.settle(&mut state).await;
        Ok(updated.title)
    }

    /// Queue a fresh copy of a failed or cancelled job
    ///
    /// Also accepted for a running job whose cancellation is in flight.
    pub async fn retry(&self, id: &JobId) -> QueueResult<JobId> {
        let mut state = self.inner.state.lock().await;
        let record = lookup(&state, id)?.clone();

        let cancelling = state
            .active(id)
            .map_or(false, |run| run.intent == Some(StopIntent::Cancel));
        let allowed = matches!(record.status, JobStatus::Failed | JobStatus::Cancelled)
            || (record.status == JobStatus::Running && cancelling);
        if !allowed {
            return Err(invalid(id, "retry", record.status));
        }

        let new_id = unique_id(&state);
        let seq = state.allocate_seq();
        let copy = record.retry_copy(new_id.clone(), seq);
        info!("Retrying job {} as {}", id, new_id);
        state.insert(copy.clone());
        self.emit(QueueEvent::Added(copy));

        self.settle(&mut state).await;
        Ok(new_id)
    }

    /// Delete a record that is not running
    pub async fn remove(&self, id: &JobId) -> QueueResult<JobRecord> {
        let mut state = self.inner.state.lock().await;
        let record = lookup(&state, id)?;
        if record.status == JobStatus::Running {
            return Err(invalid(id, "remove", JobStatus::Running));
        }

        let removed = state.remove(id).ok_or_else(|| QueueError::JobNotFound {
            id: id.to_string(),
        })?;
        self.emit(QueueEvent::Removed(id.clone()));
        self.settle(&mut state).await;
        Ok(removed)
    }

    /// Drop completed, failed and cancelled records
    pub async fn clear_finished(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let removed = state.remove_where(|job| job.status.is_terminal());
        for record in &removed {
            self.emit(QueueEvent::Removed(record.id.clone()));
        }
        if !removed.is_empty() {
            info!("Cleared {} finished job(s)", removed.len());
            self.settle(&mut state).await;
        }
        removed.len()
    }

    /// Begin scheduling; clears a previous tool-missing halt
    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        state.scheduling = true;
        state.tool_missing = false;
        info!(
            "Queue started (limit {})",
            self.inner.config.concurrency_limit
        );
        self.settle(&mut state).await;
    }

    /// Halt scheduling; running jobs continue
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        state.scheduling = false;
        info!("Queue stopped");
        self.publish(&state);
    }

    /// Halt scheduling and stop every running job, returning it to Queued
    pub async fn shutdown(&self) {
        let waits = {
            let mut state = self.inner.state.lock().await;
            state.scheduling = false;
            let mut waits = Vec::new();
            for id in state.active_ids() {
                if let Some(run) = state.active_mut(&id) {
                    run.intent = Some(StopIntent::Requeue);
                    run.cancel.terminate();
                    waits.push((id, run.cancel.clone(), run.done.clone()));
                }
            }
            self.publish(&state);
            waits
        };

        if !waits.is_empty() {
            info!("Stopping {} running job(s) for shutdown", waits.len());
        }
        let confirmations = waits
            .into_iter()
            .map(|(id, cancel, done)| self.confirm_stop(id, cancel, done, StopIntent::Requeue));
        futures::future::join_all(confirmations).await;

        let state = self.inner.state.lock().await;
        self.persist(&state).await;
    }

    pub async fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.inner.state.lock().await.get(id).cloned()
    }

    /// All records in scheduling order
    pub async fn snapshot(&self) -> Vec<JobRecord> {
        self.inner.state.lock().await.records().to_vec()
    }

    pub async fn stats(&self) -> QueueStats {
        self.inner.state.lock().await.stats()
    }

    /// Resolve once nothing runs and nothing waits to be scheduled
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.activity.subscribe();
        let _ = rx.wait_for(QueueStats::is_idle).await;
    }

    /// Ask a running job to stop and wait for the outcome
    async fn stop_running(&self, id: &JobId, intent: StopIntent) -> QueueResult<JobRecord> {
        let (cancel, done) = {
            let mut state = self.inner.state.lock().await;
            let status = lookup(&state, id)?.status;
            let Some(run) = state.active_mut(id) else {
                // Finished between the caller's check and now
                return lookup(&state, id).cloned();
            };
            if status != JobStatus::Running {
                return Err(invalid(id, intent_action(intent), status));
            }
            // Last request wins
            run.intent = Some(intent);
            run.cancel.terminate();
            info!("Stopping job {} ({:?})", id, intent);
            (run.cancel.clone(), run.done.clone())
        };

        self.confirm_stop(id.clone(), cancel, done, intent).await;

        let state = self.inner.state.lock().await;
        lookup(&state, id).cloned()
    }

    /// Wait for a stop to be confirmed, escalating when it is not
    async fn confirm_stop(
        &self,
        id: JobId,
        cancel: CancelHandle,
        mut done: watch::Receiver<bool>,
        intent: StopIntent,
    ) {
        let patience = self.inner.config.cancel_timeout + CONFIRM_MARGIN;
        if timeout(patience, done.wait_for(|d| *d)).await.is_ok() {
            return;
        }

        warn!("Job {} did not confirm stop within {:?}; killing", id, patience);
        cancel.kill();
        if timeout(CONFIRM_MARGIN, done.wait_for(|d| *d)).await.is_ok() {
            return;
        }

        // Runner unresponsive: free the slot anyway
        let mut state = self.inner.state.lock().await;
        if state.detach(&id).is_some() {
            error!("Job {} runner unresponsive; detaching it", id);
            let target = intent.target_status();
            let _ = self.update(&mut state, &id, |job| match target {
                JobStatus::Cancelled => job.mark_cancelled(),
                other => job.requeue(other),
            });
            self.settle(&mut state).await;
        }
    }

    /// Launch eligible jobs until the limit is reached
    fn schedule(&self, state: &mut QueueState) {
        if !state.scheduling {
            return;
        }

        while state.running_count() < self.inner.config.concurrency_limit {
            let Some(id) = state.next_eligible() else {
                break;
            };
            let Some(record) = state.get(&id).cloned() else {
                break;
            };

            match self.inner.launcher.launch(&record) {
                Ok(handle) => {
                    let (done_tx, done_rx) = watch::channel(false);
                    state.attach(id.clone(), handle.cancel_handle(), done_rx);
                    let _ = self.update(state, &id, JobRecord::mark_running);
                    debug!("Job {} launched ({} running)", id, state.running_count());
                    tokio::spawn(self.clone().supervise(handle, done_tx));
                }
                Err(e) if e.is_tool_missing() => {
                    state.scheduling = false;
                    if !state.tool_missing {
                        state.tool_missing = true;
                        error!("{}; scheduling halted until the queue is started again", e);
                        self.emit(QueueEvent::ToolMissing {
                            message: e.to_string(),
                        });
                    }
                    break;
                }
                Err(e) => {
                    error!("Failed to launch job {}: {}", id, e);
                    let _ = self.update(state, &id, |job| job.mark_failed(e.to_string()));
                }
            }
        }
    }

    /// Consume one job's event stream
    async fn supervise(self, mut handle: RunHandle, done: watch::Sender<bool>) {
        let id = handle.job_id().clone();
        while let Some(event) = handle.next().await {
            match event {
                RunEvent::Progress(progress) => self.apply_progress(&id, &progress).await,
                RunEvent::Finished(outcome) => {
                    self.apply_outcome(&id, outcome).await;
                    break;
                }
            }
        }
        let _ = done.send(true);
    }

    async fn apply_progress(&self, id: &JobId, progress: &ProgressEvent) {
        let mut state = self.inner.state.lock().await;
        if let Some(job) = state.get_mut(id).filter(|j| j.status == JobStatus::Running) {
            job.apply_progress(progress);
            let snapshot = job.clone();
            self.emit(QueueEvent::Progress(snapshot));
        }
    }

    async fn apply_outcome(&self, id: &JobId, outcome: RunOutcome) {
        let mut state = self.inner.state.lock().await;
        let Some(run) = state.detach(id) else {
            debug!("Outcome for detached job {} ignored", id);
            return;
        };
        if state.get(id).map(|j| j.status) != Some(JobStatus::Running) {
            return;
        }

        let result = self.update(&mut state, id, |job| match outcome {
            RunOutcome::Success { output_path } => {
                info!("Job {} completed", job.id);
                job.mark_completed(output_path);
            }
            RunOutcome::Failure { exit_code, error } => {
                warn!("Job {} failed (exit {:?}): {}", job.id, exit_code, error);
                job.mark_failed(error);
            }
            RunOutcome::Cancelled { forced } => {
                if forced {
                    warn!("Job {} had to be killed", job.id);
                }
                match run.intent.unwrap_or(StopIntent::Cancel) {
                    StopIntent::Cancel => job.mark_cancelled(),
                    intent => job.requeue(intent.target_status()),
                }
            }
        });
        if result.is_err() {
            return;
        }

        self.settle(&mut state).await;
        if state.stats().is_idle() {
            self.emit(QueueEvent::Idle);
        }
    }

    /// Mutate a record and broadcast the change
    fn update(
        &self,
        state: &mut QueueState,
        id: &JobId,
        change: impl FnOnce(&mut JobRecord),
    ) -> QueueResult<JobRecord> {
        let job = state.get_mut(id).ok_or_else(|| QueueError::JobNotFound {
            id: id.to_string(),
        })?;
        change(job);
        let updated = job.clone();
        self.emit(QueueEvent::Updated(updated.clone()));
        Ok(updated)
    }

    /// Scheduling pass, then persist and publish
    async fn settle(&self, state: &mut MutexGuard<'_, QueueState>) {
        self.schedule(state);
        self.persist(state).await;
        self.publish(state);
    }

    async fn persist(&self, state: &QueueState) {
        let Some(store) = &self.inner.store else {
            return;
        };
        if let Err(e) = store.save(state.records()).await {
            error!("Failed to persist queue: {}", e);
            self.emit(QueueEvent::PersistenceFailed {
                message: e.to_string(),
            });
        }
    }

    fn publish(&self, state: &QueueState) {
        self.inner.activity.send_replace(state.stats());
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.inner.events.send(event);
    }
}

fn unique_id(state: &QueueState) -> JobId {
    loop {
        let id = JobId::generate();
        if !state.contains(&id) {
            return id;
        }
    }
}

fn lookup<'a>(state: &'a QueueState, id: &JobId) -> QueueResult<&'a JobRecord> {
    state.get(id).ok_or_else(|| QueueError::JobNotFound {
        id: id.to_string(),
    })
}

fn invalid(id: &JobId, action: &'static str, status: JobStatus) -> QueueError {
    QueueError::InvalidTransition {
        id: id.to_string(),
        action,
        status: status.to_string(),
    }
}

fn intent_action(intent: StopIntent) -> &'static str {
    match intent {
        StopIntent::Cancel => "cancel",
        StopIntent::Pause => "pause",
        StopIntent::Requeue => "requeue",
    }
}
