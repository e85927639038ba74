//! Data models for ytdlp_queue
//!
//! This module defines the job record and the types it is built from: the
//! job identifier, status, requested options and URL validation.

use std::cmp::Reverse;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::format::{ClipRange, FormatKind, Quality};
use crate::app::runner::{ProgressEvent, Stage};
use crate::constants::queue::JOB_ID_LEN;
use crate::errors::{QueueError, QueueResult};

/// Unique, stable identifier of a job
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(raw[..JOB_ID_LEN].to_string())
    }

    /// Wrap an existing identifier (e.g. typed on the command line)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for a free slot
    Queued,
    /// A process runner is attached
    Running,
    /// Parked by the user; never scheduled
    Paused,
    /// Finished successfully
    Completed,
    /// Process exited with an error
    Failed,
    /// Stopped by the user
    Cancelled,
}

impl JobStatus {
    /// Whether the job has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Lowercase label
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Options requested for a single download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JobOptions {
    /// Media kind (video+audio, video only, audio formats)
    pub format: FormatKind,
    /// Height ceiling for video kinds
    pub quality: Quality,
    /// Partial download range
    pub clip: Option<ClipRange>,
    /// Overrides the configured output directory
    pub output_dir: Option<PathBuf>,
    /// Embed subtitles in these languages
    pub subtitles: Option<Vec<String>>,
    /// Merge container (defaults to mp4 for video kinds)
    pub container: Option<String>,
    /// Additional raw arguments passed to the download tool
    pub extra_args: Vec<String>,
}

impl JobOptions {
    /// Options for a kind and quality, everything else default
    pub fn new(format: FormatKind, quality: Quality) -> Self {
        Self {
            format,
            quality,
            ..Default::default()
        }
    }

    /// Set a clip range
    pub fn with_clip(mut self, clip: ClipRange) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Set an output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

/// Persisted description of one requested download and its current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub options: JobOptions,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub speed: Option<String>,
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default)]
    pub total_size: Option<String>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub error: Option<String>,
    /// Ordering key; higher runs first
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Insertion sequence, last tie-breaker for ordering
    #[serde(default)]
    pub seq: u64,
    /// Job this record was retried from
    #[serde(default)]
    pub retry_of: Option<JobId>,
}

impl JobRecord {
    /// Create a queued record
    pub fn new(id: JobId, url: impl Into<String>, options: JobOptions, priority: i32, seq: u64) -> Self {
        Self {
            id,
            url: url.into(),
            title: None,
            options,
            status: JobStatus::Queued,
            progress: 0.0,
            stage: None,
            speed: None,
            eta: None,
            total_size: None,
            output_path: None,
            error: None,
            priority,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            seq,
            retry_of: None,
        }
    }

    /// Title when known, URL otherwise
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }

    /// Scheduling order: priority descending, then creation time, then sequence
    pub fn sort_key(&self) -> (Reverse<i32>, DateTime<Utc>, u64) {
        (Reverse(self.priority), self.created_at, self.seq)
    }

    /// Attach a runner
    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        self.error = None;
    }

    /// Fold a progress event into the record
    pub fn apply_progress(&mut self, event: &ProgressEvent) {
        if let Some(percent) = event.percent {
            self.progress = percent.clamp(0.0, 100.0);
        }
        self.stage = Some(event.stage);
        if event.speed.is_some() {
            self.speed = event.speed.clone();
        }
        if event.eta.is_some() {
            self.eta = event.eta.clone();
        }
        if event.total.is_some() {
            self.total_size = event.total.clone();
        }
        if let Some(dest) = &event.destination {
            self.output_path = Some(dest.clone());
        }
    }

    /// Successful completion
    pub fn mark_completed(&mut self, output_path: Option<PathBuf>) {
        self.status = JobStatus::Completed;
        self.progress = 100.0;
        self.eta = None;
        self.speed = None;
        if output_path.is_some() {
            self.output_path = output_path;
        }
        self.finished_at = Some(Utc::now());
    }

    /// Failure with captured error text
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.eta = None;
        self.speed = None;
        self.finished_at = Some(Utc::now());
    }

    /// User cancellation
    pub fn mark_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        self.eta = None;
        self.speed = None;
        self.finished_at = Some(Utc::now());
    }

    /// Back to the waiting line, dropping transient progress
    pub fn requeue(&mut self, status: JobStatus) {
        self.status = status;
        self.progress = 0.0;
        self.stage = None;
        self.speed = None;
        self.eta = None;
        self.started_at = None;
    }

    /// Fresh queued copy for the retry action
    pub fn retry_copy(&self, id: JobId, seq: u64) -> Self {
        let mut copy = JobRecord::new(id, self.url.clone(), self.options.clone(), self.priority, seq);
        copy.title = self.title.clone();
        copy.retry_of = Some(self.id.clone());
        copy
    }
}

/// Validate a download URL: http(s) with a host
pub fn validate_url(raw: &str) -> QueueResult<url::Url> {
    let trimmed = raw.trim();
    let parsed = url::Url::parse(trimmed).map_err(|e| QueueError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(QueueError::InvalidUrl {
                url: trimmed.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            })
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(QueueError::InvalidUrl {
            url: trimmed.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_generation() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_eq!(a.as_str().len(), JOB_ID_LEN);
        assert_ne!(a, b);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
        assert!(validate_url("  http://localhost:8080/video  ").is_ok());
        assert!(validate_url("ftp://example.com/file").is_err());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_sort_key_orders_priority_first() {
        let low = JobRecord::new(JobId::new("a"), "https://a.test", JobOptions::default(), 1, 0);
        let high = JobRecord::new(JobId::new("b"), "https://b.test", JobOptions::default(), 2, 1);
        assert!(high.sort_key() < low.sort_key());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut job = JobRecord::new(JobId::new("j1"), "https://x.test", JobOptions::default(), 0, 0);
        job.mark_running();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());

        job.apply_progress(&ProgressEvent {
            percent: Some(42.5),
            speed: Some("1.2MiB/s".to_string()),
            eta: Some("00:10".to_string()),
            total: None,
            stage: Stage::Downloading,
            destination: None,
        });
        assert_eq!(job.progress, 42.5);
        assert_eq!(job.eta.as_deref(), Some("00:10"));

        job.mark_failed("ERROR: unavailable");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.status.is_terminal());

        let copy = job.retry_copy(JobId::new("j2"), 7);
        assert_eq!(copy.status, JobStatus::Queued);
        assert_eq!(copy.retry_of, Some(JobId::new("j1")));
        assert_eq!(copy.progress, 0.0);
        assert!(copy.error.is_none());
        assert_eq!(copy.seq, 7);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&JobStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let back: JobStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(back, JobStatus::Running);
    }
}
