//! Scripted launcher
//!
//! A [`JobLauncher`] that plays back a per-URL script instead of running the
//! download tool. Used to drive the queue deterministically in tests and
//! dry runs.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::app::models::{JobId, JobRecord};
use crate::app::runner::{
    JobLauncher, MediaInfo, ProgressEvent, RunHandle, RunOutcome, RunReporter, Stage,
    StopRequest,
};
use crate::constants::queue::RUN_EVENT_BUFFER;
use crate::errors::{RunnerError, RunnerResult, ToolError};

/// Behaviour of one scripted run
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Report the given percentages, then exit 0 after `after`
    Succeed { after: Duration, steps: Vec<f64> },
    /// Exit non-zero after `after`
    Fail {
        after: Duration,
        exit_code: i32,
        error: String,
    },
    /// Run until asked to stop
    Hang,
    /// Ignore termination requests; only a kill stops it
    Stubborn,
    /// Fail to launch because the download tool is missing
    ToolMissing,
    /// Fail to launch for another reason
    SpawnError,
}

impl Script {
    pub fn succeed(after: Duration) -> Self {
        Script::Succeed {
            after,
            steps: Vec::new(),
        }
    }

    pub fn fail(after: Duration, exit_code: i32, error: impl Into<String>) -> Self {
        Script::Fail {
            after,
            exit_code,
            error: error.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Launcher that plays back scripts keyed by job URL
#[derive(Debug)]
pub struct ScriptedLauncher {
    default: Script,
    scripts: Mutex<HashMap<String, Script>>,
    titles: Mutex<HashMap<String, String>>,
    launched: Mutex<Vec<JobRecord>>,
    gauge: Arc<Gauge>,
}

impl ScriptedLauncher {
    /// Every URL without its own script uses `default`
    pub fn new(default: Script) -> Self {
        Self {
            default,
            scripts: Mutex::new(HashMap::new()),
            titles: Mutex::new(HashMap::new()),
            launched: Mutex::new(Vec::new()),
            gauge: Arc::new(Gauge::default()),
        }
    }

    /// Assign a script to a URL (replacing any previous one)
    pub fn script(&self, url: &str, script: Script) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(url.to_string(), script);
        }
    }

    /// Answer metadata queries for a URL with this title
    pub fn title(&self, url: &str, title: &str) {
        if let Ok(mut titles) = self.titles.lock() {
            titles.insert(url.to_string(), title.to_string());
        }
    }

    /// Records in launch order
    pub fn launched(&self) -> Vec<JobRecord> {
        self.launched.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Ids in launch order
    pub fn launched_ids(&self) -> Vec<JobId> {
        self.launched().into_iter().map(|r| r.id).collect()
    }

    /// Runs currently in flight
    pub fn running(&self) -> usize {
        self.gauge.current.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous runs seen
    pub fn peak_running(&self) -> usize {
        self.gauge.peak.load(Ordering::SeqCst)
    }

    fn script_for(&self, url: &str) -> Script {
        self.scripts
            .lock()
            .ok()
            .and_then(|s| s.get(url).cloned())
            .unwrap_or_else(|| self.default.clone())
    }
}

impl JobLauncher for ScriptedLauncher {
    fn launch(&self, job: &JobRecord) -> RunnerResult<RunHandle> {
        let script = self.script_for(&job.url);
        match script {
            Script::ToolMissing => {
                return Err(RunnerError::Tool(ToolError::NotFound {
                    tool: "yt-dlp".to_string(),
                    searched: "scripted".to_string(),
                }))
            }
            Script::SpawnError => {
                return Err(RunnerError::Spawn {
                    program: PathBuf::from("yt-dlp"),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "scripted"),
                })
            }
            _ => {}
        }

        if let Ok(mut launched) = self.launched.lock() {
            launched.push(job.clone());
        }

        let (handle, reporter) = RunHandle::channel(job.id.clone(), RUN_EVENT_BUFFER);
        let gauge = Arc::clone(&self.gauge);
        gauge.enter();
        tokio::spawn(async move {
            let outcome = play(script, &reporter).await;
            gauge.leave();
            reporter.finish(outcome).await;
        });
        Ok(handle)
    }

    fn media_info<'a>(&'a self, url: &'a str) -> BoxFuture<'a, RunnerResult<MediaInfo>> {
        let title = self.titles.lock().ok().and_then(|t| t.get(url).cloned());
        Box::pin(async move {
            match title {
                Some(title) => Ok(MediaInfo {
                    title: Some(title),
                    webpage_url: Some(url.to_string()),
                    ..Default::default()
                }),
                None => Err(RunnerError::Info {
                    url: url.to_string(),
                    reason: "ERROR: Unsupported URL".to_string(),
                }),
            }
        })
    }
}

async fn play(script: Script, reporter: &RunReporter) -> RunOutcome {
    let mut stop = reporter.stop_signal();
    match script {
        Script::Succeed { after, steps } => {
            for percent in steps {
                reporter
                    .progress(ProgressEvent {
                        percent: Some(percent),
                        speed: Some("1.00MiB/s".to_string()),
                        eta: None,
                        total: Some("10.00MiB".to_string()),
                        stage: Stage::Downloading,
                        destination: None,
                    })
                    .await;
            }
            tokio::select! {
                _ = tokio::time::sleep(after) => RunOutcome::Success {
                    output_path: Some(PathBuf::from(format!("{}.mp4", reporter.job_id()))),
                },
                request = stop.requested() => RunOutcome::Cancelled {
                    forced: request == StopRequest::Kill,
                },
            }
        }
        Script::Fail {
            after,
            exit_code,
            error,
        } => {
            tokio::select! {
                _ = tokio::time::sleep(after) => RunOutcome::Failure {
                    exit_code: Some(exit_code),
                    error,
                },
                request = stop.requested() => RunOutcome::Cancelled {
                    forced: request == StopRequest::Kill,
                },
            }
        }
        Script::Hang => {
            let request = stop.requested().await;
            RunOutcome::Cancelled {
                forced: request == StopRequest::Kill,
            }
        }
        Script::Stubborn => {
            stop.at_least(StopRequest::Kill).await;
            RunOutcome::Cancelled { forced: true }
        }
        Script::ToolMissing | Script::SpawnError => RunOutcome::Failure {
            exit_code: None,
            error: "not launchable".to_string(),
        },
    }
}
