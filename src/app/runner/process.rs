//! Subprocess runner
//!
//! Launches the download tool for a job, reads both output streams line by
//! line, forwards parsed progress, and reports one terminal outcome. A stop
//! request sends SIGTERM (unix) and escalates to a kill after the grace period.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use super::args::{build_args, info_args, RunnerConfig};
use super::handle::{RunHandle, RunOutcome, RunReporter, StopRequest, StopSignal};
use super::info::{query_info, MediaInfo};
use super::progress::{OutputLine, OutputParser};
use crate::app::models::JobRecord;
use crate::app::tools::ToolLocator;
use crate::constants::queue::RUN_EVENT_BUFFER;
use crate::constants::ytdlp::MAX_ERROR_LINES;
use crate::errors::{RunnerError, RunnerResult};

/// Starts a run for a job
///
/// The queue manager only talks to this trait; the production implementation
/// is [`ProcessRunner`].
pub trait JobLauncher: Send + Sync {
    /// Launch the job, returning its event stream
    ///
    /// Errors describe launch failures only; a process that starts and then
    /// fails reports [`RunOutcome::Failure`] through the handle.
    fn launch(&self, job: &JobRecord) -> RunnerResult<RunHandle>;

    /// Read a URL's metadata without downloading it
    fn media_info<'a>(&'a self, url: &'a str) -> BoxFuture<'a, RunnerResult<MediaInfo>> {
        Box::pin(async move {
            Err(RunnerError::Info {
                url: url.to_string(),
                reason: "metadata queries are not supported by this launcher".to_string(),
            })
        })
    }
}

/// Runs the download tool as a child process
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    locator: ToolLocator,
    config: Arc<RunnerConfig>,
    parser: OutputParser,
}

impl ProcessRunner {
    pub fn new(locator: ToolLocator, config: RunnerConfig) -> Self {
        Self {
            locator,
            config: Arc::new(config),
            parser: OutputParser::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn locator(&self) -> &ToolLocator {
        &self.locator
    }

    /// Read a URL's metadata without downloading it
    pub async fn tool_info(&self, url: &str) -> RunnerResult<MediaInfo> {
        let tools = self.locator.resolve()?;
        let args = info_args(url, &tools, &self.config);
        query_info(&tools.ytdlp, args, &self.parser, url).await
    }
}

impl JobLauncher for ProcessRunner {
    fn launch(&self, job: &JobRecord) -> RunnerResult<RunHandle> {
        let tools = self.locator.resolve()?;

        let output_dir = self.config.output_dir_for(job).to_path_buf();
        std::fs::create_dir_all(&output_dir).map_err(|source| RunnerError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let args = build_args(job, &tools, &self.config);
        debug!("Launching {} {:?}", tools.ytdlp.display(), args);

        let mut command = Command::new(&tools.ytdlp);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // No console window for the child on Windows
        #[cfg(windows)]
        command.creation_flags(0x0800_0000);

        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: tools.ytdlp.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(RunnerError::MissingPipe { stream: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(RunnerError::MissingPipe { stream: "stderr" })?;

        info!(
            "Started job {} (pid {:?}): {}",
            job.id,
            child.id(),
            job.url
        );

        let (handle, reporter) = RunHandle::channel(job.id.clone(), RUN_EVENT_BUFFER);
        let supervisor = ChildSupervisor {
            child,
            parser: self.parser.clone(),
            grace: self.config.cancel_timeout,
        };
        tokio::spawn(supervisor.run(
            BufReader::new(stdout).lines(),
            BufReader::new(stderr).lines(),
            reporter,
        ));

        Ok(handle)
    }

    fn media_info<'a>(&'a self, url: &'a str) -> BoxFuture<'a, RunnerResult<MediaInfo>> {
        Box::pin(self.tool_info(url))
    }
}

/// Owns a running child until it exits
struct ChildSupervisor {
    child: Child,
    parser: OutputParser,
    grace: Duration,
}

/// Output collected while the child runs
#[derive(Default)]
struct RunTranscript {
    errors: VecDeque<String>,
    output_path: Option<PathBuf>,
}

impl RunTranscript {
    fn push_error(&mut self, text: String) {
        if self.errors.len() == MAX_ERROR_LINES {
            self.errors.pop_front();
        }
        self.errors.push_back(text);
    }

    fn failure_text(&self, exit_code: Option<i32>) -> String {
        if self.errors.is_empty() {
            match exit_code {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            }
        } else {
            self.errors.iter().cloned().collect::<Vec<_>>().join("\n")
        }
    }
}

enum LineStep {
    Continue,
    ConsumerGone,
}

impl ChildSupervisor {
    async fn run<O, E>(mut self, mut stdout: Lines<O>, mut stderr: Lines<E>, reporter: RunReporter)
    where
        O: AsyncBufRead + Unpin,
        E: AsyncBufRead + Unpin,
    {
        let job_id = reporter.job_id().clone();
        let mut stop = reporter.stop_signal();
        let mut transcript = RunTranscript::default();
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            let step = tokio::select! {
                line = stdout.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => self.handle_line(&line, &reporter, &mut transcript).await,
                    Ok(None) => { stdout_open = false; LineStep::Continue }
                    Err(e) => {
                        debug!("Job {} stdout read error: {}", job_id, e);
                        stdout_open = false;
                        LineStep::Continue
                    }
                },
                line = stderr.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => self.handle_line(&line, &reporter, &mut transcript).await,
                    Ok(None) => { stderr_open = false; LineStep::Continue }
                    Err(e) => {
                        debug!("Job {} stderr read error: {}", job_id, e);
                        stderr_open = false;
                        LineStep::Continue
                    }
                },
                request = stop.requested() => {
                    let forced = self.terminate(request, &mut stop).await;
                    reporter.finish(RunOutcome::Cancelled { forced }).await;
                    return;
                }
            };

            if let LineStep::ConsumerGone = step {
                warn!("Job {} lost its consumer; killing process", job_id);
                self.kill().await;
                return;
            }
        }

        let status = tokio::select! {
            status = self.child.wait() => status,
            request = stop.requested() => {
                let forced = self.terminate(request, &mut stop).await;
                reporter.finish(RunOutcome::Cancelled { forced }).await;
                return;
            }
        };

        let outcome = match status {
            Ok(status) if status.success() => {
                info!("Job {} finished", job_id);
                RunOutcome::Success {
                    output_path: transcript.output_path.take(),
                }
            }
            Ok(status) => {
                let exit_code = status.code();
                let error = transcript.failure_text(exit_code);
                warn!("Job {} failed ({:?}): {}", job_id, exit_code, error);
                RunOutcome::Failure { exit_code, error }
            }
            Err(e) => {
                error!("Job {} could not be awaited: {}", job_id, e);
                RunOutcome::Failure {
                    exit_code: None,
                    error: e.to_string(),
                }
            }
        };
        reporter.finish(outcome).await;
    }

    async fn handle_line(
        &self,
        line: &str,
        reporter: &RunReporter,
        transcript: &mut RunTranscript,
    ) -> LineStep {
        match self.parser.parse_line(line) {
            OutputLine::Progress(event) => {
                if let Some(path) = &event.destination {
                    transcript.output_path = Some(path.clone());
                }
                if !reporter.progress(event).await {
                    return LineStep::ConsumerGone;
                }
            }
            OutputLine::Error(text) => {
                debug!("Job {} error line: {}", reporter.job_id(), text);
                transcript.push_error(text);
            }
            OutputLine::Other => {
                if !line.trim().is_empty() {
                    debug!("Job {}: {}", reporter.job_id(), line);
                }
            }
        }
        LineStep::Continue
    }

    /// Stop the child; returns whether it had to be killed
    async fn terminate(&mut self, request: StopRequest, stop: &mut StopSignal) -> bool {
        if request == StopRequest::Kill {
            self.kill().await;
            return true;
        }

        self.request_exit();
        tokio::select! {
            waited = tokio::time::timeout(self.grace, self.child.wait()) => match waited {
                Ok(_) => false,
                Err(_) => {
                    warn!(
                        "Process {:?} ignored termination for {:?}; killing it",
                        self.child.id(),
                        self.grace
                    );
                    self.kill().await;
                    true
                }
            },
            _ = stop.at_least(StopRequest::Kill) => {
                self.kill().await;
                true
            }
        }
    }

    #[cfg(unix)]
    fn request_exit(&mut self) {
        if let Some(pid) = self.child.id() {
            // SAFETY: pid refers to our own child, which has not been reaped yet
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                let _ = self.child.start_kill();
            }
        }
    }

    #[cfg(not(unix))]
    fn request_exit(&mut self) {
        let _ = self.child.start_kill();
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("Kill failed (process likely exited): {}", e);
        }
    }
}
