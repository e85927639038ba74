//! Real-time progress display for the queue
//!
//! Renders the coordinator's [`Board`] with indicatif: one summary line for
//! the whole queue and one bar per running job. Bars are created when a job
//! starts and replaced by a one-line result when it leaves the running state.
//! When stderr is not a terminal the display falls back to plain status
//! lines.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ytdlp_queue::app::coordinator::Board;
//! use ytdlp_queue::cli::{ProgressConfig, ProgressDisplay};
//!
//! let mut display = ProgressDisplay::new(ProgressConfig::default());
//! let board = Board::default();
//! display.render(&board);
//! display.finish(&board);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use crossterm::terminal;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::debug;

use crate::app::coordinator::{Board, JobSnapshot};
use crate::app::models::{JobId, JobStatus};
use crate::constants::progress::{MAX_TITLE_WIDTH, REFRESH_INTERVAL};

/// Bar length; positions are tenths of a percent
const BAR_LENGTH: u64 = 1000;

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// How often the caller should redraw
    pub update_interval: Duration,
    /// Maximum width for titles in display
    pub max_title_width: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            update_interval: REFRESH_INTERVAL,
            max_title_width: MAX_TITLE_WIDTH,
        }
    }
}

/// Main progress display manager
pub struct ProgressDisplay {
    config: ProgressConfig,
    multi: Option<MultiProgress>,
    summary: Option<ProgressBar>,
    bars: HashMap<JobId, ProgressBar>,
    /// Last status seen per job, for reporting transitions
    seen: HashMap<JobId, JobStatus>,
    title_width: usize,
}

impl ProgressDisplay {
    /// Create a display; bars are used only when stderr is a terminal
    pub fn new(config: ProgressConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        let title_width = terminal::size()
            .map(|(cols, _)| (cols as usize / 3).clamp(16, config.max_title_width))
            .unwrap_or(config.max_title_width);

        let (multi, summary) = if config.enable_progress_bars && is_terminal {
            let multi = MultiProgress::new();
            let summary = multi.add(ProgressBar::new_spinner());
            summary.set_style(summary_style());
            summary.enable_steady_tick(Duration::from_millis(120));
            (Some(multi), Some(summary))
        } else {
            (None, None)
        };

        debug!(
            "Progress display started ({} mode)",
            if multi.is_some() { "bar" } else { "text" }
        );

        Self {
            config,
            multi,
            summary,
            bars: HashMap::new(),
            seen: HashMap::new(),
            title_width,
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.config.update_interval
    }

    /// Bring the display in line with `board`
    pub fn render(&mut self, board: &Board) {
        for job in &board.jobs {
            let previous = self.seen.insert(job.id.clone(), job.status);
            if job.status == JobStatus::Running {
                self.show_running(job);
            } else if previous.is_some_and(|p| p != job.status) {
                self.show_settled(job);
            }
        }

        let stale: Vec<JobId> = self
            .bars
            .keys()
            .filter(|id| board.get(id).is_none())
            .cloned()
            .collect();
        for id in stale {
            if let Some(bar) = self.bars.remove(&id) {
                bar.finish_and_clear();
            }
        }

        if let Some(summary) = &self.summary {
            summary.set_message(summary_message(board));
        }
    }

    /// Stop drawing and print the final summary
    pub fn finish(&mut self, board: &Board) {
        self.render(board);
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        if let Some(summary) = self.summary.take() {
            summary.finish_and_clear();
        }

        eprintln!("\n{}", board.stats);
        if let Some(notice) = &board.notice {
            eprintln!("{}", notice);
        }
        if board.stats.failed > 0 {
            eprintln!("Some downloads failed; `retry ID` queues them again.");
        }
    }

    fn show_running(&mut self, job: &JobSnapshot) {
        let title = truncate_title(&job.name, self.title_width);
        let message = job_message(job);
        match &self.multi {
            Some(multi) => {
                let bar = self.bars.entry(job.id.clone()).or_insert_with(|| {
                    let bar = multi.add(ProgressBar::new(BAR_LENGTH));
                    bar.set_style(job_style());
                    bar.set_prefix(format!("{} {}", job.id, title));
                    bar
                });
                bar.set_position(position(job.progress));
                bar.set_message(message);
            }
            None => {
                if !self.bars.contains_key(&job.id) {
                    eprintln!("[{}] started: {}", job.id, title);
                    self.bars.insert(job.id.clone(), ProgressBar::hidden());
                }
            }
        }
    }

    fn show_settled(&mut self, job: &JobSnapshot) {
        if let Some(bar) = self.bars.remove(&job.id) {
            bar.finish_and_clear();
        }
        let line = settled_line(job, self.title_width);
        match &self.multi {
            Some(multi) => {
                let _ = multi.println(line);
            }
            None => eprintln!("{}", line),
        }
    }
}

/// Shorten a title to `width` characters
pub fn truncate_title(title: &str, width: usize) -> String {
    if title.chars().count() <= width {
        return title.to_string();
    }
    let keep = width.saturating_sub(3);
    let head: String = title.chars().take(keep).collect();
    format!("{}...", head)
}

/// Message shown next to a running job's bar
pub fn job_message(job: &JobSnapshot) -> String {
    let mut parts = vec![job.status_label.clone()];
    if let Some(speed) = &job.speed {
        parts.push(speed.clone());
    }
    if let Some(eta) = &job.eta {
        parts.push(format!("ETA {}", eta));
    }
    parts.join("  ")
}

/// One line describing a job that left the running state
pub fn settled_line(job: &JobSnapshot, width: usize) -> String {
    let title = truncate_title(&job.name, width);
    match job.status {
        JobStatus::Completed => match &job.output_path {
            Some(path) => format!("[{}] completed: {} -> {}", job.id, title, path.display()),
            None => format!("[{}] completed: {}", job.id, title),
        },
        JobStatus::Failed => format!(
            "[{}] failed: {}: {}",
            job.id,
            title,
            job.error.as_deref().unwrap_or("unknown error")
        ),
        status => format!("[{}] {}: {}", job.id, status, title),
    }
}

/// One row of the `list` table
pub fn list_row(job: &JobSnapshot, width: usize) -> String {
    let detail = match job.status {
        JobStatus::Failed => job.error.clone().unwrap_or_default(),
        JobStatus::Completed => job
            .output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };
    format!(
        "{:<8}  {:>4}  {:<21}  {:>5.1}%  {:<width$}  {}",
        job.id,
        job.priority,
        job.status_label,
        job.progress,
        truncate_title(&job.name, width),
        detail,
        width = width
    )
    .trim_end()
    .to_string()
}

fn summary_message(board: &Board) -> String {
    match &board.notice {
        Some(notice) => format!("{} | {}", board.stats, notice),
        None => board.stats.to_string(),
    }
}

fn position(progress: f64) -> u64 {
    ((progress.clamp(0.0, 100.0) / 100.0) * BAR_LENGTH as f64).round() as u64
}

fn job_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:30.cyan/blue}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

fn summary_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn snapshot(status: JobStatus) -> JobSnapshot {
        JobSnapshot {
            id: JobId::new("ab12cd34"),
            name: "A fairly long video title about Rust".to_string(),
            url: "https://example.com/v".to_string(),
            status,
            status_label: status.label().to_string(),
            progress: 42.0,
            speed: Some("1.5MiB/s".to_string()),
            eta: Some("00:12".to_string()),
            error: None,
            output_path: None,
            priority: 0,
        }
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("short", 10), "short");
        assert_eq!(truncate_title("exactly ten", 11), "exactly ten");
        assert_eq!(truncate_title("a much longer title", 10), "a much ...");
        assert_eq!(truncate_title("ééééé", 4), "é...");
    }

    #[test]
    fn test_job_message() {
        let job = snapshot(JobStatus::Running);
        assert_eq!(job_message(&job), "running  1.5MiB/s  ETA 00:12");
    }

    #[test]
    fn test_settled_lines() {
        let mut job = snapshot(JobStatus::Completed);
        job.output_path = Some(PathBuf::from("/videos/talk.mp4"));
        assert_eq!(
            settled_line(&job, 64),
            "[ab12cd34] completed: A fairly long video title about Rust -> /videos/talk.mp4"
        );

        let mut job = snapshot(JobStatus::Failed);
        job.error = Some("ERROR: Video unavailable".to_string());
        assert!(settled_line(&job, 64).ends_with("failed: A fairly long video title about Rust: ERROR: Video unavailable"));

        let job = snapshot(JobStatus::Paused);
        assert!(settled_line(&job, 64).starts_with("[ab12cd34] paused:"));
    }

    #[test]
    fn test_list_row() {
        let job = snapshot(JobStatus::Queued);
        let row = list_row(&job, 12);
        assert!(row.starts_with("ab12cd34"));
        assert!(row.contains("queued"));
        assert!(row.contains("42.0%"));
        assert!(row.contains("A fairly ..."));
    }

    #[test]
    fn test_position() {
        assert_eq!(position(0.0), 0);
        assert_eq!(position(42.5), 425);
        assert_eq!(position(150.0), BAR_LENGTH);
    }

    #[test]
    fn test_text_mode_render() {
        let mut display = ProgressDisplay::new(ProgressConfig {
            enable_progress_bars: false,
            ..Default::default()
        });
        let mut board = Board {
            jobs: vec![snapshot(JobStatus::Running)],
            ..Default::default()
        };
        display.render(&board);
        assert_eq!(display.bars.len(), 1);

        board.jobs[0].status = JobStatus::Completed;
        display.render(&board);
        assert!(display.bars.is_empty());

        display.finish(&board);
    }
}
