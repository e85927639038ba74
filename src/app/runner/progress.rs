//! Download tool output parsing
//!
//! Turns the tool's `--newline` output into progress events. Every line is
//! classified independently; the parser keeps no state between lines.

use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::ytdlp::ERROR_MARKER;

/// Coarse phase of a running job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Fetching media streams
    Downloading,
    /// Post-processing (merge, audio extraction, embedding)
    Processing,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Downloading => "downloading",
            Stage::Processing => "processing",
        }
    }
}

/// One progress observation from the tool
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Percentage 0..=100 when the line carries one
    pub percent: Option<f64>,
    /// Transfer rate as printed by the tool
    pub speed: Option<String>,
    /// Remaining time as printed by the tool
    pub eta: Option<String>,
    /// Total size as printed by the tool
    pub total: Option<String>,
    pub stage: Stage,
    /// File the tool reported writing to
    pub destination: Option<PathBuf>,
}

impl ProgressEvent {
    fn stage_only(stage: Stage) -> Self {
        Self {
            percent: None,
            speed: None,
            eta: None,
            total: None,
            stage,
            destination: None,
        }
    }

    fn destination(stage: Stage, path: &str) -> Self {
        Self {
            destination: Some(PathBuf::from(path.trim().trim_matches('"'))),
            ..Self::stage_only(stage)
        }
    }
}

/// Classification of a single output line
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(ProgressEvent),
    /// Text following the error marker
    Error(String),
    Other,
}

/// Line parser for the download tool's output
#[derive(Debug, Clone)]
pub struct OutputParser {
    error: Regex,
    percent: Regex,
    finished: Regex,
    destination: Regex,
    already: Regex,
    merger: Regex,
    extract_audio: Regex,
    postprocess: Regex,
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser {
    pub fn new() -> Self {
        Self {
            // Marker at line start, optionally after one `[component]` tag
            error: compile(&format!(
                r"^(?:\[[^\]]+\]\s+)?{}\s*(.*)$",
                regex::escape(ERROR_MARKER)
            )),
            percent: compile(
                r"^\[download\]\s+(\d+(?:\.\d+)?)%\s+of\s+~?\s*(\S+)(?:\s+at\s+(.+?))?(?:\s+ETA\s+(\S+))?(?:\s+\(frag.*\))?\s*$",
            ),
            finished: compile(r"^\[download\]\s+100(?:\.0+)?%\s+of\s+~?\s*(\S+)\s+in\s+"),
            destination: compile(r"^\[download\]\s+Destination:\s+(.+)$"),
            already: compile(r"^\[download\]\s+(.+?)\s+has already been downloaded"),
            merger: compile(r#"^\[Merger\]\s+Merging formats into\s+"(.+)"\s*$"#),
            extract_audio: compile(r"^\[ExtractAudio\]\s+Destination:\s+(.+)$"),
            postprocess: compile(
                r"^\[(VideoConvertor|VideoRemuxer|EmbedSubtitle|EmbedThumbnail|Metadata|Fixup\w*|ModifyChapters|FFmpeg\w*)\]",
            ),
        }
    }

    /// Classify one line of output (either stream)
    pub fn parse_line(&self, line: &str) -> OutputLine {
        let line = line.trim_end();

        if let Some(caps) = self.error.captures(line) {
            return OutputLine::Error(caps[1].trim().to_string());
        }

        if let Some(caps) = self.finished.captures(line) {
            return OutputLine::Progress(ProgressEvent {
                percent: Some(100.0),
                total: caps.get(1).map(|m| m.as_str().to_string()),
                ..ProgressEvent::stage_only(Stage::Downloading)
            });
        }

        if let Some(caps) = self.percent.captures(line) {
            let percent = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
            return OutputLine::Progress(ProgressEvent {
                percent,
                total: caps.get(2).map(|m| m.as_str().to_string()),
                speed: caps.get(3).and_then(|m| known(m.as_str())),
                eta: caps.get(4).and_then(|m| known(m.as_str())),
                ..ProgressEvent::stage_only(Stage::Downloading)
            });
        }

        if let Some(caps) = self.destination.captures(line) {
            return OutputLine::Progress(ProgressEvent::destination(Stage::Downloading, &caps[1]));
        }

        if let Some(caps) = self.already.captures(line) {
            let mut event = ProgressEvent::destination(Stage::Downloading, &caps[1]);
            event.percent = Some(100.0);
            return OutputLine::Progress(event);
        }

        if let Some(caps) = self.merger.captures(line) {
            return OutputLine::Progress(ProgressEvent::destination(Stage::Processing, &caps[1]));
        }

        if let Some(caps) = self.extract_audio.captures(line) {
            return OutputLine::Progress(ProgressEvent::destination(Stage::Processing, &caps[1]));
        }

        if self.postprocess.is_match(line) {
            return OutputLine::Progress(ProgressEvent::stage_only(Stage::Processing));
        }

        OutputLine::Other
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("output pattern is a valid regex")
}

/// Drop the tool's placeholder values
fn known(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with("Unknown") {
        None
    } else {
        Some(value.to_string())
    }
}
