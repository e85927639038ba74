//! Media metadata queries
//!
//! Asks the download tool to describe a URL without downloading anything
//! (`--dump-json --no-download`) and decodes the fields the queue uses: the
//! title for display names, the duration, and the heights on offer.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::progress::{OutputLine, OutputParser};
use crate::app::format::{format_timestamp, Quality};
use crate::constants::ytdlp::{INFO_TIMEOUT, MAX_ERROR_LINES};
use crate::errors::{RunnerError, RunnerResult};

/// Metadata the tool reports for one URL
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MediaInfo {
    pub id: String,
    pub title: Option<String>,
    pub webpage_url: Option<String>,
    /// Seconds; some extractors report fractions
    pub duration: Option<f64>,
    pub channel: Option<String>,
    pub uploader: Option<String>,
    /// `YYYYMMDD` as printed by the tool
    pub upload_date: Option<String>,
    pub view_count: Option<u64>,
    pub formats: Vec<MediaFormat>,
}

/// One downloadable stream
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MediaFormat {
    pub format_id: String,
    pub ext: String,
    /// `1920x1080`, `720p` or `audio only`
    pub resolution: Option<String>,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub fps: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

impl MediaFormat {
    /// Frame height, from `height` or parsed out of `resolution`
    pub fn height_hint(&self) -> Option<u32> {
        if self.height.is_some() {
            return self.height;
        }
        let resolution = self.resolution.as_deref()?.trim();
        if let Some((_, h)) = resolution.split_once('x') {
            return h.parse().ok();
        }
        resolution.strip_suffix('p')?.parse().ok()
    }
}

impl MediaInfo {
    /// Decode the tool's JSON output
    ///
    /// The first non-empty line is used; `--no-playlist` yields one object.
    pub fn from_json(url: &str, output: &str) -> RunnerResult<Self> {
        let line = output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| RunnerError::Info {
                url: url.to_string(),
                reason: "tool printed no metadata".to_string(),
            })?;
        serde_json::from_str(line).map_err(|e| RunnerError::Info {
            url: url.to_string(),
            reason: format!("unreadable metadata: {}", e),
        })
    }

    /// Non-blank title
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Channel name, falling back to the uploader
    pub fn channel_name(&self) -> Option<&str> {
        self.channel.as_deref().or(self.uploader.as_deref())
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u64)
    }

    /// Qualities worth offering, best first
    ///
    /// A capped quality is listed when some stream is at least that tall;
    /// `best` and `worst` are always listed.
    pub fn available_qualities(&self) -> Vec<Quality> {
        let tallest = self.formats.iter().filter_map(MediaFormat::height_hint).max();
        Quality::ALL
            .iter()
            .copied()
            .filter(|quality| match quality.max_height() {
                Some(height) => tallest.is_some_and(|t| t >= height),
                None => true,
            })
            .collect()
    }

    /// Multi-line summary for the terminal
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("title:     {}", self.display_title().unwrap_or("(untitled)"))];
        if let Some(channel) = self.channel_name() {
            lines.push(format!("channel:   {}", channel));
        }
        if let Some(secs) = self.duration_secs() {
            lines.push(format!("duration:  {}", format_timestamp(secs)));
        }
        if let Some(date) = &self.upload_date {
            lines.push(format!("uploaded:  {}", date));
        }
        if let Some(views) = self.view_count {
            lines.push(format!("views:     {}", views));
        }
        let qualities: Vec<&str> = self.available_qualities().iter().map(Quality::key).collect();
        lines.push(format!("qualities: {}", qualities.join(", ")));
        lines.join("\n")
    }
}

/// Run `program` with metadata-query `args` and decode its answer
pub(crate) async fn query_info(
    program: &Path,
    args: Vec<OsString>,
    parser: &OutputParser,
    url: &str,
) -> RunnerResult<MediaInfo> {
    debug!("Querying {} {:?}", program.display(), args);

    let mut command = Command::new(program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    command.creation_flags(0x0800_0000);

    let output = match timeout(INFO_TIMEOUT, command.output()).await {
        Ok(result) => result.map_err(|source| RunnerError::Spawn {
            program: program.to_path_buf(),
            source,
        })?,
        Err(_) => {
            warn!("Metadata query for {} timed out", url);
            return Err(RunnerError::Info {
                url: url.to_string(),
                reason: format!("no answer after {}s", INFO_TIMEOUT.as_secs()),
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut errors = VecDeque::new();
        for line in stderr.lines() {
            if let OutputLine::Error(text) = parser.parse_line(line) {
                if errors.len() == MAX_ERROR_LINES {
                    errors.pop_front();
                }
                errors.push_back(text);
            }
        }
        let reason = if errors.is_empty() {
            match output.status.code() {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            }
        } else {
            Vec::from(errors).join("\n")
        };
        return Err(RunnerError::Info {
            url: url.to_string(),
            reason,
        });
    }

    let info = MediaInfo::from_json(url, &String::from_utf8_lossy(&output.stdout))?;
    info!(
        "Read metadata for {}: {}",
        url,
        info.display_title().unwrap_or("(untitled)")
    );
    Ok(info)
}
