//! Format and quality presets
//!
//! Translates the user's format/quality choice into the download tool's
//! format selector plus the extra arguments the choice needs (audio
//! extraction, target codec). Also holds the clip-range type used for
//! partial downloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{QueueError, QueueResult};

/// What kind of media the user wants out of a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Best video merged with best audio
    #[default]
    VideoAudio,
    /// Video stream without audio
    VideoOnly,
    /// Audio extracted and converted to MP3
    AudioMp3,
    /// Audio in M4A
    AudioM4a,
    /// Audio converted to Opus
    AudioOpus,
    /// Best available audio, original codec
    AudioBest,
}

impl FormatKind {
    /// All kinds, in menu order
    pub const ALL: [FormatKind; 6] = [
        FormatKind::VideoAudio,
        FormatKind::VideoOnly,
        FormatKind::AudioMp3,
        FormatKind::AudioM4a,
        FormatKind::AudioOpus,
        FormatKind::AudioBest,
    ];

    /// Whether this kind produces audio only
    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            FormatKind::AudioMp3 | FormatKind::AudioM4a | FormatKind::AudioOpus | FormatKind::AudioBest
        )
    }

    /// Stable key used in settings and on the command line
    pub fn key(&self) -> &'static str {
        match self {
            FormatKind::VideoAudio => "video_audio",
            FormatKind::VideoOnly => "video_only",
            FormatKind::AudioMp3 => "audio_mp3",
            FormatKind::AudioM4a => "audio_m4a",
            FormatKind::AudioOpus => "audio_opus",
            FormatKind::AudioBest => "audio_best",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            FormatKind::VideoAudio => "Video + Audio",
            FormatKind::VideoOnly => "Video Only",
            FormatKind::AudioMp3 => "Audio (MP3)",
            FormatKind::AudioM4a => "Audio (M4A)",
            FormatKind::AudioOpus => "Audio (Opus)",
            FormatKind::AudioBest => "Audio (Best)",
        }
    }

    /// Extra download tool arguments this kind requires
    pub fn extra_args(&self) -> &'static [&'static str] {
        match self {
            FormatKind::VideoAudio | FormatKind::VideoOnly => &[],
            FormatKind::AudioMp3 => &["--extract-audio", "--audio-format", "mp3"],
            FormatKind::AudioM4a => &["--extract-audio", "--audio-format", "m4a"],
            FormatKind::AudioOpus => &["--extract-audio", "--audio-format", "opus"],
            FormatKind::AudioBest => &["--extract-audio"],
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FormatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        FormatKind::ALL
            .into_iter()
            .find(|kind| kind.key() == normalized)
            .or(match normalized.as_str() {
                "mp3" => Some(FormatKind::AudioMp3),
                "m4a" => Some(FormatKind::AudioM4a),
                "opus" => Some(FormatKind::AudioOpus),
                "audio" => Some(FormatKind::AudioBest),
                "video" => Some(FormatKind::VideoAudio),
                _ => None,
            })
            .ok_or_else(|| {
                let keys: Vec<&str> = FormatKind::ALL.iter().map(|k| k.key()).collect();
                format!("unknown format '{}', expected one of: {}", s, keys.join(", "))
            })
    }
}

/// Video quality ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "4k")]
    P2160,
    #[serde(rename = "1080")]
    P1080,
    #[serde(rename = "720")]
    P720,
    #[serde(rename = "480")]
    P480,
    #[serde(rename = "360")]
    P360,
    #[serde(rename = "worst")]
    Worst,
}

impl Quality {
    /// All qualities, best first
    pub const ALL: [Quality; 7] = [
        Quality::Best,
        Quality::P2160,
        Quality::P1080,
        Quality::P720,
        Quality::P480,
        Quality::P360,
        Quality::Worst,
    ];

    /// Stable key used in settings and on the command line
    pub fn key(&self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::P2160 => "4k",
            Quality::P1080 => "1080",
            Quality::P720 => "720",
            Quality::P480 => "480",
            Quality::P360 => "360",
            Quality::Worst => "worst",
        }
    }

    /// Maximum height for capped qualities
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Quality::P2160 => Some(2160),
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
            Quality::Best | Quality::Worst => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let normalized = normalized.trim_end_matches('p');
        match normalized {
            "2160" | "4k" => Ok(Quality::P2160),
            other => Quality::ALL
                .into_iter()
                .find(|q| q.key() == other)
                .ok_or_else(|| format!("unknown quality '{}'", s)),
        }
    }
}

/// Build the download tool's `-f` selector for a kind and quality.
///
/// Audio kinds ignore the quality; video kinds cap the height.
pub fn format_selector(kind: FormatKind, quality: Quality) -> String {
    match kind {
        FormatKind::AudioM4a => "bestaudio[ext=m4a]/bestaudio".to_string(),
        k if k.is_audio() => "bestaudio".to_string(),
        FormatKind::VideoOnly => match quality.max_height() {
            Some(h) => format!("bestvideo[height<={}]", h),
            None if quality == Quality::Worst => "worstvideo".to_string(),
            None => "bestvideo".to_string(),
        },
        _ => match quality.max_height() {
            Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
            None if quality == Quality::Worst => "worstvideo+worstaudio/worst".to_string(),
            None => "bestvideo+bestaudio/best".to_string(),
        },
    }
}

/// Time range of a partial download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRange {
    /// Start offset in seconds
    pub start_secs: u64,
    /// End offset in seconds; `None` means until the end of the media
    pub end_secs: Option<u64>,
}

impl ClipRange {
    /// Build a clip range from user-entered timestamps
    pub fn parse(start: &str, end: Option<&str>) -> QueueResult<Self> {
        let start_secs = parse_timestamp(start).ok_or_else(|| QueueError::InvalidClip {
            reason: format!("bad start time '{}'", start),
        })?;
        let end_secs = match end.map(str::trim).filter(|e| !e.is_empty()) {
            Some(e) => Some(parse_timestamp(e).ok_or_else(|| QueueError::InvalidClip {
                reason: format!("bad end time '{}'", e),
            })?),
            None => None,
        };
        let range = Self {
            start_secs,
            end_secs,
        };
        range.validate()?;
        Ok(range)
    }

    /// Check that the end (if any) lies after the start
    pub fn validate(&self) -> QueueResult<()> {
        match self.end_secs {
            Some(end) if end <= self.start_secs => Err(QueueError::InvalidClip {
                reason: format!(
                    "end {} is not after start {}",
                    format_timestamp(end),
                    format_timestamp(self.start_secs)
                ),
            }),
            _ => Ok(()),
        }
    }

    /// Value for `--download-sections`
    pub fn section_arg(&self) -> String {
        match self.end_secs {
            Some(end) => format!(
                "*{}-{}",
                format_timestamp(self.start_secs),
                format_timestamp(end)
            ),
            None => format!("*{}-inf", format_timestamp(self.start_secs)),
        }
    }
}

impl fmt::Display for ClipRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_secs {
            Some(end) => write!(
                f,
                "{}-{}",
                format_timestamp(self.start_secs),
                format_timestamp(end)
            ),
            None => write!(f, "{}-end", format_timestamp(self.start_secs)),
        }
    }
}

/// Parse `HH:MM:SS`, `MM:SS` or plain seconds
pub fn parse_timestamp(value: &str) -> Option<u64> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    let nums: Option<Vec<u64>> = parts.iter().map(|p| p.trim().parse::<u64>().ok()).collect();
    let nums = nums?;
    // Overflowing values are rejected like any other malformed timestamp
    match nums.as_slice() {
        [s] => Some(*s),
        [m, s] if *s < 60 => m.checked_mul(60)?.checked_add(*s),
        [h, m, s] if *m < 60 && *s < 60 => h.checked_mul(3600)?.checked_add(m * 60 + s),
        _ => None,
    }
}

/// Format seconds as `HH:MM:SS`
pub fn format_timestamp(total: u64) -> String {
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_for_video_quality() {
        assert_eq!(
            format_selector(FormatKind::VideoAudio, Quality::P1080),
            "bestvideo[height<=1080]+bestaudio/best[height<=1080]"
        );
        assert_eq!(
            format_selector(FormatKind::VideoAudio, Quality::Best),
            "bestvideo+bestaudio/best"
        );
        assert_eq!(
            format_selector(FormatKind::VideoAudio, Quality::Worst),
            "worstvideo+worstaudio/worst"
        );
        assert_eq!(
            format_selector(FormatKind::VideoOnly, Quality::P720),
            "bestvideo[height<=720]"
        );
    }

    #[test]
    fn test_audio_ignores_quality() {
        assert_eq!(format_selector(FormatKind::AudioMp3, Quality::P360), "bestaudio");
        assert_eq!(
            format_selector(FormatKind::AudioM4a, Quality::Best),
            "bestaudio[ext=m4a]/bestaudio"
        );
        assert!(FormatKind::AudioOpus.is_audio());
        assert!(!FormatKind::VideoOnly.is_audio());
        assert_eq!(
            FormatKind::AudioMp3.extra_args(),
            &["--extract-audio", "--audio-format", "mp3"]
        );
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!("audio-mp3".parse::<FormatKind>().unwrap(), FormatKind::AudioMp3);
        assert_eq!("mp3".parse::<FormatKind>().unwrap(), FormatKind::AudioMp3);
        assert!("flac".parse::<FormatKind>().is_err());
        assert_eq!("1080p".parse::<Quality>().unwrap(), Quality::P1080);
        assert_eq!("4K".parse::<Quality>().unwrap(), Quality::P2160);
        assert!("999".parse::<Quality>().is_err());
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(parse_timestamp("90"), Some(90));
        assert_eq!(parse_timestamp("1:30"), Some(90));
        assert_eq!(parse_timestamp("01:02:03"), Some(3723));
        assert_eq!(parse_timestamp("1:75"), None);
        assert_eq!(parse_timestamp("abc"), None);
        assert_eq!(format_timestamp(3723), "01:02:03");
    }

    #[test]
    fn test_clip_range() {
        let clip = ClipRange::parse("0:30", Some("1:45")).unwrap();
        assert_eq!(clip.start_secs, 30);
        assert_eq!(clip.end_secs, Some(105));
        assert_eq!(clip.section_arg(), "*00:00:30-00:01:45");

        let open = ClipRange::parse("10", None).unwrap();
        assert_eq!(open.section_arg(), "*00:00:10-inf");

        assert!(ClipRange::parse("2:00", Some("1:00")).is_err());
        assert!(ClipRange::parse("x", None).is_err());
    }

    #[test]
    fn test_oversized_timestamps_are_rejected() {
        assert_eq!(parse_timestamp("5124095576030432:00:00"), None);
        assert_eq!(parse_timestamp("307445734561825861:00"), None);
        assert_eq!(
            parse_timestamp("5124095576030431:00:00"),
            Some(5_124_095_576_030_431 * 3600)
        );

        match ClipRange::parse("5124095576030432:00:00", None) {
            Err(QueueError::InvalidClip { reason }) => assert!(reason.contains("bad start time")),
            other => panic!("expected InvalidClip, got {:?}", other),
        }
        assert!(ClipRange::parse("0", Some("99999999999999999:59:59")).is_err());
    }
}
