//! Download tool invocation
//!
//! Builds the argument vector for one job from its options, the resolved tool
//! locations and the runner configuration derived from the settings.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::format::format_selector;
use crate::app::models::JobRecord;
use crate::app::tools::ToolPaths;
use crate::constants::queue::CANCEL_TIMEOUT;
use crate::constants::ytdlp::{DEFAULT_MERGE_FORMAT, OUTPUT_TEMPLATE};

/// Settings that shape every invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Output directory used when a job does not override it
    pub output_dir: PathBuf,
    pub embed_thumbnail: bool,
    pub embed_metadata: bool,
    pub embed_subtitles: bool,
    pub subtitle_languages: Vec<String>,
    /// Value for `-r`, e.g. `2M`
    pub rate_limit: Option<String>,
    pub merge_output_format: String,
    pub proxy: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub cookies_from_browser: Option<String>,
    pub retries: Option<u32>,
    pub fragment_retries: Option<u32>,
    pub socket_timeout: Option<Duration>,
    /// Grace period between termination request and forced kill
    pub cancel_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            embed_thumbnail: false,
            embed_metadata: false,
            embed_subtitles: false,
            subtitle_languages: vec!["en".to_string()],
            rate_limit: None,
            merge_output_format: DEFAULT_MERGE_FORMAT.to_string(),
            proxy: None,
            cookies_file: None,
            cookies_from_browser: None,
            retries: None,
            fragment_retries: None,
            socket_timeout: None,
            cancel_timeout: CANCEL_TIMEOUT,
        }
    }
}

impl RunnerConfig {
    /// Directory a job writes into
    pub fn output_dir_for<'a>(&'a self, job: &'a JobRecord) -> &'a Path {
        job.options
            .output_dir
            .as_deref()
            .unwrap_or(self.output_dir.as_path())
    }
}

/// Accumulates arguments as `OsString`s
#[derive(Debug, Default)]
struct ArgList(Vec<OsString>);

impl ArgList {
    fn flag(&mut self, flag: &str) {
        self.0.push(OsString::from(flag));
    }

    fn opt(&mut self, name: &str, value: impl AsRef<OsStr>) {
        self.0.push(OsString::from(name));
        self.0.push(value.as_ref().to_os_string());
    }
}

/// Build the tool arguments (program excluded) for a job
pub fn build_args(job: &JobRecord, tools: &ToolPaths, config: &RunnerConfig) -> Vec<OsString> {
    let options = &job.options;
    let mut args = ArgList::default();

    if let Some(dir) = tools.ffmpeg_dir() {
        args.opt("--ffmpeg-location", dir);
    }

    args.flag("--no-playlist");
    args.opt("--encoding", "utf-8");
    args.flag("--newline");
    args.flag("--progress");
    args.opt("-f", format_selector(options.format, options.quality));
    args.opt("-o", config.output_dir_for(job).join(OUTPUT_TEMPLATE));

    for extra in options.format.extra_args() {
        args.flag(extra);
    }

    if !options.format.is_audio() {
        let container = options
            .container
            .as_deref()
            .unwrap_or(config.merge_output_format.as_str());
        args.opt("--merge-output-format", container);
    }

    if config.embed_thumbnail {
        args.flag("--embed-thumbnail");
    }
    if config.embed_metadata {
        args.flag("--embed-metadata");
    }

    let subtitle_languages = match &options.subtitles {
        Some(langs) if !langs.is_empty() => Some(langs.clone()),
        Some(_) => None,
        None if config.embed_subtitles && !options.format.is_audio() => {
            Some(config.subtitle_languages.clone())
        }
        None => None,
    };
    if let Some(langs) = subtitle_languages {
        args.flag("--embed-subs");
        args.opt("--sub-langs", langs.join(","));
    }

    if let Some(clip) = &options.clip {
        args.opt("--download-sections", clip.section_arg());
        args.flag("--force-keyframes-at-cuts");
    }

    if let Some(rate) = &config.rate_limit {
        args.opt("-r", rate);
    }
    network_args(&mut args, config);

    for extra in &options.extra_args {
        args.flag(extra);
    }
    args.flag(&job.url);
    args.0
}

/// Build the arguments for a metadata-only query of `url`
pub fn info_args(url: &str, tools: &ToolPaths, config: &RunnerConfig) -> Vec<OsString> {
    let mut args = ArgList::default();
    if let Some(dir) = tools.ffmpeg_dir() {
        args.opt("--ffmpeg-location", dir);
    }
    args.flag("--no-playlist");
    args.opt("--encoding", "utf-8");
    args.flag("--dump-json");
    args.flag("--no-download");
    network_args(&mut args, config);
    args.flag(url);
    args.0
}

fn network_args(args: &mut ArgList, config: &RunnerConfig) {
    if let Some(proxy) = &config.proxy {
        args.opt("--proxy", proxy);
    }

    // A cookie file takes precedence over reading a browser profile
    if let Some(file) = &config.cookies_file {
        args.opt("--cookies", file);
    } else if let Some(browser) = &config.cookies_from_browser {
        args.opt("--cookies-from-browser", browser);
    }

    if let Some(retries) = config.retries {
        args.opt("--retries", retries.to_string());
    }
    if let Some(retries) = config.fragment_retries {
        args.opt("--fragment-retries", retries.to_string());
    }
    if let Some(timeout) = config.socket_timeout {
        args.opt("--socket-timeout", timeout.as_secs().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::format::{ClipRange, FormatKind, Quality};
    use crate::app::models::{JobId, JobOptions};

    fn job(options: JobOptions) -> JobRecord {
        JobRecord::new(JobId::new("abc"), "https://example.com/watch?v=1", options, 0, 0)
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn tools(ffmpeg: Option<&str>) -> ToolPaths {
        ToolPaths {
            ytdlp: PathBuf::from("/opt/bin/yt-dlp"),
            ffmpeg: ffmpeg.map(PathBuf::from),
        }
    }

    #[test]
    fn test_default_video_invocation() {
        let config = RunnerConfig {
            output_dir: PathBuf::from("/media"),
            ..Default::default()
        };
        let args = strings(&build_args(
            &job(JobOptions::new(FormatKind::VideoAudio, Quality::P1080)),
            &tools(Some("/opt/ffmpeg/bin/ffmpeg")),
            &config,
        ));

        let expected_output = PathBuf::from("/media")
            .join(OUTPUT_TEMPLATE)
            .to_string_lossy()
            .into_owned();
        assert_eq!(
            args,
            vec![
                "--ffmpeg-location",
                "/opt/ffmpeg/bin",
                "--no-playlist",
                "--encoding",
                "utf-8",
                "--newline",
                "--progress",
                "-f",
                "bestvideo[height<=1080]+bestaudio/best[height<=1080]",
                "-o",
                expected_output.as_str(),
                "--merge-output-format",
                "mp4",
                "https://example.com/watch?v=1",
            ]
        );
    }

    #[test]
    fn test_audio_clip_with_network_options() {
        let config = RunnerConfig {
            rate_limit: Some("2M".to_string()),
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
            cookies_file: Some(PathBuf::from("/tmp/cookies.txt")),
            cookies_from_browser: Some("firefox".to_string()),
            retries: Some(5),
            socket_timeout: Some(Duration::from_secs(30)),
            embed_subtitles: true,
            ..Default::default()
        };
        let options = JobOptions::new(FormatKind::AudioMp3, Quality::Best)
            .with_clip(ClipRange::parse("1:00", Some("2:30")).unwrap());
        let args = strings(&build_args(&job(options), &tools(None), &config));

        assert!(!args.contains(&"--ffmpeg-location".to_string()));
        assert!(!args.contains(&"--merge-output-format".to_string()));
        assert!(!args.contains(&"--embed-subs".to_string()));
        assert!(!args.contains(&"--cookies-from-browser".to_string()));

        let joined = args.join(" ");
        assert!(joined.contains("-f bestaudio -o "));
        assert!(joined.contains("--extract-audio --audio-format mp3"));
        assert!(joined.contains("--download-sections *00:01:00-00:02:30 --force-keyframes-at-cuts"));
        assert!(joined.contains("-r 2M --proxy socks5://127.0.0.1:1080 --cookies /tmp/cookies.txt --retries 5 --socket-timeout 30"));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/watch?v=1"));
    }

    #[test]
    fn test_job_overrides() {
        let config = RunnerConfig::default();
        let mut options = JobOptions::new(FormatKind::VideoAudio, Quality::Best)
            .with_output_dir("/elsewhere");
        options.container = Some("mkv".to_string());
        options.subtitles = Some(vec!["en".to_string(), "de".to_string()]);
        options.extra_args = vec!["--no-mtime".to_string()];
        let record = job(options);

        assert_eq!(config.output_dir_for(&record), Path::new("/elsewhere"));

        let args = strings(&build_args(&record, &tools(None), &config));
        let joined = args.join(" ");
        assert!(joined.contains("--merge-output-format mkv"));
        assert!(joined.contains("--embed-subs --sub-langs en,de"));
        assert!(joined.ends_with("--no-mtime https://example.com/watch?v=1"));
    }

    #[test]
    fn test_info_invocation() {
        let config = RunnerConfig {
            rate_limit: Some("1M".to_string()),
            proxy: Some("http://proxy:3128".to_string()),
            cookies_from_browser: Some("chrome".to_string()),
            ..Default::default()
        };
        let args = strings(&info_args(
            "https://example.com/watch?v=2",
            &tools(Some("/opt/ffmpeg/bin/ffmpeg")),
            &config,
        ));

        let expected_ffmpeg_dir = PathBuf::from("/opt/ffmpeg/bin").display().to_string();
        assert_eq!(
            args,
            vec![
                "--ffmpeg-location",
                expected_ffmpeg_dir.as_str(),
                "--no-playlist",
                "--encoding",
                "utf-8",
                "--dump-json",
                "--no-download",
                "--proxy",
                "http://proxy:3128",
                "--cookies-from-browser",
                "chrome",
                "https://example.com/watch?v=2",
            ]
        );
    }
}
