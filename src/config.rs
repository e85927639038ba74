//! Configuration management for ytdlp_queue
//!
//! Settings live in a TOML file under the platform config directory. The file
//! is created with commented defaults on first run; every key is optional and
//! missing keys fall back to defaults. Components never read this structure
//! directly: [`AppConfig::to_runtime_config`] derives the typed runtime
//! configurations they are built from.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::coordinator::CoordinatorConfig;
use crate::app::format::{FormatKind, Quality};
use crate::app::queue::QueueConfig;
use crate::app::runner::RunnerConfig;
use crate::app::tools::ToolLocator;
use crate::constants::logging::DEFAULT_LOG_LEVEL;
use crate::constants::queue::{MAX_CONCURRENCY, QUEUE_FILE_NAME};
use crate::constants::settings::{APP_DIR_NAME, DEFAULT_DOWNLOAD_DIR, SETTINGS_FILE_NAME};
use crate::constants::ytdlp::DEFAULT_MERGE_FORMAT;
use crate::constants::{CANCEL_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_PRIORITY};
use crate::errors::{ConfigError, ConfigResult};

/// Containers the download tool can merge into
const MERGE_FORMATS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi", "flv"];

/// Accepted log levels
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// What to download and where
    pub download: DownloadSettings,
    /// Network options passed to the download tool
    pub network: NetworkSettings,
    /// Explicit tool locations
    pub tools: ToolSettings,
    /// Queue persistence and cancellation
    pub queue: QueueSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Output directory; the user's download directory when unset
    pub output_dir: Option<PathBuf>,
    pub default_format: FormatKind,
    pub default_quality: Quality,
    /// Concurrency limit
    pub concurrent_downloads: usize,
    pub embed_thumbnail: bool,
    pub embed_metadata: bool,
    pub embed_subtitles: bool,
    pub subtitle_languages: Vec<String>,
    /// Download rate cap such as `2M` or `500K`
    pub rate_limit: Option<String>,
    pub merge_output_format: String,
    pub default_priority: i32,
    /// Look up the title of jobs added without one
    pub fetch_titles: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            default_format: FormatKind::default(),
            default_quality: Quality::default(),
            concurrent_downloads: DEFAULT_CONCURRENCY,
            embed_thumbnail: false,
            embed_metadata: true,
            embed_subtitles: false,
            subtitle_languages: vec!["en".to_string()],
            rate_limit: None,
            merge_output_format: DEFAULT_MERGE_FORMAT.to_string(),
            default_priority: DEFAULT_PRIORITY,
            fetch_titles: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetworkSettings {
    pub proxy: Option<String>,
    /// Netscape cookie file; wins over `cookies_from_browser`
    pub cookies_file: Option<PathBuf>,
    pub cookies_from_browser: Option<String>,
    pub retries: Option<u32>,
    pub fragment_retries: Option<u32>,
    pub socket_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolSettings {
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Persisted queue; `<config dir>/queue.json` when unset
    pub queue_file: Option<PathBuf>,
    /// Grace period before a stopping job is killed
    #[serde(with = "humantime_serde")]
    pub cancel_timeout: Duration,
    /// Run the queue straight after adding or importing jobs
    pub autostart: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            queue_file: None,
            cancel_timeout: CANCEL_TIMEOUT,
            autostart: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Convert the settings into the runtime configuration of each component
    pub fn to_runtime_config(&self) -> (QueueConfig, RunnerConfig, CoordinatorConfig, ToolLocator) {
        let queue = QueueConfig {
            concurrency_limit: self.download.concurrent_downloads,
            cancel_timeout: self.queue.cancel_timeout,
            default_priority: self.download.default_priority,
        };

        let runner = RunnerConfig {
            output_dir: self.output_dir(),
            embed_thumbnail: self.download.embed_thumbnail,
            embed_metadata: self.download.embed_metadata,
            embed_subtitles: self.download.embed_subtitles,
            subtitle_languages: self.download.subtitle_languages.clone(),
            rate_limit: self.download.rate_limit.clone(),
            merge_output_format: self.download.merge_output_format.clone(),
            proxy: self.network.proxy.clone(),
            cookies_file: self.network.cookies_file.clone(),
            cookies_from_browser: self.network.cookies_from_browser.clone(),
            retries: self.network.retries,
            fragment_retries: self.network.fragment_retries,
            socket_timeout: self.network.socket_timeout_secs.map(Duration::from_secs),
            cancel_timeout: self.queue.cancel_timeout,
        };

        let coordinator = CoordinatorConfig {
            default_format: self.download.default_format,
            default_quality: self.download.default_quality,
            default_priority: self.download.default_priority,
            output_dir: None,
        };

        let tools = ToolLocator::new(self.tools.ytdlp_path.clone(), self.tools.ffmpeg_path.clone());

        (queue, runner, coordinator, tools)
    }

    /// Output directory with the platform default applied
    pub fn output_dir(&self) -> PathBuf {
        self.download.output_dir.clone().unwrap_or_else(|| {
            dirs::download_dir()
                .or_else(|| dirs::home_dir().map(|home| home.join(DEFAULT_DOWNLOAD_DIR)))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }

    /// Queue file with the default location applied
    pub fn queue_file(&self) -> ConfigResult<PathBuf> {
        match &self.queue.queue_file {
            Some(path) => Ok(path.clone()),
            None => default_queue_file(),
        }
    }

    /// Load configuration
    ///
    /// An explicitly given file must exist. Otherwise the default location is
    /// used, and a missing file means defaults. A file that cannot be read or
    /// parsed is logged and replaced by defaults.
    pub async fn load(config_file_override: Option<&Path>) -> ConfigResult<Self> {
        let path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Io {
                        path: path.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "specified config file not found",
                        ),
                    });
                }
                path.to_path_buf()
            }
            None => default_config_path()?,
        };

        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        match Self::load_from_file(&path).await {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Ignoring settings file {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Write the configuration to `path`
    pub async fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        write_settings(path, &content).await?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Replace the file at `path` with the commented defaults
    pub async fn reset(path: &Path) -> ConfigResult<Self> {
        write_settings(path, &Self::generate_default_config_content()).await?;
        info!("Reset configuration at {}", path.display());
        Ok(Self::default())
    }

    /// Create the default settings file if none exists
    ///
    /// Returns `true` when a file was written.
    pub async fn initialize_first_run(path: &Path) -> ConfigResult<bool> {
        if path.exists() {
            return Ok(false);
        }
        info!("Creating default configuration file...");
        write_settings(path, &Self::generate_default_config_content()).await?;
        Ok(true)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Set one dotted key, e.g. `download.concurrent_downloads`
    ///
    /// `none` or an empty value clears optional keys. The whole configuration
    /// is validated afterwards and left untouched on error.
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let mut next = self.clone();
        let value = value.trim();

        match key {
            "download.output_dir" => next.download.output_dir = optional(value).map(PathBuf::from),
            "download.default_format" => {
                next.download.default_format = parse_with(key, value, FormatKind::from_str)?
            }
            "download.default_quality" => {
                next.download.default_quality = parse_with(key, value, Quality::from_str)?
            }
            "download.concurrent_downloads" => next.download.concurrent_downloads = parse(key, value)?,
            "download.embed_thumbnail" => next.download.embed_thumbnail = parse_bool(key, value)?,
            "download.embed_metadata" => next.download.embed_metadata = parse_bool(key, value)?,
            "download.embed_subtitles" => next.download.embed_subtitles = parse_bool(key, value)?,
            "download.subtitle_languages" => {
                next.download.subtitle_languages = value
                    .split(',')
                    .map(str::trim)
                    .filter(|lang| !lang.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "download.rate_limit" => next.download.rate_limit = optional(value).map(str::to_string),
            "download.merge_output_format" => {
                next.download.merge_output_format = value.to_ascii_lowercase()
            }
            "download.default_priority" => next.download.default_priority = parse(key, value)?,
            "download.fetch_titles" => next.download.fetch_titles = parse_bool(key, value)?,
            "network.proxy" => next.network.proxy = optional(value).map(str::to_string),
            "network.cookies_file" => next.network.cookies_file = optional(value).map(PathBuf::from),
            "network.cookies_from_browser" => {
                next.network.cookies_from_browser = optional(value).map(str::to_string)
            }
            "network.retries" => next.network.retries = parse_optional(key, value)?,
            "network.fragment_retries" => next.network.fragment_retries = parse_optional(key, value)?,
            "network.socket_timeout_secs" => {
                next.network.socket_timeout_secs = parse_optional(key, value)?
            }
            "tools.ytdlp_path" => next.tools.ytdlp_path = optional(value).map(PathBuf::from),
            "tools.ffmpeg_path" => next.tools.ffmpeg_path = optional(value).map(PathBuf::from),
            "queue.queue_file" => next.queue.queue_file = optional(value).map(PathBuf::from),
            "queue.cancel_timeout" => {
                next.queue.cancel_timeout =
                    humantime_serde::re::humantime::parse_duration(value).map_err(|e| {
                        invalid_value(key, value, e.to_string())
                    })?
            }
            "queue.autostart" => next.queue.autostart = parse_bool(key, value)?,
            "logging.level" => next.logging.level = value.to_ascii_lowercase(),
            "logging.log_file" => next.logging.log_file = optional(value).map(PathBuf::from),
            _ => {
                return Err(ConfigError::UnknownKey {
                    key: key.to_string(),
                })
            }
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        let limit = self.download.concurrent_downloads;
        if limit == 0 || limit > MAX_CONCURRENCY {
            return Err(invalid_value(
                "download.concurrent_downloads",
                &limit.to_string(),
                format!("Must be between 1 and {}", MAX_CONCURRENCY),
            ));
        }

        if !MERGE_FORMATS.contains(&self.download.merge_output_format.as_str()) {
            return Err(invalid_value(
                "download.merge_output_format",
                &self.download.merge_output_format,
                format!("Expected one of: {}", MERGE_FORMATS.join(", ")),
            ));
        }

        if let Some(rate) = &self.download.rate_limit {
            if !is_rate(rate) {
                return Err(invalid_value(
                    "download.rate_limit",
                    rate,
                    "Expected a byte rate such as 500K or 2M".to_string(),
                ));
            }
        }

        if self.queue.cancel_timeout.is_zero() {
            return Err(invalid_value(
                "queue.cancel_timeout",
                "0s",
                "Must be greater than zero".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid_value(
                "logging.level",
                &self.logging.level,
                format!("Expected one of: {}", LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# ytdlp-queue configuration
# This file was automatically generated on first run.
# Every key is optional; removed keys fall back to their defaults.

[download]
# Output directory (defaults to the user's download directory)
# output_dir = "/path/to/videos"

# video_audio, video_only, audio_mp3, audio_m4a, audio_opus, audio_best
default_format = "{format}"

# best, 4k, 1080, 720, 480, 360, worst
default_quality = "{quality}"

# Number of downloads running at the same time (1-{max})
concurrent_downloads = {concurrency}

embed_thumbnail = false
embed_metadata = true
embed_subtitles = false
subtitle_languages = ["en"]

# Download rate cap, e.g. "2M"
# rate_limit = "2M"

# Container for merged video and audio
merge_output_format = "{merge}"

# Higher priorities run first
default_priority = {priority}

# Ask yt-dlp for the title of jobs added without --title
fetch_titles = true

[network]
# proxy = "socks5://127.0.0.1:1080"
# cookies_file = "/path/to/cookies.txt"
# cookies_from_browser = "firefox"
# retries = 10
# fragment_retries = 10
# socket_timeout_secs = 30

[tools]
# Explicit executable locations; otherwise bin/ next to the program, then PATH
# ytdlp_path = "/usr/local/bin/yt-dlp"
# ffmpeg_path = "/usr/bin/ffmpeg"

[queue]
# queue_file = "/path/to/queue.json"

# Time a stopping download gets before it is killed
cancel_timeout = "{cancel}"

# Start downloading right after add/import
autostart = false

[logging]
level = "{level}"  # error, warn, info, debug, trace
# log_file = "/path/to/ytdlp-queue.log"
"#,
            format = FormatKind::default().key(),
            quality = Quality::default().key(),
            max = MAX_CONCURRENCY,
            concurrency = DEFAULT_CONCURRENCY,
            merge = DEFAULT_MERGE_FORMAT,
            priority = DEFAULT_PRIORITY,
            cancel = humantime_serde::re::humantime::format_duration(CANCEL_TIMEOUT),
            level = DEFAULT_LOG_LEVEL,
        )
    }
}

/// Directory holding the settings and queue files
pub fn config_dir() -> ConfigResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Default settings file path for the current user
pub fn default_config_path() -> ConfigResult<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE_NAME))
}

/// Default persisted queue path for the current user
pub fn default_queue_file() -> ConfigResult<PathBuf> {
    Ok(config_dir()?.join(QUEUE_FILE_NAME))
}

async fn write_settings(path: &Path, content: &str) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn invalid_value(field: &str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason,
    }
}

fn optional(value: &str) -> Option<&str> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value)
    }
}

fn parse<T>(key: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_with(key, value, T::from_str)
}

fn parse_with<T, E: std::fmt::Display>(
    key: &str,
    value: &str,
    parser: impl FnOnce(&str) -> Result<T, E>,
) -> ConfigResult<T> {
    parser(value).map_err(|e| invalid_value(key, value, e.to_string()))
}

fn parse_optional<T>(key: &str, value: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(value).map(|v| parse(key, v)).transpose()
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid_value(key, value, "Expected true or false".to_string())),
    }
}

/// `500K`, `2M`, `1.5M`, `4096`
fn is_rate(value: &str) -> bool {
    let digits = value.trim_end_matches(|c: char| matches!(c.to_ascii_uppercase(), 'K' | 'M' | 'G'));
    value.len() - digits.len() <= 1 && !digits.is_empty() && digits.parse::<f64>().map_or(false, |n| n > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.download.concurrent_downloads, DEFAULT_CONCURRENCY);
        assert_eq!(config.queue.cancel_timeout, CANCEL_TIMEOUT);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_generation() {
        let content = AppConfig::generate_default_config_content();

        let parsed: AppConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, AppConfig::default());
        assert!(content.contains("# ytdlp-queue configuration"));
        assert!(content.contains("[download]"));
        assert!(content.contains("[network]"));
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(&config_path)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_loading_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        let content = r#"
[download]
concurrent_downloads = 5
default_format = "audio_mp3"
default_quality = "720"

[queue]
cancel_timeout = "1m 30s"

[logging]
level = "debug"
"#;
        tokio::fs::write(&config_path, content).await.unwrap();

        let config = AppConfig::load(Some(&config_path)).await.unwrap();
        assert_eq!(config.download.concurrent_downloads, 5);
        assert_eq!(config.download.default_format, FormatKind::AudioMp3);
        assert_eq!(config.download.default_quality, Quality::P720);
        assert_eq!(config.queue.cancel_timeout, Duration::from_secs(90));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.download.merge_output_format, DEFAULT_MERGE_FORMAT);
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        tokio::fs::write(&config_path, "[download\nconcurrent = ")
            .await
            .unwrap();

        let config = AppConfig::load(Some(&config_path)).await.unwrap();
        assert_eq!(config, AppConfig::default());

        tokio::fs::write(&config_path, "[download]\nconcurrent_downloads = 0\n")
            .await
            .unwrap();
        let config = AppConfig::load(Some(&config_path)).await.unwrap();
        assert_eq!(config.download.concurrent_downloads, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_set_dotted_keys() {
        let mut config = AppConfig::default();
        config.set("download.concurrent_downloads", "6").unwrap();
        config.set("download.default_format", "m4a").unwrap();
        config.set("download.subtitle_languages", "en, de").unwrap();
        config.set("network.retries", "5").unwrap();
        config.set("queue.cancel_timeout", "30s").unwrap();
        config.set("queue.autostart", "yes").unwrap();

        assert_eq!(config.download.concurrent_downloads, 6);
        assert_eq!(config.download.default_format, FormatKind::AudioM4a);
        assert_eq!(config.download.subtitle_languages, vec!["en", "de"]);
        assert_eq!(config.network.retries, Some(5));
        assert_eq!(config.queue.cancel_timeout, Duration::from_secs(30));
        assert!(config.queue.autostart);

        config.set("network.retries", "none").unwrap();
        assert_eq!(config.network.retries, None);
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = AppConfig::default();

        let err = config.set("download.concurrent_downloads", "0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(config.set("download.concurrent_downloads", "lots").is_err());
        assert!(config.set("download.default_quality", "8k").is_err());
        assert!(config.set("download.rate_limit", "fast").is_err());
        assert!(config.set("logging.level", "chatty").is_err());
        assert!(config.set("queue.cancel_timeout", "0s").is_err());

        let err = config.set("download.colour", "blue").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { .. }));

        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut config = AppConfig::default();
        config.set("download.output_dir", "/tmp/videos").unwrap();
        config.set("download.rate_limit", "2M").unwrap();
        config.set("network.proxy", "socks5://127.0.0.1:1080").unwrap();
        config.save(&config_path).await.unwrap();

        let reloaded = AppConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(reloaded, config);

        let reset = AppConfig::reset(&config_path).await.unwrap();
        assert_eq!(reset, AppConfig::default());
        let reloaded = AppConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(reloaded, AppConfig::default());
    }

    #[tokio::test]
    async fn test_initialize_first_run_only_once() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        assert!(AppConfig::initialize_first_run(&config_path).await.unwrap());
        assert!(!AppConfig::initialize_first_run(&config_path).await.unwrap());
        assert!(config_path.exists());
    }

    #[test]
    fn test_runtime_conversion() {
        let mut config = AppConfig::default();
        config.set("download.concurrent_downloads", "4").unwrap();
        config.set("download.output_dir", "/data/media").unwrap();
        config.set("network.socket_timeout_secs", "20").unwrap();
        config.set("download.default_priority", "2").unwrap();
        config.set("download.fetch_titles", "false").unwrap();
        assert!(!config.download.fetch_titles);

        let (queue, runner, coordinator, _tools) = config.to_runtime_config();
        assert_eq!(queue.concurrency_limit, 4);
        assert_eq!(queue.default_priority, 2);
        assert!(queue.validate().is_ok());
        assert_eq!(runner.output_dir, PathBuf::from("/data/media"));
        assert_eq!(runner.socket_timeout, Some(Duration::from_secs(20)));
        assert_eq!(coordinator.default_priority, 2);
    }

    #[test]
    fn test_rate_format() {
        assert!(is_rate("2M"));
        assert!(is_rate("500k"));
        assert!(is_rate("1.5M"));
        assert!(is_rate("4096"));
        assert!(!is_rate("M"));
        assert!(!is_rate("2MM"));
        assert!(!is_rate("-1K"));
    }
}
