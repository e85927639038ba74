//! External tool discovery
//!
//! Locates the download tool (yt-dlp) and the merge tool (ffmpeg). Each tool
//! is searched in order: explicit configured path, the bundled `bin/`
//! directory next to the running executable, the executable's own directory,
//! and finally the system search path.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::constants::tools::{BUNDLED_BIN_DIR, FFMPEG_BINARY, YTDLP_BINARY};
use crate::errors::ToolError;

/// Resolved tool locations for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Download tool executable
    pub ytdlp: PathBuf,
    /// Merge tool executable, if available
    pub ffmpeg: Option<PathBuf>,
}

impl ToolPaths {
    /// Directory to pass as `--ffmpeg-location`
    pub fn ffmpeg_dir(&self) -> Option<&Path> {
        self.ffmpeg.as_deref().and_then(Path::parent)
    }
}

/// Finds the external executables
#[derive(Debug, Clone)]
pub struct ToolLocator {
    ytdlp_override: Option<PathBuf>,
    ffmpeg_override: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
    use_system_path: bool,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl ToolLocator {
    /// Create a locator with optional explicit paths
    pub fn new(ytdlp_override: Option<PathBuf>, ffmpeg_override: Option<PathBuf>) -> Self {
        Self {
            ytdlp_override,
            ffmpeg_override,
            search_dirs: bundled_search_dirs(),
            use_system_path: true,
        }
    }

    /// Replace the bundled search directories
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Enable or disable the system PATH lookup
    pub fn with_system_path(mut self, enabled: bool) -> Self {
        self.use_system_path = enabled;
        self
    }

    /// Locate the download tool
    pub fn locate_ytdlp(&self) -> Result<PathBuf, ToolError> {
        self.locate(YTDLP_BINARY, self.ytdlp_override.as_deref())
            .ok_or_else(|| ToolError::NotFound {
                tool: YTDLP_BINARY.to_string(),
                searched: self.describe_search(self.ytdlp_override.as_deref()),
            })
    }

    /// Locate the merge tool; absence is tolerated
    pub fn locate_ffmpeg(&self) -> Option<PathBuf> {
        self.locate(FFMPEG_BINARY, self.ffmpeg_override.as_deref())
    }

    /// Resolve both tools for a launch
    pub fn resolve(&self) -> Result<ToolPaths, ToolError> {
        let ytdlp = self.locate_ytdlp()?;
        let ffmpeg = self.locate_ffmpeg();
        if ffmpeg.is_none() {
            warn!("ffmpeg not found; merging and audio extraction will fail");
        }
        Ok(ToolPaths { ytdlp, ffmpeg })
    }

    fn locate(&self, binary: &str, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            if path.is_file() {
                debug!("Using configured {}: {}", binary, path.display());
                return Some(path.to_path_buf());
            }
            warn!(
                "Configured {} path {} does not exist, searching elsewhere",
                binary,
                path.display()
            );
        }

        if let Some(found) = self
            .search_dirs
            .iter()
            .map(|dir| dir.join(binary))
            .find(|candidate| candidate.is_file())
        {
            debug!("Using bundled {}: {}", binary, found.display());
            return Some(found);
        }

        if self.use_system_path {
            if let Ok(found) = which::which(binary) {
                debug!("Using system {}: {}", binary, found.display());
                return Some(found);
            }
        }

        None
    }

    fn describe_search(&self, explicit: Option<&Path>) -> String {
        let mut places: Vec<String> = Vec::new();
        if let Some(path) = explicit {
            places.push(path.display().to_string());
        }
        places.extend(self.search_dirs.iter().map(|d| d.display().to_string()));
        if self.use_system_path {
            places.push("PATH".to_string());
        }
        places.join(", ")
    }
}

/// `bin/` next to the executable, then the executable's directory
fn bundled_search_dirs() -> Vec<PathBuf> {
    match std::env::current_exe() {
        Ok(exe) => match exe.parent() {
            Some(dir) => vec![dir.join(BUNDLED_BIN_DIR), dir.to_path_buf()],
            None => Vec::new(),
        },
        Err(e) => {
            debug!("Could not determine executable location: {}", e);
            Vec::new()
        }
    }
}

/// Query a tool's version line (`--version` for yt-dlp, `-version` for ffmpeg)
pub async fn tool_version(path: &Path, flag: &str) -> Result<String, ToolError> {
    let tool = path.display().to_string();
    let output = Command::new(path)
        .arg(flag)
        .output()
        .await
        .map_err(|e| ToolError::VersionProbe {
            tool: tool.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ToolError::VersionProbe {
            tool,
            reason: format!("exited with {}", output.status),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_explicit_path_wins() {
        let temp_dir = TempDir::new().unwrap();
        let explicit = touch(temp_dir.path(), "custom-ytdlp");
        let bundled = TempDir::new().unwrap();
        touch(bundled.path(), YTDLP_BINARY);

        let locator = ToolLocator::new(Some(explicit.clone()), None)
            .with_search_dirs(vec![bundled.path().to_path_buf()])
            .with_system_path(false);

        assert_eq!(locator.locate_ytdlp().unwrap(), explicit);
    }

    #[test]
    fn test_bundled_dir_used_when_no_override() {
        let bundled = TempDir::new().unwrap();
        let ytdlp = touch(bundled.path(), YTDLP_BINARY);
        let ffmpeg = touch(bundled.path(), FFMPEG_BINARY);

        let locator = ToolLocator::new(Some(PathBuf::from("/nonexistent/yt-dlp")), None)
            .with_search_dirs(vec![bundled.path().to_path_buf()])
            .with_system_path(false);

        let paths = locator.resolve().unwrap();
        assert_eq!(paths.ytdlp, ytdlp);
        assert_eq!(paths.ffmpeg, Some(ffmpeg));
        assert_eq!(paths.ffmpeg_dir(), Some(bundled.path()));
    }

    #[test]
    fn test_missing_tool_reports_search() {
        let empty = TempDir::new().unwrap();
        let locator = ToolLocator::new(None, None)
            .with_search_dirs(vec![empty.path().to_path_buf()])
            .with_system_path(false);

        match locator.locate_ytdlp() {
            Err(ToolError::NotFound { tool, searched }) => {
                assert_eq!(tool, YTDLP_BINARY);
                assert!(searched.contains(&empty.path().display().to_string()));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(locator.locate_ffmpeg().is_none());
    }
}
