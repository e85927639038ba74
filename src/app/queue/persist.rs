//! Queue file persistence
//!
//! The queue is stored as a JSON array of job records. Writes go to a
//! temporary sibling file which is then renamed over the queue file, so a
//! crash never leaves a half-written queue behind.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::app::models::JobRecord;
use crate::constants::queue::TEMP_FILE_SUFFIX;
use crate::errors::{PersistenceError, PersistenceResult};

/// JSON file holding the persisted queue
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all decodable records
    ///
    /// A missing file is an empty queue. Entries that fail to decode are
    /// skipped with a warning; a file that is not a JSON array is an error.
    pub async fn load(&self) -> PersistenceResult<Vec<JobRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No queue file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&content).map_err(|source| PersistenceError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        let total = entries.len();
        let records: Vec<JobRecord> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable queue entry #{}: {}", index, e);
                    None
                }
            })
            .collect();

        info!(
            "Loaded {}/{} queue entries from {}",
            records.len(),
            total,
            self.path.display()
        );
        Ok(records)
    }

    /// Load, degrading to an empty queue on any failure
    pub async fn load_or_empty(&self) -> Vec<JobRecord> {
        match self.load().await {
            Ok(records) => records,
            Err(e) => {
                warn!("{}; starting with an empty queue", e);
                Vec::new()
            }
        }
    }

    /// Replace the queue file with the given records
    pub async fn save(&self, records: &[JobRecord]) -> PersistenceResult<()> {
        let content = serde_json::to_vec_pretty(records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| PersistenceError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, &content)
            .await
            .map_err(|source| PersistenceError::Io {
                path: temp_path.clone(),
                source,
            })?;

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(PersistenceError::AtomicReplace {
                path: self.path.clone(),
                reason: e.to_string(),
            });
        }

        debug!("Saved {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(TEMP_FILE_SUFFIX);
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{JobId, JobOptions, JobStatus};
    use tempfile::TempDir;

    fn record(id: &str, priority: i32) -> JobRecord {
        JobRecord::new(JobId::new(id), "https://example.com/v", JobOptions::default(), priority, 0)
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = QueueStore::new(temp_dir.path().join("queue.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_parent_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("queue.json");
        let store = QueueStore::new(&path);

        let mut failed = record("b", 1);
        failed.mark_failed("boom");
        store.save(&[record("a", 2), failed]).await.unwrap();

        assert!(path.exists());
        assert!(!store.temp_path().exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, JobId::new("a"));
        assert_eq!(loaded[1].status, JobStatus::Failed);
        assert_eq!(loaded[1].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_bad_entries_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.json");
        let good = serde_json::to_value(record("ok", 0)).unwrap();
        let content = serde_json::json!([good, {"id": "broken"}, 42]);
        std::fs::write(&path, content.to_string()).unwrap();

        let loaded = QueueStore::new(&path).load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, JobId::new("ok"));
    }

    #[tokio::test]
    async fn test_corrupt_file_degrades_to_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = QueueStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(PersistenceError::Corrupt { .. })
        ));
        assert!(store.load_or_empty().await.is_empty());
    }
}
