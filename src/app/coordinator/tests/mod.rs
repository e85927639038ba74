//! Tests for the download coordinator
//!
//! Exercise submission defaults, clip requests, batch import and the board
//! fed from queue events, using a scripted launcher.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use super::*;
use crate::app::format::{FormatKind, Quality};
use crate::app::models::JobStatus;
use crate::app::queue::{QueueConfig, Script, ScriptedLauncher};
use crate::errors::QueueError;

fn coordinator(launcher: &Arc<ScriptedLauncher>) -> DownloadCoordinator {
    let queue = QueueManager::in_memory(QueueConfig::for_testing(), launcher.clone()).unwrap();
    let config = CoordinatorConfig::default()
        .with_format(FormatKind::AudioM4a)
        .with_quality(Quality::P480)
        .with_priority(1);
    DownloadCoordinator::new(queue, config)
}

#[tokio::test]
async fn test_submit_applies_defaults() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let coordinator = coordinator(&launcher);

    let id = coordinator
        .submit("https://example.com/watch?v=1", None)
        .await
        .unwrap();
    let record = coordinator.queue().get(&id).await.unwrap();
    assert_eq!(record.options.format, FormatKind::AudioM4a);
    assert_eq!(record.options.quality, Quality::P480);
    assert_eq!(record.priority, 1);

    let explicit = JobOptions::new(FormatKind::VideoOnly, Quality::Best);
    let id = coordinator
        .submit_with_priority("https://example.com/watch?v=2", Some(explicit.clone()), Some(9))
        .await
        .unwrap();
    let record = coordinator.queue().get(&id).await.unwrap();
    assert_eq!(record.options, explicit);
    assert_eq!(record.priority, 9);
}

#[tokio::test]
async fn test_submit_clip() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let coordinator = coordinator(&launcher);

    let id = coordinator
        .submit_clip("https://example.com/v", "1:00", Some("01:30"), None)
        .await
        .unwrap();
    let clip = coordinator.queue().get(&id).await.unwrap().options.clip.unwrap();
    assert_eq!(clip.start_secs, 60);
    assert_eq!(clip.end_secs, Some(90));

    let err = coordinator
        .submit_clip("https://example.com/v", "2:00", Some("1:00"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidClip { .. }));
    assert_eq!(coordinator.snapshots().await.len(), 1);
}

#[tokio::test]
async fn test_import_file_reports_rejections() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let coordinator = coordinator(&launcher);

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("urls.txt");
    std::fs::write(
        &path,
        "# weekend list\nhttps://example.com/a\n\nftp://example.com/b\nhttps://example.com/c\n",
    )
    .unwrap();

    let report = coordinator.import_file(&path).await.unwrap();
    assert_eq!(report.added.len(), 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].line, 4);
    assert_eq!(report.rejected[0].text, "ftp://example.com/b");

    let urls: Vec<String> = coordinator
        .snapshots()
        .await
        .into_iter()
        .map(|s| s.url)
        .collect();
    assert_eq!(urls, vec!["https://example.com/a", "https://example.com/c"]);
}

#[tokio::test]
async fn test_import_missing_file() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let coordinator = coordinator(&launcher);
    let temp_dir = TempDir::new().unwrap();

    let result = coordinator
        .import_file(&temp_dir.path().join("absent.txt"))
        .await;
    assert!(matches!(result, Err(ImportError::Read { .. })));
}

#[tokio::test]
async fn test_board_follows_queue() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::succeed(Duration::from_millis(20))));
    let coordinator = coordinator(&launcher);
    let mut board = coordinator.watch();

    let id = coordinator
        .submit("https://example.com/watch?v=1", None)
        .await
        .unwrap();
    coordinator.start_all().await;

    let finished = timeout(
        Duration::from_secs(5),
        board.wait_for(|b| {
            b.get(&id)
                .map_or(false, |job| job.status == JobStatus::Completed)
        }),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    let job = finished.get(&id).unwrap();
    assert_eq!(job.progress, 100.0);
    assert_eq!(job.status_label, "completed");
    assert_eq!(finished.stats.completed, 1);
}

#[tokio::test]
async fn test_board_shows_tool_missing_notice() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::ToolMissing));
    let coordinator = coordinator(&launcher);
    let mut board = coordinator.watch();

    coordinator
        .submit("https://example.com/watch?v=1", None)
        .await
        .unwrap();
    coordinator.start_all().await;

    let with_notice = timeout(
        Duration::from_secs(5),
        board.wait_for(|b| b.notice.is_some()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert!(with_notice.notice.unwrap().contains("not found"));
    assert_eq!(with_notice.stats.queued, 1);
}

#[tokio::test]
async fn test_pass_through_operations() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::fail(Duration::ZERO, 1, "HTTP Error 403")));
    let coordinator = coordinator(&launcher);

    let id = coordinator
        .submit("https://example.com/watch?v=1", None)
        .await
        .unwrap();
    coordinator.pause(&id).await.unwrap();
    coordinator.reprioritize(&id, 5).await.unwrap();
    coordinator.resume(&id).await.unwrap();
    coordinator.start_all().await;

    timeout(Duration::from_secs(5), coordinator.wait_idle())
        .await
        .unwrap();
    let snapshot = coordinator.snapshots().await;
    assert_eq!(snapshot[0].status, JobStatus::Failed);
    assert_eq!(snapshot[0].error.as_deref(), Some("HTTP Error 403"));
    assert_eq!(snapshot[0].priority, 5);

    let retry_id = coordinator.retry(&id).await.unwrap();
    timeout(Duration::from_secs(5), coordinator.wait_idle())
        .await
        .unwrap();
    assert_eq!(coordinator.stats().await.failed, 2);

    coordinator.stop_all().await;
    assert_eq!(coordinator.clear_finished().await, 2);
    assert!(coordinator.remove(&retry_id).await.is_err());
}

#[tokio::test]
async fn test_rename_sets_display_name() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let coordinator = coordinator(&launcher);

    let id = coordinator
        .submit("https://example.com/watch?v=1", None)
        .await
        .unwrap();
    coordinator
        .rename(&id, Some("Conference talk".to_string()))
        .await
        .unwrap();
    assert_eq!(coordinator.snapshots().await[0].name, "Conference talk");

    coordinator.rename(&id, Some("  ".to_string())).await.unwrap();
    assert_eq!(
        coordinator.snapshots().await[0].name,
        "https://example.com/watch?v=1"
    );
}
