//! Unit tests for queue manager operations
//!
//! These drive the manager with a scripted launcher so every transition can
//! be observed without the download tool.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};

use super::*;
use crate::app::models::{JobId, JobOptions, JobRecord, JobStatus};
use crate::errors::QueueError;

fn manager(launcher: &Arc<ScriptedLauncher>, limit: usize) -> QueueManager {
    QueueManager::in_memory(
        QueueConfig::for_testing().with_concurrency(limit),
        launcher.clone(),
    )
    .unwrap()
}

async fn wait_status(queue: &QueueManager, id: &JobId, status: JobStatus) -> JobRecord {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(record) = queue.get(id).await {
            if record.status == status {
                return record;
            }
        }
        if Instant::now() > deadline {
            panic!(
                "job {} never reached {:?}; last seen {:?}",
                id,
                status,
                queue.get(id).await.map(|r| r.status)
            );
        }
        sleep(Duration::from_millis(10)).await;
    }
}

fn url(n: usize) -> String {
    format!("https://example.com/watch?v={}", n)
}

#[tokio::test]
async fn test_pause_and_resume_queued_job() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::succeed(Duration::from_millis(10))));
    let queue = manager(&launcher, 1);

    let id = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    let paused = queue.pause(&id).await.unwrap();
    assert_eq!(paused.status, JobStatus::Paused);

    queue.start().await;
    sleep(Duration::from_millis(50)).await;
    assert!(launcher.launched().is_empty());
    assert_eq!(queue.get(&id).await.unwrap().status, JobStatus::Paused);

    let resumed = queue.resume(&id).await.unwrap();
    assert_ne!(resumed.status, JobStatus::Paused);
    wait_status(&queue, &id, JobStatus::Completed).await;
}

#[tokio::test]
async fn test_pause_running_job_parks_it() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let queue = manager(&launcher, 1);
    queue.start().await;

    let id = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    wait_status(&queue, &id, JobStatus::Running).await;

    let paused = queue.pause(&id).await.unwrap();
    assert_eq!(paused.status, JobStatus::Paused);
    assert_eq!(paused.progress, 0.0);
    assert_eq!(launcher.running(), 0);

    queue.resume(&id).await.unwrap();
    wait_status(&queue, &id, JobStatus::Running).await;
    assert_eq!(launcher.launched_ids(), vec![id.clone(), id]);
}

#[tokio::test]
async fn test_cancel_running_job() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let queue = manager(&launcher, 2);
    queue.start().await;

    let id = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    wait_status(&queue, &id, JobStatus::Running).await;

    let record = queue.cancel(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Cancelled);
    assert!(record.finished_at.is_some());

    let stats = queue.stats().await;
    assert_eq!(stats.running, 0);
    assert_eq!(stats.cancelled, 1);
}

#[tokio::test]
async fn test_cancel_escalates_to_kill() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Stubborn));
    let queue = manager(&launcher, 1);
    queue.start().await;

    let id = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    wait_status(&queue, &id, JobStatus::Running).await;

    let record = timeout(Duration::from_secs(10), queue.cancel(&id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, JobStatus::Cancelled);
    assert_eq!(launcher.running(), 0);
}

#[tokio::test]
async fn test_cancel_finished_job_is_noop() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::succeed(Duration::ZERO)));
    let queue = manager(&launcher, 1);
    queue.start().await;

    let id = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    let done = wait_status(&queue, &id, JobStatus::Completed).await;

    let record = queue.cancel(&id).await.unwrap();
    assert_eq!(record, done);
}

#[tokio::test]
async fn test_retry_failed_job_queues_copy() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::fail(
        Duration::ZERO,
        1,
        "Video unavailable",
    )));
    let queue = manager(&launcher, 1);
    queue.start().await;

    let id = queue
        .enqueue(&url(1), JobOptions::default(), Some(4))
        .await
        .unwrap();
    let failed = wait_status(&queue, &id, JobStatus::Failed).await;
    assert_eq!(failed.error.as_deref(), Some("Video unavailable"));

    let copy_id = queue.retry(&id).await.unwrap();
    assert_ne!(copy_id, id);
    let copy = wait_status(&queue, &copy_id, JobStatus::Failed).await;
    assert_eq!(copy.retry_of, Some(id.clone()));
    assert_eq!(copy.priority, 4);
    assert_eq!(copy.url, failed.url);

    // Original stays as it was
    assert_eq!(queue.get(&id).await.unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn test_retry_rejected_for_queued_job() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let queue = manager(&launcher, 1);

    let id = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    match queue.retry(&id).await {
        Err(QueueError::InvalidTransition { action, .. }) => assert_eq!(action, "retry"),
        other => panic!("expected InvalidTransition, got {:?}", other),
    }
    assert!(matches!(
        queue.retry(&JobId::new("missing")).await,
        Err(QueueError::JobNotFound { .. })
    ));
}

#[tokio::test]
async fn test_retry_while_cancel_in_flight() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Stubborn));
    let queue = manager(&launcher, 2);
    queue.start().await;

    let id = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    wait_status(&queue, &id, JobStatus::Running).await;

    let cancelling = {
        let queue = queue.clone();
        let id = id.clone();
        tokio::spawn(async move { queue.cancel(&id).await })
    };
    sleep(Duration::from_millis(50)).await;

    let copy_id = queue.retry(&id).await.unwrap();
    let cancelled = cancelling.await.unwrap().unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    let copy = queue.get(&copy_id).await.unwrap();
    assert_eq!(copy.retry_of, Some(id));
    assert!(!copy.status.is_terminal());
}

#[tokio::test]
async fn test_remove_and_clear_finished() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::succeed(Duration::ZERO)));
    let queue = manager(&launcher, 2);

    let waiting = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    let removed = queue.remove(&waiting).await.unwrap();
    assert_eq!(removed.id, waiting);
    assert!(queue.get(&waiting).await.is_none());

    queue.start().await;
    let a = queue.enqueue(&url(2), JobOptions::default(), None).await.unwrap();
    let b = queue.enqueue(&url(3), JobOptions::default(), None).await.unwrap();
    wait_status(&queue, &a, JobStatus::Completed).await;
    wait_status(&queue, &b, JobStatus::Completed).await;

    assert_eq!(queue.clear_finished().await, 2);
    assert!(queue.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_remove_running_job_rejected() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let queue = manager(&launcher, 1);
    queue.start().await;

    let id = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    wait_status(&queue, &id, JobStatus::Running).await;
    assert!(matches!(
        queue.remove(&id).await,
        Err(QueueError::InvalidTransition { .. })
    ));
    queue.shutdown().await;
}

#[tokio::test]
async fn test_tool_missing_halts_scheduling() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::ToolMissing));
    let queue = manager(&launcher, 2);
    let mut events = queue.subscribe();

    queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    queue.enqueue(&url(2), JobOptions::default(), None).await.unwrap();
    queue.start().await;

    let stats = queue.stats().await;
    assert_eq!(stats.queued, 2);
    assert!(!stats.scheduling);
    timeout(Duration::from_secs(1), queue.wait_idle()).await.unwrap();

    // More mutations do not surface the condition again
    queue.enqueue(&url(3), JobOptions::default(), None).await.unwrap();

    let mut missing = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, QueueEvent::ToolMissing { .. }) {
            missing += 1;
        }
    }
    assert_eq!(missing, 1);

    // Starting again clears the halt and retries
    queue.start().await;
    let mut missing = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, QueueEvent::ToolMissing { .. }) {
            missing += 1;
        }
    }
    assert_eq!(missing, 1);
}

#[tokio::test]
async fn test_launch_error_fails_only_that_job() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::succeed(Duration::ZERO)));
    launcher.script(&url(1), Script::SpawnError);
    let queue = manager(&launcher, 1);

    let bad = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    let good = queue.enqueue(&url(2), JobOptions::default(), None).await.unwrap();
    queue.start().await;

    let failed = wait_status(&queue, &bad, JobStatus::Failed).await;
    assert!(failed.error.unwrap().contains("scripted"));
    wait_status(&queue, &good, JobStatus::Completed).await;
}

#[tokio::test]
async fn test_progress_is_folded_into_record() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Succeed {
        after: Duration::from_millis(20),
        steps: vec![25.0, 50.0],
    }));
    let queue = manager(&launcher, 1);
    let mut events = queue.subscribe();
    queue.start().await;

    let id = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    let done = wait_status(&queue, &id, JobStatus::Completed).await;
    assert_eq!(done.progress, 100.0);
    assert_eq!(done.total_size.as_deref(), Some("10.00MiB"));
    assert!(done.output_path.is_some());
    assert!(done.started_at.is_some() && done.finished_at.is_some());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::Progress(record) = event {
            seen.push(record.progress);
        }
    }
    assert_eq!(seen, vec![25.0, 50.0]);
}

#[tokio::test]
async fn test_shutdown_requeues_running_jobs() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let queue = manager(&launcher, 2);
    queue.start().await;

    let a = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    let b = queue.enqueue(&url(2), JobOptions::default(), None).await.unwrap();
    wait_status(&queue, &a, JobStatus::Running).await;
    wait_status(&queue, &b, JobStatus::Running).await;

    queue.shutdown().await;

    let stats = queue.stats().await;
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.running, 0);
    assert!(!stats.scheduling);
    assert_eq!(launcher.running(), 0);
}

#[tokio::test]
async fn test_stop_leaves_running_jobs_alone() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let queue = manager(&launcher, 1);
    queue.start().await;

    let a = queue.enqueue(&url(1), JobOptions::default(), None).await.unwrap();
    let b = queue.enqueue(&url(2), JobOptions::default(), None).await.unwrap();
    wait_status(&queue, &a, JobStatus::Running).await;

    queue.stop().await;
    queue.cancel(&a).await.unwrap();
    sleep(Duration::from_millis(50)).await;

    // Slot freed but scheduling is stopped
    assert_eq!(queue.get(&b).await.unwrap().status, JobStatus::Queued);
    assert_eq!(launcher.launched_ids(), vec![a]);
}

#[tokio::test]
async fn test_invalid_input_creates_nothing() {
    let launcher = Arc::new(ScriptedLauncher::new(Script::Hang));
    let queue = manager(&launcher, 1);

    assert!(matches!(
        queue.enqueue("notaurl", JobOptions::default(), None).await,
        Err(QueueError::InvalidUrl { .. })
    ));

    let bad_clip = crate::app::format::ClipRange {
        start_secs: 30,
        end_secs: Some(10),
    };
    let options = JobOptions::default().with_clip(bad_clip);
    assert!(matches!(
        queue.enqueue(&url(1), options, None).await,
        Err(QueueError::InvalidClip { .. })
    ));

    assert!(queue.snapshot().await.is_empty());
}
