//! End-to-end batch runs over the real SQLite store
//!
//! Exercises orchestrator, lifecycle, event bus, progress stream and store
//! together the way the daemon wires them.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracklab_core::application::stream::{self, StreamFrame};
use tracklab_core::application::{BatchConfig, BatchOrchestrator, ItemError, ProgressEventBus, StreamConfig, WorkItem};
use tracklab_core::domain::{JobKind, JobStatus, ProgressEvent};
use tracklab_core::port::id_provider::UuidProvider;
use tracklab_core::port::time_provider::SystemTimeProvider;
use tracklab_core::port::{EmbedOptions, JobStore, Provider};
use tracklab_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use tracklab_providers::{LocalProvider, PacedProvider};

async fn sqlite_store() -> Arc<SqliteJobStore> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteJobStore::new(
        pool,
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ))
}

fn items(total: usize) -> Vec<WorkItem<usize>> {
    (0..total)
        .map(|i| WorkItem::new(format!("item-{i}"), "track", i).with_label(format!("Track {i}")))
        .collect()
}

#[tokio::test]
async fn test_partial_failure_batch_completes() {
    let store = sqlite_store().await;
    let bus = Arc::new(ProgressEventBus::new());
    let orchestrator = BatchOrchestrator::new(
        store.clone(),
        bus,
        BatchConfig {
            concurrency: 3,
            emit_item_events: true,
        },
    )
    .unwrap();

    let job = store
        .create_job("owner-1", &JobKind::new("track_import"))
        .await
        .unwrap();

    let progress = orchestrator
        .run(&job.id, items(10), |i| async move {
            if matches!(i, 2 | 5 | 8) {
                Err(ItemError::new(format!("track {i} rejected")))
            } else {
                Ok(())
            }
        })
        .await
        .unwrap();

    assert_eq!(progress.total, 10);
    assert_eq!(progress.done, 10);
    assert_eq!(progress.succeeded, 7);
    assert_eq!(progress.failed, 3);

    // Partial failure still finishes the job
    let stored = store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.progress, progress);
}

#[tokio::test]
async fn test_all_failed_batch_is_failed_with_message() {
    let store = sqlite_store().await;
    let bus = Arc::new(ProgressEventBus::new());
    let orchestrator =
        BatchOrchestrator::new(store.clone(), bus, BatchConfig::default()).unwrap();

    let job = store
        .create_job("owner-1", &JobKind::new("track_import"))
        .await
        .unwrap();

    orchestrator
        .run(&job.id, items(3), |i| async move {
            Err::<(), _>(ItemError::new(format!("track {i} rejected")))
        })
        .await
        .unwrap();

    let stored = store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    let message = stored.error_message.unwrap();
    assert!(message.contains("all 3 items failed"), "message: {message}");
}

/// A late observer attaching after the run gets the stored snapshot and an
/// immediate close, never a hang.
#[tokio::test]
async fn test_late_observer_sees_snapshot_then_close() {
    let store = sqlite_store().await;
    let bus = Arc::new(ProgressEventBus::new());
    let orchestrator = BatchOrchestrator::new(
        store.clone(),
        bus.clone(),
        BatchConfig {
            concurrency: 3,
            emit_item_events: false,
        },
    )
    .unwrap();

    let job = store
        .create_job("owner-1", &JobKind::new("track_import"))
        .await
        .unwrap();
    orchestrator
        .run(&job.id, items(10), |i| async move {
            if matches!(i, 2 | 5 | 8) {
                Err(ItemError::new("rejected"))
            } else {
                Ok(())
            }
        })
        .await
        .unwrap();

    let frames: Vec<StreamFrame> = tokio::time::timeout(
        Duration::from_secs(5),
        stream::open(store, bus, job.id, StreamConfig::default())
            .await
            .unwrap()
            .collect(),
    )
    .await
    .unwrap();

    assert_eq!(frames.len(), 2);
    match &frames[0] {
        StreamFrame::Event(ProgressEvent::Progress {
            done,
            total,
            succeeded,
            failed,
        }) => {
            assert_eq!((*done, *total, *succeeded, *failed), (10, 10, 7, 3));
        }
        other => panic!("expected progress snapshot, got {other:?}"),
    }
    match &frames[1] {
        StreamFrame::Event(ProgressEvent::Status { status }) => {
            assert_eq!(*status, JobStatus::Completed);
        }
        other => panic!("expected terminal status, got {other:?}"),
    }

    // The terminal frame serializes to the wire record remote observers get
    if let StreamFrame::Event(event) = &frames[1] {
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["status"], "completed");
    }
}

/// A live observer attached before the run ends with the terminal status as
/// the final frame.
#[tokio::test]
async fn test_live_observer_ends_with_terminal_status() {
    let store = sqlite_store().await;
    let bus = Arc::new(ProgressEventBus::new());
    let orchestrator = BatchOrchestrator::new(
        store.clone(),
        bus.clone(),
        BatchConfig {
            concurrency: 2,
            emit_item_events: false,
        },
    )
    .unwrap();

    let job = store
        .create_job("owner-1", &JobKind::new("track_import"))
        .await
        .unwrap();

    let frames = stream::open(
        store.clone(),
        bus.clone(),
        job.id.clone(),
        StreamConfig::default(),
    )
    .await
    .unwrap();
    futures::pin_mut!(frames);

    // First frame is the pending snapshot; consuming it guarantees the
    // observer is subscribed before the run starts.
    match frames.next().await {
        Some(StreamFrame::Event(ProgressEvent::Status { status })) => {
            assert_eq!(status, JobStatus::Pending);
        }
        other => panic!("expected pending status, got {other:?}"),
    }

    let job_id = job.id.clone();
    let runner = tokio::spawn(async move {
        orchestrator
            .run(&job_id, items(6), |_| async { Ok(()) })
            .await
            .unwrap()
    });

    let mut last = None;
    while let Ok(Some(frame)) =
        tokio::time::timeout(Duration::from_secs(5), frames.next()).await
    {
        if let StreamFrame::Event(event) = frame {
            last = Some(event);
        }
    }

    match last {
        Some(ProgressEvent::Status { status }) => assert_eq!(status, JobStatus::Completed),
        other => panic!("expected terminal status last, got {other:?}"),
    }

    let progress = runner.await.unwrap();
    assert_eq!(progress.succeeded, 6);
}

/// Batch embedding through the paced local provider, end to end.
#[tokio::test]
async fn test_batch_embedding_via_paced_provider() {
    let store = sqlite_store().await;
    let bus = Arc::new(ProgressEventBus::new());
    let orchestrator = BatchOrchestrator::new(
        store.clone(),
        bus,
        BatchConfig {
            concurrency: 2,
            emit_item_events: false,
        },
    )
    .unwrap();

    let provider = Arc::new(PacedProvider::new(Arc::new(LocalProvider::new()), 2).unwrap());
    let job = store
        .create_job("owner-1", &JobKind::new("track_embedding"))
        .await
        .unwrap();

    let texts: Vec<WorkItem<String>> = (0..6)
        .map(|i| WorkItem::new(format!("item-{i}"), "track", format!("track number {i}")))
        .collect();

    let progress = orchestrator
        .run(&job.id, texts, |text| {
            let provider = provider.clone();
            async move {
                provider
                    .embed(&text, &EmbedOptions::default())
                    .await
                    .map(|_| ())
                    .map_err(|e| ItemError::new(e.to_string()))
            }
        })
        .await
        .unwrap();

    assert_eq!(progress.succeeded, 6);
    let stored = store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
}
