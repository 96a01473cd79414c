use futures::StreamExt;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use vmp_core::{BatchSnapshot, SnapshotStream, UploadConfig, UploadError, UploadStatus, ValidationError};
use vmp_test_utils::fixtures::file;
use vmp_test_utils::ScriptedUploader;
use vmp_upload::{Enqueued, UploadCoordinator};

const MB: usize = 1024 * 1024;

fn coordinator(uploader: &Arc<ScriptedUploader>, config: UploadConfig) -> UploadCoordinator {
    UploadCoordinator::new(uploader.clone(), config)
}

fn concurrency(n: usize) -> UploadConfig {
    UploadConfig {
        concurrency: n,
        ..UploadConfig::default()
    }
}

/// Drain already-published snapshots
fn drain(stream: &mut SnapshotStream<BatchSnapshot>) -> Vec<BatchSnapshot> {
    std::iter::from_fn(|| stream.try_next()).collect()
}

fn completions(snapshots: &[BatchSnapshot]) -> usize {
    snapshots
        .windows(2)
        .filter(|w| !w[0].batch_complete && w[1].batch_complete)
        .count()
}

#[tokio::test]
async fn enqueue_validates_without_uploading() {
    let uploader = Arc::new(ScriptedUploader::new());
    let coordinator = coordinator(&uploader, UploadConfig::default());

    let Enqueued { batch, rejected } =
        coordinator.enqueue(vec![file("front.jpg", MB), file("rear.jpg", 2 * MB), file("blank.jpg", 0)]);

    assert_eq!(rejected, vec![ValidationError::EmptyFile { name: "blank.jpg".into() }]);
    let snapshot = batch.snapshot();
    assert_eq!(snapshot.items.len(), 2);
    assert!(snapshot.items.iter().all(|i| i.status == UploadStatus::Pending));
    assert!(uploader.started().is_empty());
}

#[tokio::test]
async fn sequential_dispatch_follows_enqueue_order() {
    let uploader = Arc::new(ScriptedUploader::new());
    let coordinator = coordinator(&uploader, concurrency(1));
    let Enqueued { batch, .. } =
        coordinator.enqueue(vec![file("1.jpg", 10), file("2.jpg", 10), file("3.jpg", 10)]);

    let snapshot = coordinator.dispatch(&batch).await.unwrap();

    assert_eq!(uploader.started(), vec!["1.jpg", "2.jpg", "3.jpg"]);
    assert_eq!(uploader.peak_concurrency(), 1);
    assert!(snapshot.batch_complete);
    assert_eq!(snapshot.aggregate_percent, 100.0);
    assert!(snapshot.error_notice.is_none());
}

#[tokio::test(start_paused = true)]
async fn concurrency_is_bounded() {
    let uploader = Arc::new(ScriptedUploader::new().with_step_delay(Duration::from_millis(10)));
    let coordinator = coordinator(&uploader, concurrency(3));
    let files = (0..8).map(|i| file(&format!("{i}.jpg"), 10)).collect();
    let Enqueued { batch, .. } = coordinator.enqueue(files);

    coordinator.dispatch(&batch).await.unwrap();

    assert_eq!(uploader.peak_concurrency(), 3);
    assert_eq!(batch.snapshot().count(UploadStatus::Complete), 8);
}

#[tokio::test]
async fn failing_item_is_isolated_and_completion_fires_once() {
    let uploader = Arc::new(ScriptedUploader::new().failing("2.jpg"));
    let coordinator = coordinator(&uploader, concurrency(1));
    let Enqueued { batch, .. } = coordinator.enqueue(
        (1..=4).map(|i| file(&format!("{i}.jpg"), 10)).collect(),
    );
    let mut stream = batch.subscribe();

    let snapshot = coordinator.dispatch(&batch).await.unwrap();

    let statuses: Vec<UploadStatus> = snapshot.items.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![
            UploadStatus::Complete,
            UploadStatus::Error,
            UploadStatus::Complete,
            UploadStatus::Complete
        ]
    );
    // The failed item reported 25% before failing.
    assert_eq!(snapshot.items[1].percent, 25.0);
    assert!(snapshot.items[1].error.as_deref().unwrap().contains("refused"));
    assert!(snapshot.batch_complete);
    assert_eq!(snapshot.error_notice.as_deref(), Some("1 of 4 uploads failed"));
    assert!((snapshot.aggregate_percent - 81.25).abs() < 1e-3);

    let seen = drain(&mut stream);
    assert_eq!(completions(&seen), 1);
    assert_eq!(batch.rounds_completed(), 1);
}

#[tokio::test]
async fn mixed_sizes_with_empty_file() {
    let uploader = Arc::new(ScriptedUploader::new());
    let coordinator = coordinator(&uploader, UploadConfig::default());

    let Enqueued { batch, rejected } =
        coordinator.enqueue(vec![file("a.jpg", MB), file("b.jpg", 2 * MB), file("c.jpg", 0)]);
    assert_eq!(rejected.len(), 1);

    let snapshot = coordinator.dispatch(&batch).await.unwrap();
    assert_eq!(snapshot.items.len(), 2);
    assert!(snapshot.batch_complete);
    assert_eq!(snapshot.aggregate_percent, 100.0);
}

#[tokio::test]
async fn redispatch_retries_only_failed_items() {
    let uploader = Arc::new(ScriptedUploader::new().fail_once("b.jpg"));
    let coordinator = coordinator(&uploader, UploadConfig::default());
    let Enqueued { batch, .. } =
        coordinator.enqueue(vec![file("a.jpg", 10), file("b.jpg", 10), file("c.jpg", 10)]);

    let first = coordinator.dispatch(&batch).await.unwrap();
    assert_eq!(first.count(UploadStatus::Error), 1);

    let mut stream = batch.subscribe();
    let second = coordinator.dispatch(&batch).await.unwrap();

    assert_eq!(second.count(UploadStatus::Complete), 3);
    assert!(second.error_notice.is_none());
    assert_eq!(uploader.attempts("a.jpg"), 1);
    assert_eq!(uploader.attempts("b.jpg"), 2);
    assert_eq!(uploader.attempts("c.jpg"), 1);
    assert_eq!(completions(&drain(&mut stream)), 1);
    assert_eq!(batch.rounds_completed(), 2);
}

#[tokio::test]
async fn dispatch_of_complete_batch_is_noop() {
    let uploader = Arc::new(ScriptedUploader::new());
    let coordinator = coordinator(&uploader, UploadConfig::default());
    let Enqueued { batch, .. } = coordinator.enqueue(vec![file("a.jpg", 10)]);

    coordinator.dispatch(&batch).await.unwrap();
    let mut stream = batch.subscribe();
    let _ = stream.try_next();

    assert!(coordinator.dispatch(&batch).await.is_none());
    assert!(drain(&mut stream).is_empty());
    assert_eq!(uploader.attempts("a.jpg"), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_dispatch_is_noop() {
    let uploader = Arc::new(ScriptedUploader::new().with_step_delay(Duration::from_millis(50)));
    let coordinator = coordinator(&uploader, UploadConfig::default());
    let Enqueued { batch, .. } = coordinator.enqueue(vec![file("a.jpg", 10), file("b.jpg", 10)]);

    let (first, second) = tokio::join!(coordinator.dispatch(&batch), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.dispatch(&batch).await
    });

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(uploader.attempts("a.jpg"), 1);
    assert_eq!(uploader.attempts("b.jpg"), 1);
}

#[tokio::test(start_paused = true)]
async fn progress_is_streamed_per_item() {
    let uploader = Arc::new(
        ScriptedUploader::new()
            .with_steps(vec![10.0, 60.0, 100.0])
            .with_step_delay(Duration::from_millis(5)),
    );
    let coordinator = coordinator(&uploader, UploadConfig::default());
    let Enqueued { batch, .. } = coordinator.enqueue(vec![file("a.jpg", 10), file("b.jpg", 10)]);
    let stream = batch.subscribe();

    coordinator.dispatch(&batch).await.unwrap();
    drop(batch);

    let aggregates: Vec<f32> = stream.map(|s| s.aggregate_percent).collect().await;
    assert!(aggregates.windows(2).all(|w| w[0] <= w[1]), "{aggregates:?}");
    assert!(aggregates.contains(&5.0));
    assert!(aggregates.contains(&30.0));
    assert_eq!(aggregates.last(), Some(&100.0));
}

#[tokio::test]
async fn uploader_keeping_its_sink_still_completes() {
    let uploader = Arc::new(
        ScriptedUploader::new()
            .with_steps(vec![40.0, 80.0])
            .retaining_sinks()
            .failing("b.jpg"),
    );
    let coordinator = coordinator(&uploader, concurrency(2));
    let Enqueued { batch, .. } = coordinator.enqueue(vec![file("a.jpg", 10), file("b.jpg", 10)]);

    let snapshot = tokio::time::timeout(Duration::from_secs(2), coordinator.dispatch(&batch))
        .await
        .expect("dispatch must not wait on progress channels")
        .unwrap();

    assert_eq!(snapshot.items[0].status, UploadStatus::Complete);
    assert_eq!(snapshot.items[0].percent, 100.0);
    assert_eq!(snapshot.items[1].status, UploadStatus::Error);
    assert_eq!(snapshot.items[1].percent, 40.0);
    assert!(snapshot.batch_complete);
}

#[tokio::test]
async fn extend_and_discard() {
    let uploader = Arc::new(ScriptedUploader::new());
    let coordinator = coordinator(&uploader, UploadConfig::default());
    let Enqueued { batch, .. } = coordinator.enqueue(vec![file("a.jpg", 10)]);

    let rejected = coordinator
        .extend(&batch, vec![file("b.jpg", 10), file("c.exe", 10)])
        .unwrap();
    assert_eq!(rejected.len(), 1);

    let b = batch.snapshot().items[1].id;
    assert!(batch.discard(b));

    coordinator.dispatch(&batch).await.unwrap();
    assert_eq!(uploader.started(), vec!["a.jpg"]);
}

#[tokio::test(start_paused = true)]
async fn extend_refused_while_dispatching() {
    let uploader = Arc::new(ScriptedUploader::new().with_step_delay(Duration::from_millis(50)));
    let coordinator = coordinator(&uploader, UploadConfig::default());
    let Enqueued { batch, .. } = coordinator.enqueue(vec![file("a.jpg", 10)]);

    let (_, extended) = tokio::join!(coordinator.dispatch(&batch), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let extended = coordinator.extend(&batch, vec![file("b.jpg", 10)]);
        let cleared = batch.clear();
        (extended, cleared)
    });

    assert_eq!(extended.0, Err(UploadError::BatchInFlight));
    assert_eq!(extended.1, Err(UploadError::BatchInFlight));
    assert!(batch.clear().is_ok());
    assert!(batch.snapshot().items.is_empty());
}

#[tokio::test(start_paused = true)]
async fn error_notice_dismisses_after_delay() {
    let uploader = Arc::new(ScriptedUploader::new().failing("a.jpg"));
    let config = UploadConfig {
        dismiss_errors_after_ms: Some(3_000),
        ..UploadConfig::default()
    };
    let coordinator = coordinator(&uploader, config);
    let Enqueued { batch, .. } = coordinator.enqueue(vec![file("a.jpg", 10)]);

    let snapshot = coordinator.dispatch(&batch).await.unwrap();
    assert!(snapshot.error_notice.is_some());

    tokio::time::sleep(Duration::from_millis(2_900)).await;
    assert!(batch.snapshot().error_notice.is_some());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(batch.snapshot().error_notice.is_none());
    // The item error itself stays.
    assert_eq!(batch.snapshot().count(UploadStatus::Error), 1);
}

#[tokio::test(start_paused = true)]
async fn error_notice_persists_without_delay() {
    let uploader = Arc::new(ScriptedUploader::new().failing("a.jpg"));
    let coordinator = coordinator(&uploader, UploadConfig::default());
    let Enqueued { batch, .. } = coordinator.enqueue(vec![file("a.jpg", 10)]);

    coordinator.dispatch(&batch).await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(batch.snapshot().error_notice.is_some());

    batch.dismiss_notice();
    assert!(batch.snapshot().error_notice.is_none());
}

#[tokio::test(start_paused = true)]
async fn dropped_dispatch_resets_in_flight_items() {
    let uploader = Arc::new(ScriptedUploader::new().with_step_delay(Duration::from_millis(100)));
    let coordinator = coordinator(&uploader, UploadConfig::default());
    let Enqueued { batch, .. } = coordinator.enqueue(vec![file("a.jpg", 10), file("b.jpg", 10)]);

    let result = tokio::time::timeout(Duration::from_millis(150), coordinator.dispatch(&batch)).await;
    assert!(result.is_err());

    assert!(!batch.is_dispatching());
    assert_eq!(batch.snapshot().count(UploadStatus::Pending), 2);
    assert_eq!(batch.rounds_completed(), 0);

    coordinator.dispatch(&batch).await.unwrap();
    assert_eq!(batch.snapshot().count(UploadStatus::Complete), 2);
}
