//! Crash and retry behaviour around the visibility timeout

use super::test_utils::{document, fast_queue, ScriptedBackend, Step};
use sitegen::queue::WorkQueue;
use sitegen::status::StatusService;
use sitegen::store::{BlobStore, MemoryBlobStore};
use sitegen::submission::{SubmissionService, SubmitRequest};
use sitegen::types::SessionStatus;
use sitegen::worker::{AbandonReason, ProcessOutcome, Worker};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_crash_before_ack_is_redelivered_and_completed() {
    let queue = fast_queue(100, None);
    let store = Arc::new(MemoryBlobStore::new());
    let status = StatusService::new(store.clone());
    SubmissionService::new(queue.clone())
        .submit(SubmitRequest::new("a bike shop", "bikes"))
        .await
        .unwrap();

    // First worker takes the job and dies without writing or acking
    let first = queue.receive(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(first.receive_count, 1);
    assert!(queue.receive(Duration::ZERO).await.unwrap().is_none());
    assert_eq!(status.resolve("bikes").await.unwrap(), SessionStatus::Pending);

    let second = queue
        .receive(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("job should reappear after the visibility timeout");
    assert_eq!(second.message_id, first.message_id);
    assert_eq!(second.receive_count, 2);
    assert_eq!(status.resolve("bikes").await.unwrap(), SessionStatus::Pending);

    let backend = Arc::new(ScriptedBackend::replying(document("Fixies")));
    let worker = Worker::new(
        queue.clone(),
        store.clone(),
        backend.clone(),
        Duration::from_secs(5),
    );
    assert!(worker.process(&second).await.is_committed());

    assert!(status.resolve("bikes").await.unwrap().is_ready());
    assert_eq!(backend.calls(), 1);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_backend_failure_leaves_job_for_retry() {
    let queue = fast_queue(50, None);
    let store = Arc::new(MemoryBlobStore::new());
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Fail("upstream 503".to_string()),
        Step::Reply(document("Second time lucky")),
    ]));
    let worker = Worker::new(queue.clone(), store.clone(), backend, Duration::from_secs(5));
    SubmissionService::new(queue.clone())
        .submit(SubmitRequest::new("a bookshop", "books"))
        .await
        .unwrap();

    let first = queue.receive(Duration::ZERO).await.unwrap().unwrap();
    match worker.process(&first).await {
        ProcessOutcome::Abandoned { reason } => {
            assert!(matches!(reason, AbandonReason::Backend(_)))
        }
        other => panic!("expected abandon, got {:?}", other),
    }
    assert!(store.is_empty());

    let second = queue.receive(Duration::from_secs(2)).await.unwrap().unwrap();
    assert!(worker.process(&second).await.is_committed());
    assert!(store.get("books.html").await.is_ok());
}

#[tokio::test]
async fn test_late_ack_after_redelivery_is_harmless() {
    let queue = fast_queue(50, None);
    let store = Arc::new(MemoryBlobStore::new());
    let backend = Arc::new(ScriptedBackend::replying(document("Same page")));
    let worker = Worker::new(queue.clone(), store.clone(), backend, Duration::from_secs(5));
    SubmissionService::new(queue.clone())
        .submit(SubmitRequest::new("a bakery", "slow"))
        .await
        .unwrap();

    // A slow first attempt outlives its lease; the job is handed out again
    let first = queue.receive(Duration::ZERO).await.unwrap().unwrap();
    let second = queue.receive(Duration::from_secs(2)).await.unwrap().unwrap();

    match worker.process(&first).await {
        ProcessOutcome::Abandoned { reason } => {
            assert!(matches!(reason, AbandonReason::Acknowledge(_)))
        }
        other => panic!("expected stale ack, got {:?}", other),
    }
    // The write happened before the failed ack
    assert!(store.head("slow.html").await.unwrap().is_some());

    assert!(worker.process(&second).await.is_committed());
    assert_eq!(store.len(), 1);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_exhausted_job_is_dropped_and_session_stays_pending() {
    let queue = fast_queue(30, Some(2));
    let store = Arc::new(MemoryBlobStore::new());
    let status = StatusService::new(store.clone());
    let backend = Arc::new(ScriptedBackend::failing("always down"));
    let worker = Worker::new(
        queue.clone(),
        store.clone(),
        backend.clone(),
        Duration::from_secs(5),
    );
    SubmissionService::new(queue.clone())
        .submit(SubmitRequest::new("a gym", "gym"))
        .await
        .unwrap();

    for expected_count in 1..=2 {
        let delivery = queue.receive(Duration::from_secs(2)).await.unwrap().unwrap();
        assert_eq!(delivery.receive_count, expected_count);
        assert!(!worker.process(&delivery).await.is_committed());
    }

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(queue
        .receive(Duration::from_millis(100))
        .await
        .unwrap()
        .is_none());
    assert!(queue.is_empty());
    assert_eq!(backend.calls(), 2);
    assert_eq!(status.resolve("gym").await.unwrap(), SessionStatus::Pending);
}
