//! Submit, generate, poll: the whole pipeline through its public services

use super::test_utils::{document, ScriptedBackend};
use serde_json::json;
use sitegen::app::App;
use sitegen::config::{QueueKind, SitegenConfig, StoreKind};
use sitegen::queue::{MemoryWorkQueue, QueueSettings, WorkQueue};
use sitegen::status::StatusService;
use sitegen::store::{BlobStore, MemoryBlobStore};
use sitegen::submission::{SubmissionService, SubmitRequest};
use sitegen::types::SessionStatus;
use sitegen::worker::{ProcessOutcome, Worker};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_bakery_request_becomes_ready_page() {
    let queue = Arc::new(MemoryWorkQueue::new(QueueSettings::default()));
    let store = Arc::new(MemoryBlobStore::new());
    let reply = document("Fresh bread daily");
    let backend = Arc::new(ScriptedBackend::replying(reply.clone()));

    let submission = SubmissionService::new(queue.clone());
    let status = StatusService::new(store.clone());
    let worker = Worker::new(
        queue.clone(),
        store.clone(),
        backend.clone(),
        Duration::from_secs(5),
    );

    let accepted = submission
        .submit(SubmitRequest::new("make a bakery site", "sess-42"))
        .await
        .unwrap();
    assert_eq!(accepted.session_id, "sess-42");

    let bodies = queue.bodies();
    assert_eq!(bodies.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(
        body,
        json!({"prompt": "make a bakery site", "sessionId": "sess-42"})
    );

    assert_eq!(status.resolve("sess-42").await.unwrap(), SessionStatus::Pending);

    let delivery = queue.receive(Duration::ZERO).await.unwrap().unwrap();
    let outcome = worker.process(&delivery).await;
    match outcome {
        ProcessOutcome::Committed { key, .. } => assert_eq!(key, "sess-42.html"),
        other => panic!("expected commit, got {:?}", other),
    }

    let start = reply.find("<!-- START HTML -->").unwrap();
    let expected = reply[start..].to_string();
    assert_eq!(
        status.resolve("sess-42").await.unwrap(),
        SessionStatus::Ready { html: expected }
    );

    assert!(queue.is_empty());
    assert_eq!(backend.calls(), 1);
    assert!(backend.prompts()[0].ends_with("Current request: \"make a bakery site\""));
}

#[tokio::test]
async fn test_resubmission_overwrites_artifact() {
    let queue = Arc::new(MemoryWorkQueue::new(QueueSettings::default()));
    let store = Arc::new(MemoryBlobStore::new());
    let backend = Arc::new(ScriptedBackend::new(vec![
        super::test_utils::Step::Reply(document("first version")),
        super::test_utils::Step::Reply(document("second version")),
    ]));
    let submission = SubmissionService::new(queue.clone());
    let worker = Worker::new(queue.clone(), store.clone(), backend, Duration::from_secs(5));

    for prompt in ["a cafe", "a cafe, but blue"] {
        submission
            .submit(SubmitRequest::new(prompt, "cafe"))
            .await
            .unwrap();
        let delivery = queue.receive(Duration::ZERO).await.unwrap().unwrap();
        assert!(worker.process(&delivery).await.is_committed());
    }

    let artifact = store.get("cafe.html").await.unwrap();
    assert!(artifact.text().contains("second version"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_durable_pipeline_survives_restart() {
    let temp = TempDir::new().unwrap();
    let mut config = SitegenConfig::default();
    config.queue.kind = QueueKind::Sled;
    config.queue.path = temp.path().join("queue");
    config.store.kind = StoreKind::Filesystem;
    config.store.root = temp.path().join("artifacts");
    config.worker.receive_wait_ms = 50;

    // Accept a job, then go away before any worker runs
    {
        let app = App::from_config(config.clone()).unwrap();
        app.submission_service()
            .submit(SubmitRequest::new("a florist", "flowers"))
            .await
            .unwrap();
        assert_eq!(
            app.status_service().resolve("flowers").await.unwrap(),
            SessionStatus::Pending
        );
    }

    let app = App::from_config(config).unwrap();
    assert_eq!(app.queue().stats().unwrap().visible, 1);

    let pool = app.worker_pool(Arc::new(ScriptedBackend::replying(document("Roses"))));
    pool.start();
    assert!(pool.wait_for_settled(1, Duration::from_secs(10)).await);
    pool.stop().await;

    assert_eq!(pool.stats().committed, 1);
    assert!(app
        .status_service()
        .resolve("flowers")
        .await
        .unwrap()
        .is_ready());
    assert!(temp.path().join("artifacts").join("flowers.html").is_file());
    assert_eq!(app.queue().stats().unwrap().visible, 0);
}

#[tokio::test]
async fn test_pool_handles_many_sessions() {
    let mut config = SitegenConfig::default();
    config.queue.kind = QueueKind::Memory;
    config.queue.poll_interval_ms = 10;
    config.store.kind = StoreKind::Memory;
    config.worker.concurrency = 4;
    config.worker.receive_wait_ms = 50;
    let app = App::from_config(config).unwrap();

    let submission = app.submission_service();
    for i in 0..12 {
        submission
            .submit(SubmitRequest::new(format!("site {}", i), format!("s{}", i)))
            .await
            .unwrap();
    }

    let backend = Arc::new(ScriptedBackend::replying(document("generic page")));
    let pool = app.worker_pool(backend.clone());
    pool.start();
    assert!(pool.wait_for_settled(12, Duration::from_secs(10)).await);
    pool.stop().await;

    let status = app.status_service();
    for i in 0..12 {
        assert!(status.resolve(&format!("s{}", i)).await.unwrap().is_ready());
    }
    assert_eq!(backend.calls(), 12);
    assert_eq!(pool.stats().abandoned, 0);
}
