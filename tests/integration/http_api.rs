//! HTTP contract: request shapes, status codes, JSON bodies, CORS

use super::test_utils::{document, ScriptedBackend, UnavailableQueue, UnavailableStore};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sitegen::app::App;
use sitegen::config::{QueueKind, SitegenConfig, StoreKind};
use sitegen::queue::{MemoryWorkQueue, QueueSettings, WorkQueue};
use sitegen::status::StatusMode;
use sitegen::store::MemoryBlobStore;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn memory_config() -> SitegenConfig {
    let mut config = SitegenConfig::default();
    config.queue.kind = QueueKind::Memory;
    config.store.kind = StoreKind::Memory;
    config
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn post_generate(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_cors(response: &Response) {
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-headers"], "*");
    assert_eq!(headers["access-control-allow-methods"], "OPTIONS,POST,GET");
}

#[tokio::test]
async fn test_generate_then_poll_until_ready() {
    let app = App::from_config(memory_config()).unwrap();
    let router = app.router();

    let response = send(
        &router,
        post_generate(r#"{"prompt":"make a bakery site","sessionId":"sess-42"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Request accepted", "sessionId": "sess-42"})
    );

    let response = send(&router, get("/status?sessionId=sess-42")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    assert_eq!(json_body(response).await, json!({"status": "pending"}));

    let worker = app.worker(Arc::new(ScriptedBackend::replying(document("Croissants"))));
    let delivery = app.queue().receive(Duration::ZERO).await.unwrap().unwrap();
    assert!(worker.process(&delivery).await.is_committed());

    let response = send(&router, get("/status?sessionId=sess-42")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ready");
    let html = body["html"].as_str().unwrap();
    assert!(html.starts_with("<!-- START HTML -->"));
    assert!(html.ends_with("<!-- END HTML -->"));
    assert!(html.contains("Croissants"));
}

#[tokio::test]
async fn test_generate_rejects_incomplete_requests() {
    let queue = Arc::new(MemoryWorkQueue::new(QueueSettings::default()));
    let app = App::with_components(memory_config(), queue.clone(), Arc::new(MemoryBlobStore::new()));
    let router = app.router();

    for body in [
        r#"{"prompt":"a site"}"#,
        r#"{"sessionId":"s1"}"#,
        r#"{"prompt":"","sessionId":"s1"}"#,
        "{}",
        "",
    ] {
        let response = send(&router, post_generate(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_cors(&response);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Missing prompt or sessionId"})
        );
    }

    let response = send(&router, post_generate("not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());

    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_guest_session_fills_missing_id() {
    let mut config = memory_config();
    config.submission.guest_session_id = Some("guest".to_string());
    let app = App::from_config(config).unwrap();

    let response = send(&app.router(), post_generate(r#"{"prompt":"a site"}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["sessionId"], "guest");
}

#[tokio::test]
async fn test_enqueue_failure_is_server_error() {
    let app = App::with_components(
        memory_config(),
        Arc::new(UnavailableQueue),
        Arc::new(MemoryBlobStore::new()),
    );
    let response = send(
        &app.router(),
        post_generate(r#"{"prompt":"a site","sessionId":"s1"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Failed to enqueue request"})
    );
}

#[tokio::test]
async fn test_status_requires_session_id() {
    let router = App::from_config(memory_config()).unwrap().router();

    for uri in ["/status", "/status?sessionId="] {
        let response = send(&router, get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_cors(&response);
        assert_eq!(json_body(response).await, json!({"error": "Missing sessionId"}));
    }

    let response = send(&router, get("/status?sessionId=..%2Fsecrets")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_store_failure_is_server_error() {
    let app = App::with_components(
        memory_config(),
        Arc::new(MemoryWorkQueue::new(QueueSettings::default())),
        Arc::new(UnavailableStore),
    );
    let response = send(&app.router(), get("/status?sessionId=s1")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Error checking status"})
    );
}

#[tokio::test]
async fn test_url_mode_links_to_artifact_route() {
    let mut config = memory_config();
    config.status.mode = StatusMode::Url;
    config.status.public_base_url = Some("http://sites.test/".to_string());
    let app = App::from_config(config).unwrap();
    let router = app.router();

    send(&router, post_generate(r#"{"prompt":"a zoo","sessionId":"zoo"}"#)).await;
    let worker = app.worker(Arc::new(ScriptedBackend::replying(document("Lions"))));
    let delivery = app.queue().receive(Duration::ZERO).await.unwrap().unwrap();
    assert!(worker.process(&delivery).await.is_committed());

    let body = json_body(send(&router, get("/status?sessionId=zoo")).await).await;
    assert_eq!(
        body,
        json!({"status": "ready", "url": "http://sites.test/artifacts/zoo.html"})
    );

    let response = send(&router, get("/artifacts/zoo.html")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/html");
    assert_cors(&response);

    let response = send(&router, get("/artifacts/missing.html")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preflight_on_any_path() {
    let router = App::from_config(memory_config()).unwrap().router();
    for uri in ["/generate", "/status", "/anything"] {
        let response = send(
            &router,
            Request::builder()
                .method(Method::OPTIONS)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
    }
}

#[tokio::test]
async fn test_healthz() {
    let router = App::from_config(memory_config()).unwrap().router();
    let response = send(&router, get("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ok");
}
