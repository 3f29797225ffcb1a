//! Configuration files drive the assembled application

use sitegen::app::App;
use sitegen::config::ConfigLoader;
use sitegen::provider::{BackendFactory, BackendKind};
use sitegen::status::StatusMode;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_file_config_assembles_application() {
    let temp = TempDir::new().unwrap();
    let config_file = temp.path().join("sitegen.toml");
    std::fs::write(
        &config_file,
        format!(
            r#"
[server]
bind = "0.0.0.0:8080"

[queue]
kind = "sled"
path = "{queue}"
visibility_timeout_secs = 120
max_receive_count = 5

[store]
kind = "filesystem"
root = "{root}"

[backend]
kind = "completion_text"
model = "local-model"
endpoint = "http://127.0.0.1:8000/v1"

[worker]
concurrency = 3
backend_timeout_secs = 60

[status]
mode = "url"
public_base_url = "https://pages.example.com"
"#,
            queue = temp.path().join("queue").display(),
            root = temp.path().join("artifacts").display(),
        ),
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.queue.visibility_timeout(), Duration::from_secs(120));
    assert_eq!(config.queue.settings().max_receive_count, Some(5));
    assert_eq!(config.worker.pool_config().concurrency, 3);
    assert_eq!(config.backend.kind, BackendKind::CompletionText);

    let backend = BackendFactory::create_backend(&config.backend).unwrap();
    assert_eq!(backend.model_name(), "local-model");

    let app = App::from_config(config).unwrap();
    assert_eq!(app.queue().queue_name(), "sled");
    assert_eq!(app.store().store_name(), "filesystem");
    assert_eq!(app.status_service().mode(), StatusMode::Url);
    assert!(temp.path().join("artifacts").is_dir());
}

#[test]
fn test_invalid_file_reports_each_problem() {
    let temp = TempDir::new().unwrap();
    let config_file = temp.path().join("bad.toml");
    std::fs::write(
        &config_file,
        r#"
[server]
bind = "not an address"

[worker]
concurrency = 0

[status]
public_base_url = "ftp://nope"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 3);
}
