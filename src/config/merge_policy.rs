//! Merge rules: defaults first, later sources override earlier ones.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the built-in defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("server.bind", "127.0.0.1:3000")?
        .set_default("queue.kind", "sled")?
        .set_default("queue.path", "data/queue")?
        .set_default("queue.visibility_timeout_secs", 300)?
        .set_default("store.kind", "filesystem")?
        .set_default("store.root", "data/artifacts")?
        .set_default("backend.kind", "content_blocks")?
        .set_default("backend.model", "claude-3-5-sonnet-20240620")?
        .set_default("backend.api_key_env", "ANTHROPIC_API_KEY")?
        .set_default("worker.concurrency", 2)?
        .set_default("worker.backend_timeout_secs", 90)?
        .set_default("status.mode", "inline")?
        .set_default("logging.level", "info")
}
