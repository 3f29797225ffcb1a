//! Config sources: TOML file and `SITEGEN__*` environment variables.

use super::DEFAULT_CONFIG_FILE;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Add the config file to the builder.
///
/// An explicit `path` must exist. Without one, `./sitegen.toml` is used
/// when present.
pub fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: Option<&Path>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(format!(
                    "config file {}",
                    path.display()
                )));
            }
            debug!(config_path = %path.display(), "Loading config file");
            Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(true)))
        }
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                debug!(config_path = %default_path.display(), "Loading config file");
            }
            Ok(builder.add_source(
                File::from(default_path)
                    .format(FileFormat::Toml)
                    .required(false),
            ))
        }
    }
}

/// Add `SITEGEN__SECTION__KEY` overrides, e.g. `SITEGEN__WORKER__CONCURRENCY=4`.
pub fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("SITEGEN")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
