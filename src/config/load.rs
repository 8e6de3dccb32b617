//! Configuration loading from files.
//!
//! The YAML file is layered with `REGIONFLOW__*` environment variables, so
//! `REGIONFLOW__PIPELINE__SEND_POLL_MS=500` overrides `pipeline.send_poll_ms`.

use std::path::Path;

use config::{Environment, File, FileFormat};

use super::{ConfigError, RootConfig};

const DEFAULT_CONFIG_FILE: &str = "regionflow.yaml";

impl RootConfig {
    /// Load the config from the command line argument, defaulting to `regionflow.yaml`
    pub fn load_from_arg(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config_file = config_file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let config_file = if config_file.is_relative() {
            std::env::current_dir()
                .map_err(ConfigError::CwdFailure)?
                .join(config_file)
        } else {
            config_file.to_path_buf()
        };

        Self::load_from_file(&config_file)
    }

    /// Load the config from a file path, resolving relative paths against
    /// the file's directory.
    pub(crate) fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::EncodePath(path.to_path_buf()))?;

        let mut root: RootConfig = config::Config::builder()
            .add_source(File::new(path_str, FileFormat::Yaml))
            .add_source(Environment::with_prefix("REGIONFLOW").separator("__"))
            .build()?
            .try_deserialize()?;

        root.validate()?;
        root.resolve_paths(&base_path_from_config(path));
        Ok(root)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.artifact_suffix.is_empty() {
            return Err(ConfigError::Validation(
                "pipeline.artifact_suffix must not be empty".to_string(),
            ));
        }
        if self.pipeline.artifact_suffix.ends_with(crate::pipeline::MARKER_SUFFIX) {
            return Err(ConfigError::Validation(format!(
                "pipeline.artifact_suffix cannot end with the marker suffix '{}'",
                crate::pipeline::MARKER_SUFFIX
            )));
        }
        if self.pipeline.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "pipeline.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the base path from a config file path (its parent directory).
fn base_path_from_config(config_path: &Path) -> std::path::PathBuf {
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("."))
}
