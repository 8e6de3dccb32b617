//! Stage and pipeline error types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::item::ScanError;
use super::properties::PropertiesError;
use crate::tool::ToolError;

/// Errors that end a stage worker.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Properties(#[from] PropertiesError),

    #[error("tool failed for {item}: {source}")]
    Tool { item: String, source: ToolError },

    #[error("converter reported success but left no output at {0}")]
    MissingOutput(PathBuf),

    #[error("upstream stage '{0}' failed")]
    UpstreamFailed(&'static str),

    #[error("filesystem task did not complete: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn tool(item: impl fmt::Display, source: ToolError) -> Self {
        Self::Tool {
            item: item.to_string(),
            source,
        }
    }
}

/// Errors that end a whole pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to create pipeline directories: {0}")]
    Layout(#[source] std::io::Error),

    #[error("pipeline did not finish within {0:?}")]
    Timeout(Duration),
}
