//! External tools driven by the pipeline.
//!
//! The pipeline never looks inside the data. It only needs two capabilities:
//! - [`ZoneTool`] fetches a region's zones or sends one zone file
//! - [`ConvertTool`] converts one sent zone into its final format
//!
//! The production implementations spawn the zone maker jar and the Hadoop
//! converter job as child processes.

mod converter;
mod process;
mod zone_maker;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;

pub use converter::HadoopConverter;
pub use zone_maker::ZoneMakerCommand;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {}", describe_exit(.code))]
    ExitStatus { program: String, code: Option<i32> },

    #[cfg(test)]
    #[error("{0}")]
    Failed(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

// =============================================================================
// Zone tool
// =============================================================================

/// Zone maker work mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneMode {
    Fetch,
    Send,
}

impl ZoneMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneMode::Fetch => "FETCH",
            ZoneMode::Send => "SEND",
        }
    }
}

impl fmt::Display for ZoneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One zone maker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRequest {
    pub mode: ZoneMode,
    pub region: String,
    pub version: String,
    /// `<branch>:<transaction version>`
    pub branch_and_version: String,
    pub output_dir: PathBuf,
}

pub trait ZoneTool: Send + Sync + 'static {
    /// Run the tool to completion.
    fn run(&self, request: &ZoneRequest) -> impl Future<Output = Result<(), ToolError>> + Send;
}

// =============================================================================
// Convert tool
// =============================================================================

/// One conversion of a sent zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertJob {
    pub region: String,
    /// Zone code derived from the artifact name
    pub zone: String,
    /// Version found inside the artifact
    pub version: String,
    pub branch_and_version: String,
}

pub trait ConvertTool: Send + Sync + 'static {
    /// Run the conversion to completion.
    fn convert(&self, job: &ConvertJob) -> impl Future<Output = Result<(), ToolError>> + Send;

    /// Where the tool leaves its result for `job`.
    fn output_path(&self, job: &ConvertJob) -> PathBuf;
}
