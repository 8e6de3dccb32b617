//! On-disk layout of a pipeline run.
//!
//! ```text
//! <output>/
//!   fetched/<REGION>/   artifacts written by the fetch tool, plus markers
//!   sent/<REGION>/      artifacts accepted by the send tool, plus markers
//!   tmp/                single-slot staging area used while sending
//! <destination>/        final converted artifacts (default <output>/done)
//! ```

use std::io;
use std::path::{Path, PathBuf};

pub const FETCHED_DIR: &str = "fetched";
pub const SENT_DIR: &str = "sent";
pub const STAGING_DIR: &str = "tmp";

/// Directory layout shared by all stages of one run.
#[derive(Debug, Clone)]
pub struct PipelineLayout {
    output: PathBuf,
    destination: PathBuf,
}

impl PipelineLayout {
    pub fn new(output: PathBuf, destination: PathBuf) -> Self {
        Self {
            output,
            destination,
        }
    }

    /// Layout with the destination at its default place, `<output>/done`.
    #[allow(dead_code)]
    pub fn with_default_destination(output: PathBuf) -> Self {
        let destination = output.join("done");
        Self::new(output, destination)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn fetched(&self) -> PathBuf {
        self.output.join(FETCHED_DIR)
    }

    pub fn sent(&self) -> PathBuf {
        self.output.join(SENT_DIR)
    }

    pub fn staging(&self) -> PathBuf {
        self.output.join(STAGING_DIR)
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn fetched_region(&self, region: &str) -> PathBuf {
        self.fetched().join(region)
    }

    pub fn sent_region(&self, region: &str) -> PathBuf {
        self.sent().join(region)
    }

    /// The path whose marker records that `region` has been fetched,
    /// `fetched/<REGION>/<REGION>`.
    pub fn fetch_item(&self, region: &str) -> PathBuf {
        self.fetched_region(region).join(region)
    }

    /// Create the stage roots. Safe to call on an existing tree.
    pub fn create_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.fetched())?;
        std::fs::create_dir_all(self.sent())?;
        std::fs::create_dir_all(self.staging())?;
        std::fs::create_dir_all(&self.destination)?;
        Ok(())
    }
}
