//! Persisted per-region metadata.
//!
//! The fetch stage writes a small record into every region directory so that
//! the send and convert stages can recover the region's name, version and
//! branch from the filesystem alone. That is what lets a freshly started
//! process resume a half-finished run without re-reading the regions file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::region::RegionDescriptor;

/// File names starting with this character are metadata, never artifacts.
pub const RESERVED_PREFIX: char = '$';

#[derive(thiserror::Error, Debug)]
pub enum PropertiesError {
    #[error("failed to read region properties {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse region properties {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to write region properties {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize region properties: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Region metadata as persisted next to the region's artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionProperties {
    pub name: String,
    pub version: String,
    pub branch: Uuid,
    #[serde(rename = "journalVersion")]
    pub journal_version: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subregions: Vec<String>,
}

impl From<&RegionDescriptor> for RegionProperties {
    fn from(region: &RegionDescriptor) -> Self {
        Self {
            name: region.name().to_string(),
            version: region.version().to_string(),
            branch: region.branch(),
            journal_version: region.transaction_version(),
            subregions: region.subregions().to_vec(),
        }
    }
}

impl RegionProperties {
    /// Name of the properties file for `region`.
    pub fn file_name(region: &str) -> String {
        format!("{RESERVED_PREFIX}{region}.properties")
    }

    /// Location of the properties file inside a region directory.
    ///
    /// The region name is taken from the directory name.
    pub fn path_in(region_dir: &Path) -> PathBuf {
        let region = region_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        region_dir.join(Self::file_name(&region))
    }

    pub fn branch_and_version(&self) -> String {
        format!("{}:{}", self.branch, self.journal_version)
    }

    /// Whether the convert stage should pick up an artifact with `code`.
    ///
    /// An empty sub-region list accepts every code.
    pub fn accepts_code(&self, code: &str) -> bool {
        self.subregions.is_empty() || self.subregions.iter().any(|s| s == code)
    }

    pub fn load(region_dir: &Path) -> Result<Self, PropertiesError> {
        let path = Self::path_in(region_dir);
        let content = std::fs::read_to_string(&path).map_err(|e| PropertiesError::Read {
            path: path.clone(),
            source: e,
        })?;
        serde_yaml::from_str(&content).map_err(|e| PropertiesError::Parse { path, source: e })
    }

    pub fn store(&self, region_dir: &Path) -> Result<PathBuf, PropertiesError> {
        let path = region_dir.join(Self::file_name(&self.name));
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| PropertiesError::Write {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Copy the properties file from one region directory to another unless
    /// the target already has one. Returns whether a copy was made.
    pub fn copy_if_absent(from_dir: &Path, to_dir: &Path) -> Result<bool, PropertiesError> {
        let source = Self::path_in(from_dir);
        let target = Self::path_in(to_dir);
        if target.exists() {
            return Ok(false);
        }
        std::fs::copy(&source, &target).map_err(|e| PropertiesError::Write {
            path: target,
            source: e,
        })?;
        Ok(true)
    }
}
