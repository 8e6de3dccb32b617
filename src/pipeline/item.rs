//! Work items and directory scanning.
//!
//! A work item is an artifact file inside a region directory of one of the
//! stage trees. Scans visit regions and files in name order so that the
//! "first" candidate is the same on every platform.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::marker;
use super::properties::RESERVED_PREFIX;

/// Number of leading file name characters that identify the sub-unit.
const SHORT_CODE_LEN: usize = 3;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read directory entry in {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        source: std::io::Error,
    },
}

// =============================================================================
// WorkItem
// =============================================================================

/// Identity of a work item: owning region plus file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    pub region: String,
    pub file_name: String,
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.file_name)
    }
}

/// An artifact waiting in a region directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    id: ItemId,
    path: PathBuf,
}

impl WorkItem {
    pub fn new(region: impl Into<String>, path: PathBuf) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: ItemId {
                region: region.into(),
                file_name,
            },
            path,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn region(&self) -> &str {
        &self.id.region
    }

    pub fn file_name(&self) -> &str {
        &self.id.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The region directory holding this item.
    pub fn region_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Sub-unit code: the first three characters of the file name.
    pub fn short_code(&self) -> &str {
        let name = self.file_name();
        match name.char_indices().nth(SHORT_CODE_LEN) {
            Some((end, _)) => &name[..end],
            None => name,
        }
    }

    pub fn is_done(&self) -> bool {
        marker::is_done(&self.path)
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

// =============================================================================
// Scanning
// =============================================================================

/// Whether `name` is a data artifact with the given suffix.
///
/// Metadata files (reserved prefix) and markers never qualify.
pub fn is_artifact_name(name: &str, suffix: &str) -> bool {
    name.ends_with(suffix) && !name.starts_with(RESERVED_PREFIX)
}

/// Region directories directly under a stage root, sorted by name.
///
/// A missing root yields no regions; the upstream stage simply has not
/// produced anything yet.
pub fn region_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>, ScanError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(root).map_err(|e| ScanError::ReadDir {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut regions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::ReadEntry {
            path: root.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        regions.push((name, path));
    }

    regions.sort();
    Ok(regions)
}

/// Artifacts in one region directory, sorted by file name.
pub fn artifacts_in(region_dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, ScanError> {
    let entries = std::fs::read_dir(region_dir).map_err(|e| ScanError::ReadDir {
        path: region_dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::ReadEntry {
            path: region_dir.to_path_buf(),
            source: e,
        })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_artifact_name(&name, suffix) && entry.path().is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// All unmarked artifacts under a stage root, regions and files in name order.
///
/// A region directory that cannot be listed is logged and left out of this
/// scan; it is picked up again by the next one.
pub fn pending_items(root: &Path, suffix: &str) -> Result<Vec<WorkItem>, ScanError> {
    let mut items = Vec::new();
    for (region, dir) in region_dirs(root)? {
        match artifacts_in(&dir, suffix) {
            Ok(files) => items.extend(
                files
                    .into_iter()
                    .map(|path| WorkItem::new(region.clone(), path))
                    .filter(|item| !item.is_done()),
            ),
            Err(e) => warn!(region = %region, error = %e, "Skipping unreadable region directory"),
        }
    }
    Ok(items)
}
