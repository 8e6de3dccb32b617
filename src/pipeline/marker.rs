//! Completion markers.
//!
//! A marker is a zero-byte sibling file named `<item>.done`. Its presence is
//! the only record that a stage finished an item; its absence means the item
//! still needs work. Markers are created once and never removed.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

pub const MARKER_SUFFIX: &str = ".done";

/// Path of the marker that records completion of `item`.
pub fn marker_path(item: &Path) -> PathBuf {
    let mut name: OsString = item.as_os_str().to_owned();
    name.push(MARKER_SUFFIX);
    PathBuf::from(name)
}

/// Whether `item` has already been marked done.
pub fn is_done(item: &Path) -> bool {
    marker_path(item).exists()
}

/// Durably mark `item` as done.
///
/// Marking an item twice is a no-op: an existing marker is left untouched.
pub fn mark_done(item: &Path) -> io::Result<PathBuf> {
    let marker = marker_path(item);
    match OpenOptions::new().write(true).create_new(true).open(&marker) {
        Ok(file) => {
            file.sync_all()?;
            sync_parent(&marker)?;
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e),
    }
    Ok(marker)
}

/// Flush the directory entry of a freshly created file.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_path_appends_suffix() {
        assert_eq!(
            marker_path(Path::new("/work/fetched/RWR/AS_zones.json")),
            PathBuf::from("/work/fetched/RWR/AS_zones.json.done")
        );
        assert_eq!(
            marker_path(Path::new("/work/fetched/RWR/RWR")),
            PathBuf::from("/work/fetched/RWR/RWR.done")
        );
    }

    #[test]
    fn test_mark_done_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let item = dir.path().join("EU_.json");
        std::fs::write(&item, "{}").unwrap();

        assert!(!is_done(&item));
        let marker = mark_done(&item).unwrap();
        assert!(is_done(&item));
        assert_eq!(std::fs::metadata(&marker).unwrap().len(), 0);

        // A second mark keeps the existing marker
        mark_done(&item).unwrap();
        assert!(is_done(&item));
    }

    #[test]
    fn test_marker_does_not_require_item() {
        let dir = tempfile::tempdir().unwrap();
        let region = dir.path().join("RWR");

        mark_done(&region).unwrap();
        assert!(is_done(&region));
        assert!(!region.exists());
    }
}
