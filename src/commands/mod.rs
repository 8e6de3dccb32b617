pub mod run;
pub mod status;

use std::path::{Path, PathBuf};

/// Resolve a command line path against the current directory.
fn absolute(path: &Path) -> Result<PathBuf, std::io::Error> {
    if path.is_relative() {
        Ok(std::env::current_dir()?.join(path))
    } else {
        Ok(path.to_path_buf())
    }
}
