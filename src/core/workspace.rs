//! Repository root discovery.

use std::path::{Path, PathBuf};

use crate::core::config::ConfigError;

/// Files marking the root of a Bazel repository.
pub const WORKSPACE_FILE_NAMES: &[&str] = &["WORKSPACE", "WORKSPACE.bazel"];

/// Find the repository root by searching `start` and its ancestors for a
/// WORKSPACE file.
pub fn find_repo_root(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if is_repo_root(dir) {
            return Ok(dir.to_path_buf());
        }
        current = dir.parent();
    }
    Err(ConfigError::RepoRootNotFound(start.to_path_buf()))
}

/// Check whether a directory holds a WORKSPACE file.
pub fn is_repo_root(dir: &Path) -> bool {
    WORKSPACE_FILE_NAMES
        .iter()
        .any(|name| dir.join(name).is_file())
}
