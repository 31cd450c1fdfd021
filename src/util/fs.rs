//! Filesystem utilities.

use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result};

/// A directory entry reduced to what the walker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    /// The entry itself is a directory. Symlinks are not followed.
    pub is_dir: bool,
}

/// List a directory, sorted by name.
pub fn read_dir_sorted(dir: &Path) -> Result<Vec<DirEntryInfo>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read directory: {}", dir.display()))?;
        let ty = entry.file_type()?;
        entries.push(DirEntryInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: ty.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Convert a relative path to a slash-separated string. `.` becomes empty.
pub fn slash_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Slash-separated path of `path` relative to `base`.
pub fn relative_slash_path(base: &Path, path: &Path) -> String {
    match pathdiff::diff_paths(path, base) {
        Some(rel) => slash_path(&rel),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_dir_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("b.go"), "").unwrap();
        fs::write(tmp.path().join("a.go"), "").unwrap();

        let entries = read_dir_sorted(tmp.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.go", "b.go", "sub"]);
        assert!(entries[2].is_dir);

        assert!(read_dir_sorted(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn test_slash_path() {
        assert_eq!(slash_path(Path::new(".")), "");
        assert_eq!(slash_path(Path::new("a/b")), "a/b");
        assert_eq!(
            relative_slash_path(Path::new("/repo"), Path::new("/repo/x/y")),
            "x/y"
        );
        assert_eq!(relative_slash_path(Path::new("/repo"), Path::new("/repo")), "");
    }

    #[test]
    fn test_write_string_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/BUILD.bazel");
        write_string(&path, "x\n").unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "x\n");
    }
}
