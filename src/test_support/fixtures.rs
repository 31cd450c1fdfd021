//! Test fixtures for common test scenarios.
//!
//! Source trees are written to temporary directories so the walker and the
//! package builder read real files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Write `(relative path, content)` pairs below `root`, creating parent
/// directories. A path ending in `/` creates an empty directory.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if rel.ends_with('/') {
            std::fs::create_dir_all(&path).expect("failed to create dir");
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, content).expect("failed to write fixture file");
    }
}

/// Go source text declaring `package` and importing `imports`.
pub fn go_source(package: &str, imports: &[&str]) -> String {
    let mut src = format!("package {}\n", package);
    match imports {
        [] => {}
        [single] => src.push_str(&format!("\nimport \"{}\"\n", single)),
        many => {
            src.push_str("\nimport (\n");
            for imp in many {
                src.push_str(&format!("\t\"{}\"\n", imp));
            }
            src.push_str(")\n");
        }
    }
    src
}

/// Fixture for a repository tree with a WORKSPACE file at its root.
#[derive(Debug, Clone, Default)]
pub struct RepoFixture {
    /// Files by path relative to the repository root.
    pub files: BTreeMap<PathBuf, String>,
    /// Empty directories to create.
    pub dirs: Vec<PathBuf>,
}

impl RepoFixture {
    pub fn new() -> Self {
        RepoFixture::default()
    }

    /// Add a file.
    pub fn file(mut self, rel: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(rel.into(), content.into());
        self
    }

    /// Add a Go source file.
    pub fn go_file(self, rel: impl Into<PathBuf>, package: &str, imports: &[&str]) -> Self {
        self.file(rel, go_source(package, imports))
    }

    /// Add an empty directory.
    pub fn dir(mut self, rel: impl Into<PathBuf>) -> Self {
        self.dirs.push(rel.into());
        self
    }

    /// Write the fixture to a new temporary directory.
    pub fn build(&self) -> TempDir {
        let tmp = TempDir::new().expect("failed to create temp dir");
        std::fs::write(tmp.path().join("WORKSPACE"), "").expect("failed to write WORKSPACE");
        for dir in &self.dirs {
            std::fs::create_dir_all(tmp.path().join(dir)).expect("failed to create dir");
        }
        for (rel, content) in &self.files {
            let path = tmp.path().join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("failed to create parent dir");
            }
            std::fs::write(&path, content).expect("failed to write fixture file");
        }
        tmp
    }
}

/// The `fmt` plus `github.com/acme/widget` scenario: one command importing
/// a standard and an external package.
pub fn widget_fixture() -> RepoFixture {
    RepoFixture::new().go_file(
        "cmd/hello/main.go",
        "main",
        &["fmt", "github.com/acme/widget"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_source() {
        assert_eq!(go_source("a", &[]), "package a\n");
        assert_eq!(go_source("a", &["fmt"]), "package a\n\nimport \"fmt\"\n");
        assert!(go_source("a", &["fmt", "os"]).contains("\t\"os\"\n"));
    }

    #[test]
    fn test_repo_fixture() {
        let tmp = widget_fixture().dir("empty").build();
        assert!(tmp.path().join("WORKSPACE").is_file());
        assert!(tmp.path().join("cmd/hello/main.go").is_file());
        assert!(tmp.path().join("empty").is_dir());
    }
}
