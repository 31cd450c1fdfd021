//! Test utilities and mocks for berth unit tests.
//!
//! Provides fixture trees on disk and a mock repository root discovery so
//! external resolution can be tested without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use berth::test_support::{MockDiscovery, RepoFixture};
//!
//! #[test]
//! fn test_example() {
//!     let repo = RepoFixture::new().go_file("a/a.go", "a", &["fmt"]).build();
//!     let discovery = MockDiscovery::new().with_root("example.com/x/y", "example.com/x");
//!     // Walk `repo.path()` and resolve with `discovery`...
//! }
//! ```

pub mod fixtures;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use crate::resolver::discovery::RepoRootDiscovery;

// Re-export fixtures for convenience
pub use fixtures::*;

/// Mock repository root discovery.
///
/// Answers from a fixed table and records every lookup, so tests can check
/// that results are cached.
#[derive(Debug, Clone, Default)]
pub struct MockDiscovery {
    roots: HashMap<String, String>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockDiscovery {
    pub fn new() -> Self {
        MockDiscovery::default()
    }

    /// Answer lookups of `imp` with `root`.
    pub fn with_root(mut self, imp: &str, root: &str) -> Self {
        self.roots.insert(imp.to_string(), root.to_string());
        self
    }

    /// Shared view of the lookups made so far.
    pub fn requests(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.requests)
    }
}

impl RepoRootDiscovery for MockDiscovery {
    fn repo_root(&self, imp: &str) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(imp.to_string());
        }
        match self.roots.get(imp) {
            Some(root) => Ok(root.clone()),
            None => bail!("no mock repository root for {}", imp),
        }
    }
}

/// Assertion helpers for testing.
pub mod assertions {
    use std::path::Path;

    /// Assert that an error message contains a substring.
    pub fn assert_error_contains<T: std::fmt::Debug>(
        result: Result<T, anyhow::Error>,
        substring: &str,
    ) {
        match result {
            Ok(v) => panic!("expected Err containing '{}', got Ok: {:?}", substring, v),
            Err(e) => {
                let msg = format!("{:#}", e);
                assert!(
                    msg.contains(substring),
                    "error '{}' does not contain '{}'",
                    msg,
                    substring
                );
            }
        }
    }

    /// Assert that a file on disk contains specific content.
    pub fn assert_file_contains(path: impl AsRef<Path>, content: &str) {
        let path = path.as_ref();
        let actual = std::fs::read_to_string(path)
            .unwrap_or_else(|_| panic!("file not found: {}", path.display()));
        assert!(
            actual.contains(content),
            "file {} does not contain '{}'\nactual content:\n{}",
            path.display(),
            content,
            actual
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_discovery_records_requests() {
        let discovery = MockDiscovery::new().with_root("example.com/x/y", "example.com/x");
        let requests = discovery.requests();

        assert_eq!(discovery.repo_root("example.com/x/y").unwrap(), "example.com/x");
        assert!(discovery.repo_root("example.com/other").is_err());
        assert_eq!(
            *requests.lock().unwrap(),
            vec!["example.com/x/y", "example.com/other"]
        );
    }

    #[test]
    fn test_assertions() {
        use assertions::*;

        let tmp = RepoFixture::new().file("BUILD", "# hello\n").build();
        assert_file_contains(tmp.path().join("BUILD"), "hello");
        assert_error_contains::<()>(Err(anyhow::anyhow!("boom: bad")), "bad");
    }
}
