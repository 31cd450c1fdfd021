//! Source language plug-ins.

use std::fmt;
use std::path::Path;

use crate::core::config::ConfigError;
use crate::packages::fileinfo::{self, FileInfo};

/// Classifies source files and extracts the metadata the generator needs.
pub trait Language: fmt::Debug {
    /// Name used to select the plug-in.
    fn name(&self) -> &'static str;

    /// Check whether a file name is a source file of this language.
    fn is_source_file(&self, name: &str) -> bool;

    /// Read metadata from a source file in `dir`.
    fn file_info(&self, dir: &Path, name: &str) -> FileInfo;

    /// Check whether an import refers to the standard library.
    fn is_standard_import(&self, imp: &str) -> bool;
}

/// The Go plug-in.
#[derive(Debug, Default, Clone, Copy)]
pub struct Go;

impl Language for Go {
    fn name(&self) -> &'static str {
        "go"
    }

    fn is_source_file(&self, name: &str) -> bool {
        name.ends_with(".go")
    }

    fn file_info(&self, dir: &Path, name: &str) -> FileInfo {
        fileinfo::go_file_info(dir, name)
    }

    /// Standard library paths have no dot in their first element.
    fn is_standard_import(&self, imp: &str) -> bool {
        let first = imp.split('/').next().unwrap_or(imp);
        !first.contains('.')
    }
}

/// Select a language plug-in by name.
pub fn by_name(name: &str) -> Result<Box<dyn Language>, ConfigError> {
    match name {
        "go" => Ok(Box::new(Go)),
        _ => Err(ConfigError::UnknownLanguage(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("go").unwrap().name(), "go");
        assert!(matches!(
            by_name("cobol"),
            Err(ConfigError::UnknownLanguage(ref n)) if n == "cobol"
        ));
    }

    #[test]
    fn test_standard_import() {
        let go = Go;
        assert!(go.is_standard_import("fmt"));
        assert!(go.is_standard_import("net/http"));
        assert!(!go.is_standard_import("github.com/acme/widget"));
        assert!(!go.is_standard_import("example.com"));
        assert!(go.is_source_file("a_test.go"));
        assert!(!go.is_source_file("a.proto"));
    }
}
