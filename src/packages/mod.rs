//! Source tree traversal and package classification.
//!
//! The walker visits directories below the repository root, reads existing
//! build files and directives, and hands the files of each directory to the
//! package builder. File metadata comes from the language plug-in selected
//! by [`language::by_name`].

pub mod builder;
pub mod constraint;
pub mod fileinfo;
pub mod language;
pub mod walk;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub use builder::build_package;
pub use language::{Go, Language};
pub use walk::{walk, Visit};

/// Errors that keep a directory from producing a package.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackageError {
    #[error("found packages {} in {}", PackageList(packages), dir.display())]
    MultiplePackages {
        dir: PathBuf,
        /// `(package name, first file)` pairs sorted by name.
        packages: Vec<(String, String)>,
    },

    #[error("{}: use of cgo in test not supported", path.display())]
    CgoInTest { path: PathBuf },
}

struct PackageList<'a>(&'a [(String, String)]);

impl fmt::Display for PackageList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, file)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} ({})", name, file)?;
        }
        Ok(())
    }
}
