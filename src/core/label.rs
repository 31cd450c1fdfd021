//! Build target labels.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A reference to a build target: `@repo//pkg:name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    /// External repository name, empty for the main repository.
    pub repo: String,

    /// Slash-separated package path relative to the repository root.
    pub pkg: String,

    /// Target name within the package.
    pub name: String,

    /// Print as `:name`, for references from the same package.
    pub relative: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("invalid label {label:?}: {reason}")]
    Invalid { label: String, reason: &'static str },
}

impl Label {
    pub fn new(repo: impl Into<String>, pkg: impl Into<String>, name: impl Into<String>) -> Self {
        Label {
            repo: repo.into(),
            pkg: pkg.into(),
            name: name.into(),
            relative: false,
        }
    }

    /// A label in the main repository.
    pub fn local(pkg: impl Into<String>, name: impl Into<String>) -> Self {
        Label::new("", pkg, name)
    }

    /// A same-package reference printed as `:name`.
    pub fn relative_to_package(name: impl Into<String>) -> Self {
        Label {
            relative: true,
            ..Label::local("", name)
        }
    }

    /// Mark the label relative when it points into the package `build_rel`
    /// of the main repository.
    pub fn relative_from(mut self, build_rel: &str) -> Self {
        self.relative = self.repo.is_empty() && self.pkg == build_rel;
        self
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            return write!(f, ":{}", self.name);
        }
        if !self.repo.is_empty() {
            write!(f, "@{}", self.repo)?;
        }
        write!(f, "//{}", self.pkg)?;
        if base_name(&self.pkg) != self.name {
            write!(f, ":{}", self.name)?;
        }
        Ok(())
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| LabelError::Invalid {
            label: s.to_string(),
            reason,
        };

        if let Some(name) = s.strip_prefix(':') {
            if name.is_empty() {
                return Err(invalid("empty target name"));
            }
            return Ok(Label::relative_to_package(name));
        }

        let (repo, rest) = match s.strip_prefix('@') {
            Some(rest) => match rest.split_once("//") {
                Some((repo, rest)) if !repo.is_empty() => (repo, rest),
                Some(_) => return Err(invalid("empty repository name")),
                None => return Err(invalid("missing `//` after repository name")),
            },
            None => match s.strip_prefix("//") {
                Some(rest) => ("", rest),
                None if !s.is_empty() && !s.contains(['/', ':']) => {
                    return Ok(Label::relative_to_package(s));
                }
                None => return Err(invalid("expected `//`, `@` or `:`")),
            },
        };

        let (pkg, name) = match rest.split_once(':') {
            Some((pkg, name)) => (pkg, name.to_string()),
            None => (rest, base_name(rest).to_string()),
        };
        if pkg.starts_with('/') || pkg.ends_with('/') || pkg.contains("//") {
            return Err(invalid("malformed package path"));
        }
        if name.is_empty() {
            return Err(invalid("empty target name"));
        }

        Ok(Label::new(repo, pkg, name))
    }
}

/// Last slash-separated element of a path.
pub(crate) fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
