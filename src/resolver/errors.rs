//! Resolution error types.

use thiserror::Error;

/// Error resolving a single import to a label.
///
/// Resolution errors never stop a run: the import is dropped from `deps`
/// and the error is logged, except for standard library imports, which are
/// expected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("import path {imp:?} is in the standard library")]
    StandardImport { imp: String },

    #[error("relative import path {imp:?} from {from:?} points outside of repository")]
    EscapesRepository { imp: String, from: String },

    #[error("import path {imp:?} is shorter than the known prefix {prefix:?}")]
    PrefixTooShort { imp: String, prefix: String },

    #[error("can't import non-proto {imp:?}")]
    NotProto { imp: String },

    #[error("could not find the repository root of {imp:?}: {reason}")]
    Discovery { imp: String, reason: String },
}

impl ResolveError {
    /// Standard library imports are dropped silently.
    pub fn is_silent(&self) -> bool {
        matches!(self, ResolveError::StandardImport { .. })
    }
}
