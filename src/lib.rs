//! Berth - generates and maintains Bazel BUILD files for Go code
//!
//! This crate provides the library behind the `berth` binary: walking a
//! source tree into packages, generating rules for them, resolving imports
//! to labels, and merging the result into existing build files without
//! losing hand-written changes.

pub mod build_file;
pub mod core;
pub mod merger;
pub mod ops;
pub mod packages;
pub mod resolver;
pub mod rules;
pub mod util;

/// Test utilities and mocks for berth unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides fixture repositories on disk and a mock
/// repository root discovery.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{Config, Label, Labeler, Package};
pub use build_file::File;
pub use resolver::Resolver;
