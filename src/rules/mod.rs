//! Rule generation.
//!
//! The [`Generator`] turns a [`Package`](crate::core::Package) into rule
//! calls. Generated rules keep their imports as raw strings in
//! `_berth_imports`; the resolver turns them into `deps` afterwards.

pub mod generator;
pub mod sort;

pub use generator::{is_empty_rule, Generator};
pub use sort::sort_labels;
