//! Core data structures for berth.
//!
//! This module contains the foundational types used throughout berth:
//! - Run configuration and per-directory directives
//! - Labels and the labeler that names generated targets
//! - Package descriptors built from source directories
//! - Repository root discovery

pub mod config;
pub mod directive;
pub mod label;
pub mod labeler;
pub mod package;
pub mod workspace;

pub use config::{Config, ConfigError, DependencyMode, ProtoMode, StructureMode};
pub use directive::Directive;
pub use label::Label;
pub use labeler::Labeler;
pub use package::{GoTarget, Package, PlatformStrings, ProtoTarget};
pub use workspace::find_repo_root;
