//! Generator configuration.
//!
//! A [`Config`] is built once from defaults, settings files and command-line
//! flags, validated, and then handed to the walker. Each directory visit
//! derives its own copy with [`Config::apply_directives`] and
//! [`Config::infer_proto_mode`]; the parent value is never modified, so a
//! directive in one directory can only affect that directory and its
//! descendants.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use miette::Diagnostic;
use thiserror::Error;

use crate::build_file::File;
use crate::core::directive::Directive;

/// Name of the library rule generated in hierarchical mode.
pub const DEFAULT_LIB_NAME: &str = "go_default_library";

/// Name of the deprecated `cgo_library` rule squashed in fix mode.
pub const DEFAULT_CGO_LIB_NAME: &str = "cgo_default_library";

/// Name of the internal test rule generated in hierarchical mode.
pub const DEFAULT_TEST_NAME: &str = "go_default_test";

/// Name of the external test rule generated in hierarchical mode.
pub const DEFAULT_XTEST_NAME: &str = "go_default_xtest";

/// Name of the filegroup exposing `.proto` sources in legacy proto mode.
pub const DEFAULT_PROTOS_NAME: &str = "go_default_library_protos";

/// Build file names recognized when none are configured.
pub const DEFAULT_BUILD_FILE_NAMES: &[&str] = &["BUILD.bazel", "BUILD"];

/// Repository providing the Go rules.
pub const RULES_GO_REPO_NAME: &str = "io_bazel_rules_go";

/// The file Go rule symbols are loaded from.
pub const RULES_GO_DEF_BZL_LABEL: &str = "@io_bazel_rules_go//go:def.bzl";

/// Load location of the legacy `go_proto_library` macro.
pub const RULES_GO_LEGACY_PROTO_BZL_LABEL: &str = "@io_bazel_rules_go//proto:go_proto_library.bzl";

/// Load location of the current proto rules.
pub const RULES_GO_PROTO_DEF_BZL_LABEL: &str = "@io_bazel_rules_go//proto:def.bzl";

/// Prefix of the platform config settings used in `select` keys.
pub const PLATFORM_LABEL_PREFIX: &str = "@io_bazel_rules_go//go/platform:";

/// Repository holding the well-known protos.
pub const WELL_KNOWN_PROTO_REPO: &str = "com_google_protobuf";

/// Package holding pre-compiled well-known protos for Go.
pub const WELL_KNOWN_GO_PROTO_PKG: &str = "proto/wkt";

/// Private attribute holding raw import strings until resolution.
pub const IMPORTS_ATTR: &str = "_berth_imports";

/// Package name reserved for documentation-only files.
pub const DOCUMENTATION_PACKAGE: &str = "documentation";

/// Name of the directory holding test fixtures.
pub const TESTDATA_DIR: &str = "testdata";

/// Errors in configuration that prevent a run from starting.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("no valid build file names specified")]
    #[diagnostic(
        code(berth::config::build_file_names),
        help("Pass at least one name, e.g. `--build-file-name BUILD.bazel,BUILD`")
    )]
    NoBuildFileNames,

    #[error("dir {} is not a subdirectory of repo root {}", dir.display(), root.display())]
    #[diagnostic(
        code(berth::config::dir_outside_root),
        help("Pass directories inside the repository or set `--repo-root`")
    )]
    DirOutsideRoot { dir: PathBuf, root: PathBuf },

    #[error("unrecognized {kind} mode: {value:?}")]
    #[diagnostic(code(berth::config::unknown_mode))]
    UnknownMode {
        kind: &'static str,
        value: String,
        #[help]
        expected: Option<String>,
    },

    #[error("build tags can't be negated: {0}")]
    #[diagnostic(
        code(berth::config::negated_tag),
        help("Only list the tags that should be set")
    )]
    NegatedTag(String),

    #[error("unknown language: {0:?}")]
    #[diagnostic(code(berth::config::unknown_language), help("Supported languages: go"))]
    UnknownLanguage(String),

    #[error("--repo-root not specified, and WORKSPACE cannot be found above {}", .0.display())]
    #[diagnostic(
        code(berth::config::repo_root),
        help("Create a WORKSPACE file at the repository root or pass `--repo-root`")
    )]
    RepoRootNotFound(PathBuf),
}

impl ConfigError {
    fn unknown_mode(kind: &'static str, value: &str, choices: &[&str]) -> Self {
        ConfigError::UnknownMode {
            kind,
            value: value.to_string(),
            expected: Some(format!("Expected one of: {}", choices.join(", "))),
        }
    }
}

/// How imports of packages outside the prefix are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DependencyMode {
    /// Imports resolve to external repositories declared in WORKSPACE.
    #[default]
    External,
    /// Imports resolve to libraries in the `vendor` directory.
    Vendored,
}

/// How build files are laid out across the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StructureMode {
    /// One build file per directory.
    #[default]
    Hierarchical,
    /// A single build file at the repository root.
    Flat,
}

/// How `.proto` files are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtoMode {
    /// Generate `proto_library` and `go_proto_library` rules. `.pb.go` files
    /// with a matching `.proto` are excluded.
    #[default]
    Default,
    /// Ignore `.proto` files; `.pb.go` files are ordinary sources.
    Disable,
    /// Expose `.proto` files through a filegroup when `.pb.go` files exist.
    Legacy,
}

impl FromStr for DependencyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external" => Ok(DependencyMode::External),
            "vendored" => Ok(DependencyMode::Vendored),
            _ => Err(ConfigError::unknown_mode(
                "dependency",
                s,
                &["external", "vendored"],
            )),
        }
    }
}

impl FromStr for StructureMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hierarchical" => Ok(StructureMode::Hierarchical),
            "flat" => Ok(StructureMode::Flat),
            _ => Err(ConfigError::unknown_mode(
                "structure",
                s,
                &["hierarchical", "flat"],
            )),
        }
    }
}

impl FromStr for ProtoMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ProtoMode::Default),
            "disable" => Ok(ProtoMode::Disable),
            "legacy" => Ok(ProtoMode::Legacy),
            _ => Err(ConfigError::unknown_mode(
                "proto",
                s,
                &["default", "disable", "legacy"],
            )),
        }
    }
}

impl fmt::Display for ProtoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoMode::Default => write!(f, "default"),
            ProtoMode::Disable => write!(f, "disable"),
            ProtoMode::Legacy => write!(f, "legacy"),
        }
    }
}

/// A set of build tags considered true when evaluating constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildTags(BTreeSet<String>);

impl BuildTags {
    /// Parse a comma-separated tag list. Empty elements are skipped.
    pub fn parse(tags: &str) -> Result<Self, ConfigError> {
        let mut set = BTreeSet::new();
        for tag in tags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if tag.starts_with('!') {
                return Err(ConfigError::NegatedTag(tag.to_string()));
            }
            set.insert(tag.to_string());
        }
        Ok(BuildTags(set))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn insert(&mut self, tag: impl Into<String>) {
        self.0.insert(tag.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Configuration for a generator run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute directories to update.
    pub dirs: Vec<PathBuf>,

    /// Absolute path to the repository root.
    pub repo_root: PathBuf,

    /// Recognized build file names. The first is used for new files.
    pub valid_build_file_names: Vec<String>,

    /// Tags considered true when filtering sources without a platform.
    pub generic_tags: BuildTags,

    /// Import path of the repository root. May be empty.
    pub prefix: String,

    pub dep_mode: DependencyMode,

    pub structure_mode: StructureMode,

    pub proto_mode: ProtoMode,

    /// Set when the proto mode came from a flag or directive, which
    /// disables inference from existing build files.
    pub proto_mode_explicit: bool,

    /// Repository root import paths that are never looked up remotely.
    pub known_imports: Vec<String>,

    /// Apply potentially breaking fixes to existing files.
    pub should_fix: bool,

    /// Name of the source language plug-in.
    pub language: String,
}

impl Config {
    /// Create a configuration with default settings for a repository.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Config {
            dirs: vec![repo_root.clone()],
            repo_root,
            valid_build_file_names: DEFAULT_BUILD_FILE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            generic_tags: BuildTags::default(),
            prefix: String::new(),
            dep_mode: DependencyMode::default(),
            structure_mode: StructureMode::default(),
            proto_mode: ProtoMode::default(),
            proto_mode_explicit: false,
            known_imports: Vec::new(),
            should_fix: false,
            language: "go".to_string(),
        }
    }

    pub fn is_valid_build_file_name(&self, name: &str) -> bool {
        self.valid_build_file_names.iter().any(|n| n == name)
    }

    /// Name used when creating a new build file.
    pub fn default_build_file_name(&self) -> &str {
        self.valid_build_file_names
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_BUILD_FILE_NAMES[0])
    }

    /// Replace the generic tags with a parsed comma-separated list.
    /// [`Config::preprocess_tags`] should be called afterwards.
    pub fn set_build_tags(&mut self, tags: &str) -> Result<(), ConfigError> {
        self.generic_tags = BuildTags::parse(tags)?;
        Ok(())
    }

    /// Add tags that are on by default before matching files.
    pub fn preprocess_tags(&mut self) {
        self.generic_tags.insert("cgo");
        self.generic_tags.insert("gc");
    }

    /// Check invariants that must hold before traversal starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.valid_build_file_names.is_empty()
            || self.valid_build_file_names.iter().any(|n| n.is_empty())
        {
            return Err(ConfigError::NoBuildFileNames);
        }
        for dir in &self.dirs {
            if !is_descending_dir(dir, &self.repo_root) {
                return Err(ConfigError::DirOutsideRoot {
                    dir: dir.clone(),
                    root: self.repo_root.clone(),
                });
            }
        }
        Ok(())
    }

    /// Derive the configuration for a directory from its directives.
    pub fn apply_directives(&self, directives: &[Directive]) -> Config {
        let mut config = self.clone();
        for directive in directives {
            if directive.key == "proto" {
                match directive.value.parse::<ProtoMode>() {
                    Ok(mode) => {
                        config.proto_mode = mode;
                        config.proto_mode_explicit = true;
                    }
                    Err(e) => tracing::warn!("{}", e),
                }
            }
        }
        config
    }

    /// Derive the proto mode from the load statements of an existing build
    /// file, unless the mode was set explicitly.
    pub fn infer_proto_mode(&self, file: Option<&File>) -> Config {
        let mut config = self.clone();
        if self.proto_mode_explicit {
            return config;
        }
        let Some(file) = file else {
            return config;
        };

        for stmt in &file.stmts {
            let Some(call) = stmt.as_call() else {
                continue;
            };
            if call.func != "load" {
                continue;
            }
            let Some(label) = call.args.first().and_then(|a| a.value.as_str()) else {
                continue;
            };
            if label == RULES_GO_LEGACY_PROTO_BZL_LABEL {
                config.proto_mode = ProtoMode::Legacy;
                break;
            }
            if label == RULES_GO_PROTO_DEF_BZL_LABEL {
                config.proto_mode = ProtoMode::Default;
                break;
            }
        }
        if config.proto_mode != self.proto_mode {
            tracing::debug!(
                "{}: inferred proto mode {}",
                file.path.display(),
                config.proto_mode
            );
        }
        config
    }
}

/// Check if `dir` is `root` or below it.
pub fn is_descending_dir(dir: &Path, root: &Path) -> bool {
    match pathdiff::diff_paths(dir, root) {
        Some(rel) => !rel.starts_with(".."),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_file::parse;

    #[test]
    fn test_defaults() {
        let config = Config::new("/repo");
        assert_eq!(config.default_build_file_name(), "BUILD.bazel");
        assert!(config.is_valid_build_file_name("BUILD"));
        assert!(!config.is_valid_build_file_name("BUCK"));
        assert_eq!(config.dep_mode, DependencyMode::External);
        assert_eq!(config.proto_mode, ProtoMode::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_build_tags() {
        let mut config = Config::new("/repo");
        config.set_build_tags("foo,bar").unwrap();
        config.preprocess_tags();
        let tags: Vec<_> = config.generic_tags.iter().collect();
        assert_eq!(tags, vec!["bar", "cgo", "foo", "gc"]);

        let err = config.set_build_tags("foo,!bar").unwrap_err();
        assert!(matches!(err, ConfigError::NegatedTag(ref t) if t == "!bar"));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("vendored".parse::<DependencyMode>().unwrap(), DependencyMode::Vendored);
        assert_eq!("flat".parse::<StructureMode>().unwrap(), StructureMode::Flat);
        assert_eq!("legacy".parse::<ProtoMode>().unwrap(), ProtoMode::Legacy);

        let err = "vendor".parse::<DependencyMode>().unwrap_err();
        assert_eq!(err.to_string(), "unrecognized dependency mode: \"vendor\"");
    }

    #[test]
    fn test_validate_rejects_outside_dirs() {
        let mut config = Config::new("/repo");
        config.dirs = vec![PathBuf::from("/repo/a"), PathBuf::from("/elsewhere")];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DirOutsideRoot { .. })
        ));

        config.dirs = vec![PathBuf::from("/repo")];
        config.valid_build_file_names.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoBuildFileNames)));
    }

    #[test]
    fn test_apply_directives_does_not_touch_parent() {
        let parent = Config::new("/repo");
        let child = parent.apply_directives(&[Directive::new("proto", "legacy")]);
        assert_eq!(child.proto_mode, ProtoMode::Legacy);
        assert!(child.proto_mode_explicit);
        assert_eq!(parent.proto_mode, ProtoMode::Default);

        let unchanged = parent.apply_directives(&[Directive::new("proto", "bogus")]);
        assert_eq!(unchanged.proto_mode, ProtoMode::Default);
    }

    #[test]
    fn test_infer_proto_mode() {
        let legacy = parse(
            Path::new("BUILD"),
            r#"load("@io_bazel_rules_go//proto:go_proto_library.bzl", "go_proto_library")"#,
        )
        .unwrap();
        let config = Config::new("/repo");
        assert_eq!(
            config.infer_proto_mode(Some(&legacy)).proto_mode,
            ProtoMode::Legacy
        );
        assert_eq!(config.infer_proto_mode(None).proto_mode, ProtoMode::Default);

        let explicit = config.apply_directives(&[Directive::new("proto", "disable")]);
        assert_eq!(
            explicit.infer_proto_mode(Some(&legacy)).proto_mode,
            ProtoMode::Disable
        );
    }
}
