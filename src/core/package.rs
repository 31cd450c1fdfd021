//! Package descriptors produced by the package builder.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::config::{BuildTags, Config, ProtoMode};
use crate::packages::constraint::{
    check_constraints, is_os_arch_specific, Constraint, KNOWN_ARCH, KNOWN_OS, KNOWN_PLATFORMS,
};
use crate::packages::fileinfo::{FileCategory, FileInfo};
use crate::packages::PackageError;

/// A buildable package found in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Declared package name.
    pub name: String,

    /// Absolute directory of the package.
    pub dir: PathBuf,

    /// Slash-separated path of `dir` relative to the repository root.
    pub rel: String,

    pub library: GoTarget,
    pub test: GoTarget,
    pub xtest: GoTarget,
    pub proto: ProtoTarget,

    /// The directory has a `testdata` subdirectory that is not a package.
    pub has_testdata: bool,
}

/// Sources and options of one Go rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoTarget {
    pub sources: PlatformStrings,
    pub imports: PlatformStrings,
    pub copts: PlatformStrings,
    pub clinkopts: PlatformStrings,
    pub cgo: bool,
}

/// Sources of the `proto_library` rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoTarget {
    pub sources: Vec<String>,
    pub imports: Vec<String>,
    pub has_services: bool,

    /// The directory has `.pb.go` files that were not excluded.
    pub has_pb_go: bool,
}

/// Strings that apply on every platform or only on some.
///
/// Platform-specific entries are keyed by OS, by architecture, or by
/// `os_arch` for files restricted in both dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformStrings {
    pub generic: Vec<String>,
    pub os: BTreeMap<String, Vec<String>>,
    pub arch: BTreeMap<String, Vec<String>>,
    pub platform: BTreeMap<String, Vec<String>>,
}

/// Where a file's strings land in a [`PlatformStrings`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    Generic,
    Os(Vec<&'static str>),
    Arch(Vec<&'static str>),
    Platform(Vec<String>),
    Nowhere,
}

impl Package {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, rel: impl Into<String>) -> Self {
        Package {
            name: name.into(),
            dir: dir.into(),
            rel: rel.into(),
            library: GoTarget::default(),
            test: GoTarget::default(),
            xtest: GoTarget::default(),
            proto: ProtoTarget::default(),
            has_testdata: false,
        }
    }

    /// Add a file to the target it belongs to. `cgo` reports whether any
    /// file in the package imports `C`; C and C++ sources are dropped
    /// without it.
    pub fn add_file(
        &mut self,
        config: &Config,
        info: &FileInfo,
        cgo: bool,
    ) -> Result<(), PackageError> {
        match info.category {
            FileCategory::Unknown => return Ok(()),
            category if category.needs_cgo() && !cgo => return Ok(()),
            FileCategory::Proto if config.proto_mode == ProtoMode::Disable => return Ok(()),
            _ => {}
        }

        if info.is_test {
            if info.is_cgo {
                return Err(PackageError::CgoInTest {
                    path: info.path.clone(),
                });
            }
            let target = if info.is_xtest {
                &mut self.xtest
            } else {
                &mut self.test
            };
            target.add_file(&config.generic_tags, info);
        } else if info.category == FileCategory::Proto {
            self.proto.add_file(info);
        } else {
            self.library.add_file(&config.generic_tags, info);
        }

        if info.is_pb_go() {
            self.proto.has_pb_go = true;
        }
        Ok(())
    }

    /// Check whether the package has anything to build.
    pub fn is_buildable(&self, config: &Config) -> bool {
        self.library.sources.has_go()
            || self.test.sources.has_go()
            || self.xtest.sources.has_go()
            || (config.proto_mode == ProtoMode::Default && !self.proto.sources.is_empty())
    }

    /// A `main` package builds a binary.
    pub fn is_command(&self) -> bool {
        self.name == "main"
    }

    /// A representative file for messages about the package.
    pub fn first_source_file(&self) -> Option<&str> {
        [&self.library, &self.test, &self.xtest]
            .into_iter()
            .find_map(|t| t.sources.first_go_file())
            .or_else(|| self.proto.sources.first().map(String::as_str))
    }
}

impl GoTarget {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn add_file(&mut self, tags: &BuildTags, info: &FileInfo) {
        let placement = Placement::for_file(tags, info, None);
        for tagged in &info.copts {
            let p = match &tagged.constraint {
                Some(c) => Placement::for_file(tags, info, Some(c)),
                None => placement.clone(),
            };
            self.copts.add(&p, &tagged.opts);
        }
        for tagged in &info.clinkopts {
            let p = match &tagged.constraint {
                Some(c) => Placement::for_file(tags, info, Some(c)),
                None => placement.clone(),
            };
            self.clinkopts.add(&p, &tagged.opts);
        }
        self.sources.add(&placement, std::slice::from_ref(&info.name));
        self.imports.add(&placement, &info.imports);
        if info.is_cgo {
            self.cgo = true;
        }
    }
}

impl ProtoTarget {
    fn add_file(&mut self, info: &FileInfo) {
        push_unique(&mut self.sources, &info.name);
        for imp in &info.imports {
            push_unique(&mut self.imports, imp);
        }
        self.has_services |= info.has_services;
    }
}

impl PlatformStrings {
    pub fn is_empty(&self) -> bool {
        self.generic.is_empty()
            && self.os.is_empty()
            && self.arch.is_empty()
            && self.platform.is_empty()
    }

    /// Check for `.go` files on any platform.
    pub fn has_go(&self) -> bool {
        self.first_go_file().is_some()
    }

    pub fn first_go_file(&self) -> Option<&str> {
        self.iter().find(|s| s.ends_with(".go"))
    }

    /// Every string, generic first, then per OS, architecture and platform.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.generic
            .iter()
            .chain(self.os.values().flatten())
            .chain(self.arch.values().flatten())
            .chain(self.platform.values().flatten())
            .map(String::as_str)
    }

    pub fn add_generic(&mut self, s: &str) {
        push_unique(&mut self.generic, s);
    }

    pub fn add_os(&mut self, os: &str, s: &str) {
        push_unique(self.os.entry(os.to_string()).or_default(), s);
    }

    pub fn add_arch(&mut self, arch: &str, s: &str) {
        push_unique(self.arch.entry(arch.to_string()).or_default(), s);
    }

    /// Apply `f` to every string, keeping the platform structure.
    pub fn map(&self, f: impl Fn(&str) -> String) -> PlatformStrings {
        let map_list = |list: &Vec<String>| list.iter().map(|s| f(s)).collect::<Vec<_>>();
        let map_table = |table: &BTreeMap<String, Vec<String>>| {
            table
                .iter()
                .map(|(k, v)| (k.clone(), map_list(v)))
                .collect::<BTreeMap<_, _>>()
        };
        PlatformStrings {
            generic: map_list(&self.generic),
            os: map_table(&self.os),
            arch: map_table(&self.arch),
            platform: map_table(&self.platform),
        }
    }

    fn add(&mut self, placement: &Placement, values: &[String]) {
        for s in values {
            match placement {
                Placement::Generic => self.add_generic(s),
                Placement::Os(list) => list.iter().for_each(|os| self.add_os(os, s)),
                Placement::Arch(list) => list.iter().for_each(|arch| self.add_arch(arch, s)),
                Placement::Platform(list) => {
                    for key in list {
                        push_unique(self.platform.entry(key.clone()).or_default(), s);
                    }
                }
                Placement::Nowhere => {}
            }
        }
    }
}

impl Placement {
    /// Decide where a file's strings go. `extra` is the constraint of a
    /// `#cgo` line, checked together with the file's own constraints.
    fn for_file(tags: &BuildTags, info: &FileInfo, extra: Option<&Constraint>) -> Placement {
        let mut constraints = info.constraint_refs();
        constraints.extend(extra);
        let check = |os: &str, arch: &str| {
            check_constraints(tags, os, arch, &info.suffix, &constraints)
        };

        let placement = match is_os_arch_specific(&info.suffix, &constraints) {
            (false, false) => {
                if check("", "") {
                    Placement::Generic
                } else {
                    Placement::Nowhere
                }
            }
            (true, false) => Placement::Os(
                KNOWN_OS.iter().copied().filter(|os| check(*os, "")).collect(),
            ),
            (false, true) => Placement::Arch(
                KNOWN_ARCH
                    .iter()
                    .copied()
                    .filter(|arch| check("", *arch))
                    .collect(),
            ),
            (true, true) => Placement::Platform(
                KNOWN_PLATFORMS
                    .iter()
                    .filter(|&&(os, arch)| check(os, arch))
                    .map(|&(os, arch)| format!("{}_{}", os, arch))
                    .collect(),
            ),
        };
        if placement == Placement::Nowhere {
            tracing::debug!("{}: excluded by build constraints", info.path.display());
        }
        placement
    }
}

fn push_unique(list: &mut Vec<String>, s: &str) {
    if !list.iter().any(|x| x == s) {
        list.push(s.to_string());
    }
}
