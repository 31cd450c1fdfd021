//! Depth-first traversal of the repository.

use std::collections::HashSet;
use std::path::Path;

use crate::build_file::File;
use crate::core::config::{Config, DependencyMode, ProtoMode, TESTDATA_DIR};
use crate::core::directive::{excluded_names, parse_directives};
use crate::core::package::Package;
use crate::packages::builder::{build_package, DirContents};
use crate::packages::language::Language;
use crate::util::fs::{read_dir_sorted, relative_slash_path};

/// What the walker found in one directory.
#[derive(Debug)]
pub struct Visit {
    /// Slash-separated path from the repository root; empty for the root.
    pub rel: String,

    /// Configuration for the directory, including its directives.
    pub config: Config,

    /// The package to generate rules for. `None` for directories without
    /// buildable code, directories outside the update set, and directories
    /// where errors were found.
    pub pkg: Option<Package>,

    /// The existing build file, if any.
    pub file: Option<File>,

    /// The directory is one of `config.dirs` or below one.
    pub is_update_dir: bool,
}

/// Walk the repository from its root, calling `callback` for each directory
/// after its subdirectories.
///
/// Every directory on the path to an update directory is visited so that
/// directives in ancestor build files apply. Subtrees outside the update
/// set are not entered.
pub fn walk<F>(config: &Config, lang: &dyn Language, callback: F)
where
    F: FnMut(Visit),
{
    let update_rels = config
        .dirs
        .iter()
        .map(|dir| relative_slash_path(&config.repo_root, dir))
        .collect();
    let mut walker = Walker {
        lang,
        update_rels,
        callback,
    };
    let root = config.repo_root.clone();
    walker.visit(config, &root, "", false);
}

struct Walker<'a, F> {
    lang: &'a dyn Language,
    update_rels: Vec<String>,
    callback: F,
}

impl<F: FnMut(Visit)> Walker<'_, F> {
    /// Visit a directory. Returns whether it or any subdirectory holds a
    /// build file or a package.
    fn visit(&mut self, parent: &Config, dir: &Path, rel: &str, is_update_dir: bool) -> bool {
        let is_update_dir = is_update_dir || self.is_update_rel(rel);

        let entries = match read_dir_sorted(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("{:#}", e);
                (self.callback)(Visit {
                    rel: rel.to_string(),
                    config: parent.clone(),
                    pkg: None,
                    file: None,
                    is_update_dir,
                });
                return false;
            }
        };

        // Existing build file.
        let mut file: Option<File> = None;
        let mut have_error = false;
        for name in &parent.valid_build_file_names {
            let Some(entry) = entries.iter().find(|e| &e.name == name && !e.is_dir) else {
                continue;
            };
            if let Some(old) = &file {
                tracing::warn!(
                    "in directory {}, multiple build files are present: {}, {}",
                    dir.display(),
                    old.path.file_name().unwrap_or_default().to_string_lossy(),
                    entry.name
                );
                have_error = true;
                continue;
            }
            match File::load(&dir.join(&entry.name)) {
                Ok(loaded) => file = Some(loaded),
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    have_error = true;
                }
            }
        }

        let directives = file.as_ref().map(parse_directives).unwrap_or_default();
        let config = parent
            .apply_directives(&directives)
            .infer_proto_mode(file.as_ref());

        let mut excluded: HashSet<String> =
            excluded_names(&directives).map(str::to_string).collect();
        if config.proto_mode == ProtoMode::Default {
            let pb_go: Vec<String> = entries
                .iter()
                .filter(|e| !excluded.contains(&e.name))
                .filter_map(|e| e.name.strip_suffix(".proto"))
                .map(|stem| format!("{}.pb.go", stem))
                .collect();
            excluded.extend(pb_go);
        }

        let mut contents = DirContents::default();
        let mut subdirs = Vec::new();
        for entry in &entries {
            let name = entry.name.as_str();
            if name.starts_with('.') || name.starts_with('_') || excluded.contains(name) {
                continue;
            }
            if entry.is_dir {
                if name == "vendor" && config.dep_mode == DependencyMode::External {
                    continue;
                }
                subdirs.push(name);
            } else if self.lang.is_source_file(name)
                || (name.ends_with(".proto") && config.proto_mode != ProtoMode::Disable)
            {
                contents.pkg_files.push(name.to_string());
            } else {
                contents.other_files.push(name.to_string());
            }
        }

        let mut subdir_has_package = false;
        for sub in subdirs {
            let sub_rel = if rel.is_empty() {
                sub.to_string()
            } else {
                format!("{}/{}", rel, sub)
            };
            if !is_update_dir && !self.leads_to_update(&sub_rel) {
                continue;
            }
            let has_package = self.visit(&config, &dir.join(sub), &sub_rel, is_update_dir);
            if sub == TESTDATA_DIR && !has_package {
                contents.has_testdata = true;
            }
            subdir_has_package |= has_package;
        }

        let has_package = subdir_has_package || file.is_some();
        if have_error || !is_update_dir {
            (self.callback)(Visit {
                rel: rel.to_string(),
                config,
                pkg: None,
                file,
                is_update_dir,
            });
            return has_package;
        }

        if let Some(old) = &file {
            contents.gen_files = generated_files(old, &excluded);
        }
        let pkg = match build_package(&config, self.lang, dir, rel, &contents) {
            Ok(pkg) => pkg,
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        };
        let has_package = has_package || pkg.is_some();
        (self.callback)(Visit {
            rel: rel.to_string(),
            config,
            pkg,
            file,
            is_update_dir,
        });
        has_package
    }

    fn is_update_rel(&self, rel: &str) -> bool {
        self.update_rels.iter().any(|u| is_same_or_below(rel, u))
    }

    /// Check whether an update directory is at or below `rel`.
    fn leads_to_update(&self, rel: &str) -> bool {
        self.update_rels
            .iter()
            .any(|u| is_same_or_below(rel, u) || is_same_or_below(u, rel))
    }
}

fn is_same_or_below(rel: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || rel == ancestor
        || rel
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Outputs of rules in an existing build file, minus excluded names.
fn generated_files(file: &File, excluded: &HashSet<String>) -> Vec<String> {
    let mut outs = Vec::new();
    for rule in file.rules() {
        for key in ["out", "outs"] {
            let Some(value) = rule.attr(key) else {
                continue;
            };
            if let Some(s) = value.as_str() {
                outs.push(s.to_string());
            } else if let Some(list) = value.as_list() {
                outs.extend(list.items.iter().filter_map(|e| e.as_str()).map(str::to_string));
            }
        }
    }
    outs.retain(|name| !excluded.contains(name));
    outs
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::core::package::{GoTarget, PlatformStrings, ProtoTarget};
    use crate::packages::language::Go;
    use crate::test_support::fixtures::write_files;
    use tempfile::TempDir;

    fn walk_packages(config: &Config) -> Vec<Package> {
        let mut pkgs = Vec::new();
        walk(config, &Go, |visit| {
            if let Some(pkg) = visit.pkg {
                pkgs.push(pkg);
            }
        });
        pkgs
    }

    fn check_files(files: &[(&str, &str)], prefix: &str, want: Vec<Package>) {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), files);
        let mut config = Config::new(tmp.path());
        config.prefix = prefix.to_string();
        check_walk(&config, want);
    }

    fn check_walk(config: &Config, want: Vec<Package>) {
        let want: Vec<Package> = want
            .into_iter()
            .map(|mut p| {
                p.dir = if p.rel.is_empty() {
                    config.repo_root.clone()
                } else {
                    config.repo_root.join(&p.rel)
                };
                p
            })
            .collect();
        assert_eq!(walk_packages(config), want);
    }

    fn generic(items: &[&str]) -> PlatformStrings {
        PlatformStrings {
            generic: items.iter().map(|s| s.to_string()).collect(),
            ..PlatformStrings::default()
        }
    }

    fn lib_package(name: &str, rel: &str, srcs: &[&str]) -> Package {
        let mut pkg = Package::new(name, PathBuf::new(), rel);
        pkg.library = GoTarget {
            sources: generic(srcs),
            ..GoTarget::default()
        };
        pkg
    }

    fn proto(srcs: &[&str], has_pb_go: bool) -> ProtoTarget {
        ProtoTarget {
            sources: srcs.iter().map(|s| s.to_string()).collect(),
            has_pb_go,
            ..ProtoTarget::default()
        }
    }

    #[test]
    fn test_walk_empty() {
        check_files(&[("a/foo.c", ""), ("b/BUILD", ""), ("c/", "")], "", vec![]);
    }

    #[test]
    fn test_walk_simple() {
        check_files(
            &[("lib.go", "package lib")],
            "",
            vec![lib_package("lib", "", &["lib.go"])],
        );
    }

    #[test]
    fn test_walk_nested() {
        check_files(
            &[
                ("a/foo.go", "package a"),
                ("b/c/bar.go", "package c"),
                ("b/d/baz.go", "package main"),
            ],
            "",
            vec![
                lib_package("a", "a", &["foo.go"]),
                lib_package("c", "b/c", &["bar.go"]),
                lib_package("main", "b/d", &["baz.go"]),
            ],
        );
    }

    #[test]
    fn test_proto_only() {
        let mut want = Package::new("a", PathBuf::new(), "a");
        want.proto = proto(&["a.proto"], false);
        check_files(&[("a/a.proto", "")], "", vec![want]);
    }

    #[test]
    fn test_multiple_packages_with_default() {
        check_files(
            &[("a/a.go", "package a"), ("a/b.go", "package b")],
            "",
            vec![lib_package("a", "a", &["a.go"])],
        );
    }

    #[test]
    fn test_multiple_packages_without_default() {
        check_files(&[("a/b.go", "package b"), ("a/c.go", "package c")], "", vec![]);
    }

    #[test]
    fn test_multiple_packages_with_proto_default() {
        let mut want = Package::new("a", PathBuf::new(), "a");
        want.proto = proto(&["a.proto"], false);
        check_files(
            &[
                ("a/a.proto", "syntax = \"proto2\";\npackage a;\n"),
                ("a/b.go", "package b"),
            ],
            "",
            vec![want],
        );
    }

    #[test]
    fn test_root_with_prefix() {
        check_files(
            &[("a.go", "package a"), ("b.go", "package b")],
            "github.com/a",
            vec![lib_package("a", "", &["a.go"])],
        );
    }

    #[test]
    fn test_root_without_prefix() {
        check_files(&[("a.go", "package a"), ("b.go", "package b")], "", vec![]);
    }

    #[test]
    fn test_testdata() {
        let mut raw = lib_package("raw", "raw", &["a.go"]);
        raw.has_testdata = true;
        check_files(
            &[
                ("raw/testdata/", ""),
                ("raw/a.go", "package raw"),
                ("with_build/testdata/BUILD", ""),
                ("with_build/a.go", "package with_build"),
                ("with_build_bazel/testdata/BUILD.bazel", ""),
                ("with_build_bazel/a.go", "package with_build_bazel"),
                ("with_build_nested/testdata/x/BUILD", ""),
                ("with_build_nested/a.go", "package with_build_nested"),
                ("with_go/testdata/a.go", "package testdata"),
                ("with_go/a.go", "package with_go"),
            ],
            "",
            vec![
                raw,
                lib_package("with_build", "with_build", &["a.go"]),
                lib_package("with_build_bazel", "with_build_bazel", &["a.go"]),
                lib_package("with_build_nested", "with_build_nested", &["a.go"]),
                lib_package("testdata", "with_go/testdata", &["a.go"]),
                lib_package("with_go", "with_go", &["a.go"]),
            ],
        );
    }

    const GEN_BUILD: &str = r#"
genrule(
    name = "from_genrule",
    outs = ["foo.go", "bar.go", "w.txt", "x.c", "y.s", "z.S"],
)

gen_other(
    name = "from_gen_other",
    out = "baz.go",
)
"#;

    #[test]
    fn test_generated() {
        let mut want = lib_package("foo", "gen", &["foo.go", "bar.go", "y.s", "baz.go"]);
        want.library.imports = generic(&["github.com/jr_hacker/stuff"]);
        check_files(
            &[
                ("gen/BUILD", GEN_BUILD),
                (
                    "gen/foo.go",
                    "package foo\n\nimport \"github.com/jr_hacker/stuff\"\n",
                ),
            ],
            "",
            vec![want],
        );
    }

    #[test]
    fn test_generated_cgo() {
        let mut want = lib_package(
            "foo",
            "gen",
            &["foo.go", "bar.go", "x.c", "y.s", "z.S", "baz.go"],
        );
        want.library.imports = generic(&["github.com/jr_hacker/stuff"]);
        want.library.cgo = true;
        check_files(
            &[
                ("gen/BUILD", GEN_BUILD),
                (
                    "gen/foo.go",
                    "package foo\n\nimport \"C\"\n\nimport \"github.com/jr_hacker/stuff\"\n",
                ),
            ],
            "",
            vec![want],
        );
    }

    #[test]
    fn test_excluded() {
        check_files(
            &[
                (
                    "exclude/BUILD",
                    r#"
# berth:exclude do.go

# berth:exclude not.go
# berth:exclude build.go

genrule(
    name = "gen_build",
    outs = ["build.go"],
)
"#,
                ),
                ("exclude/do.go", ""),
                ("exclude/not.go", ""),
                ("exclude/build.go", ""),
                ("exclude/real.go", "package exclude"),
            ],
            "",
            vec![lib_package("exclude", "exclude", &["real.go"])],
        );
    }

    #[test]
    fn test_excluded_pb_go() {
        let mut want = lib_package("exclude", "exclude", &["a.pb.go"]);
        want.proto = proto(&["b.proto"], true);
        check_files(
            &[
                ("exclude/BUILD", "# berth:exclude a.proto\n"),
                ("exclude/a.proto", "syntax = \"proto2\";\npackage exclude;"),
                ("exclude/a.pb.go", "package exclude"),
                ("exclude/b.proto", "syntax = \"proto2\";\npackage exclude;\n"),
                ("exclude/b.pb.go", "package exclude"),
            ],
            "",
            vec![want],
        );
    }

    #[test]
    fn test_legacy_protos() {
        let mut have_pbgo = lib_package("have_pbgo", "have_pbgo", &["a.pb.go"]);
        have_pbgo.proto = proto(&["a.proto"], true);
        let mut no_pbgo = lib_package("no_pbgo", "no_pbgo", &["other.go"]);
        no_pbgo.proto = proto(&["b.proto"], false);
        check_files(
            &[
                ("BUILD", "# berth:proto legacy"),
                ("have_pbgo/a.proto", "syntax = \"proto2\";\npackage have_pbgo;"),
                ("have_pbgo/a.pb.go", "package have_pbgo"),
                ("no_pbgo/b.proto", "syntax = \"proto2\";\npackage no_pbgo;"),
                ("no_pbgo/other.go", "package no_pbgo"),
                ("proto_only/c.proto", "syntax = \"proto2\";\npackage proto_only;"),
            ],
            "",
            vec![have_pbgo, no_pbgo],
        );
    }

    #[test]
    fn test_vendor() {
        let files = [
            ("vendor/foo/foo.go", "package foo"),
            ("x/vendor/bar/bar.go", "package bar"),
        ];
        check_files(&files, "", vec![]);

        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &files);
        let mut config = Config::new(tmp.path());
        config.dep_mode = DependencyMode::Vendored;
        check_walk(
            &config,
            vec![
                lib_package("foo", "vendor/foo", &["foo.go"]),
                lib_package("bar", "x/vendor/bar", &["bar.go"]),
            ],
        );
    }

    #[test]
    fn test_malformed_build_file() {
        check_files(&[("BUILD", "????"), ("foo.go", "package foo")], "", vec![]);
    }

    #[test]
    fn test_multiple_build_files() {
        check_files(
            &[("BUILD", ""), ("BUILD.bazel", ""), ("foo.go", "package foo")],
            "",
            vec![],
        );
    }

    #[test]
    fn test_malformed_go_file() {
        check_files(
            &[("a.go", "pakcage foo"), ("b.go", "package foo")],
            "",
            vec![lib_package("foo", "", &["b.go", "a.go"])],
        );
    }

    #[test]
    fn test_update_dirs_limit_packages() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[
                ("BUILD", "# berth:proto disable\n"),
                ("a/a.go", "package a"),
                ("a/a.proto", "package a;"),
                ("b/b.go", "package b"),
            ],
        );
        let mut config = Config::new(tmp.path());
        config.dirs = vec![tmp.path().join("a")];

        let mut visited = Vec::new();
        let mut pkgs = Vec::new();
        walk(&config, &Go, |visit| {
            visited.push((visit.rel.clone(), visit.is_update_dir));
            if let Some(pkg) = visit.pkg {
                pkgs.push(pkg);
            }
        });

        assert_eq!(
            visited,
            vec![("a".to_string(), true), (String::new(), false)]
        );
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].library.sources.generic, vec!["a.go"]);
        assert!(pkgs[0].proto.sources.is_empty());
    }
}
