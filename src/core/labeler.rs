//! Canonical names for generated targets.

use crate::core::config::{
    Config, StructureMode, DEFAULT_LIB_NAME, DEFAULT_TEST_NAME, DEFAULT_XTEST_NAME,
};
use crate::core::label::{base_name, Label};

/// Maps package paths to the labels of the rules generated for them.
///
/// Every method is a pure function of the structure mode, the prefix and its
/// arguments, so the same path always yields the same label.
#[derive(Debug, Clone)]
pub struct Labeler {
    mode: StructureMode,
    prefix: String,
}

impl Labeler {
    pub fn new(config: &Config) -> Self {
        Labeler {
            mode: config.structure_mode,
            prefix: config.prefix.clone(),
        }
    }

    pub fn with_mode(mode: StructureMode, prefix: impl Into<String>) -> Self {
        Labeler {
            mode,
            prefix: prefix.into(),
        }
    }

    /// Label of the library built from the package at `rel`.
    pub fn library_label(&self, rel: &str) -> Label {
        match self.mode {
            StructureMode::Hierarchical => Label::local(rel, DEFAULT_LIB_NAME),
            StructureMode::Flat => Label::local("", self.rel_or_root(rel)),
        }
    }

    /// Label of the binary built from a `main` package at `rel`.
    pub fn binary_label(&self, rel: &str) -> Label {
        match self.mode {
            StructureMode::Hierarchical => {
                let name = if rel.is_empty() {
                    self.root_name()
                } else {
                    base_name(rel).to_string()
                };
                Label::local(rel, name)
            }
            StructureMode::Flat => Label::local("", format!("{}_cmd", self.rel_or_root(rel))),
        }
    }

    /// Label of the internal (`xtest == false`) or external test.
    pub fn test_label(&self, rel: &str, xtest: bool) -> Label {
        match self.mode {
            StructureMode::Hierarchical => {
                let name = if xtest {
                    DEFAULT_XTEST_NAME
                } else {
                    DEFAULT_TEST_NAME
                };
                Label::local(rel, name)
            }
            StructureMode::Flat => {
                let suffix = if xtest { "_xtest" } else { "_test" };
                Label::local("", format!("{}{}", self.rel_or_root(rel), suffix))
            }
        }
    }

    /// Label of the `proto_library` named after `name`.
    pub fn proto_label(&self, rel: &str, name: &str) -> Label {
        self.proto_family_label(rel, &format!("{}_proto", name))
    }

    /// Label of the `go_proto_library` compiled from the protos named `name`.
    pub fn go_proto_label(&self, rel: &str, name: &str) -> Label {
        self.proto_family_label(rel, &format!("{}_go_proto", name))
    }

    fn proto_family_label(&self, rel: &str, name: &str) -> Label {
        match self.mode {
            StructureMode::Hierarchical => Label::local(rel, name),
            StructureMode::Flat if rel.is_empty() => Label::local("", name),
            StructureMode::Flat => Label::local("", format!("{}/{}", rel, name)),
        }
    }

    /// Name of the package at `rel` used for its proto rules: the last path
    /// element, or the root name at the repository root.
    pub fn rel_base_name(&self, rel: &str) -> String {
        if rel.is_empty() {
            self.root_name()
        } else {
            base_name(rel).to_string()
        }
    }

    fn rel_or_root(&self, rel: &str) -> String {
        if rel.is_empty() {
            self.root_name()
        } else {
            rel.to_string()
        }
    }

    /// Name used for the repository root: the last prefix element, or
    /// `root` when there is no prefix.
    fn root_name(&self) -> String {
        match base_name(&self.prefix) {
            "" => "root".to_string(),
            name => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeler_go() {
        let cases = [
            (
                "",
                StructureMode::Hierarchical,
                [
                    "//:go_default_library",
                    "//:root",
                    "//:go_default_test",
                    "//:go_default_xtest",
                ],
            ),
            (
                "sub",
                StructureMode::Hierarchical,
                [
                    "//sub:go_default_library",
                    "//sub",
                    "//sub:go_default_test",
                    "//sub:go_default_xtest",
                ],
            ),
            (
                "",
                StructureMode::Flat,
                ["//:root", "//:root_cmd", "//:root_test", "//:root_xtest"],
            ),
            (
                "sub",
                StructureMode::Flat,
                ["//:sub", "//:sub_cmd", "//:sub_test", "//:sub_xtest"],
            ),
            (
                "sub/deep",
                StructureMode::Flat,
                [
                    "//:sub/deep",
                    "//:sub/deep_cmd",
                    "//:sub/deep_test",
                    "//:sub/deep_xtest",
                ],
            ),
        ];

        for (rel, mode, [lib, bin, test, xtest]) in cases {
            let l = Labeler::with_mode(mode, "");
            assert_eq!(l.library_label(rel).to_string(), lib, "library in {:?}", rel);
            assert_eq!(l.binary_label(rel).to_string(), bin, "binary in {:?}", rel);
            assert_eq!(l.test_label(rel, false).to_string(), test, "test in {:?}", rel);
            assert_eq!(l.test_label(rel, true).to_string(), xtest, "xtest in {:?}", rel);
        }
    }

    #[test]
    fn test_labeler_proto() {
        let cases = [
            ("", StructureMode::Hierarchical, "//:foo_proto", "//:foo_go_proto"),
            ("sub", StructureMode::Hierarchical, "//sub:foo_proto", "//sub:foo_go_proto"),
            ("", StructureMode::Flat, "//:foo_proto", "//:foo_go_proto"),
            ("sub", StructureMode::Flat, "//:sub/foo_proto", "//:sub/foo_go_proto"),
        ];
        for (rel, mode, proto, go_proto) in cases {
            let l = Labeler::with_mode(mode, "");
            assert_eq!(l.proto_label(rel, "foo").to_string(), proto);
            assert_eq!(l.go_proto_label(rel, "foo").to_string(), go_proto);
        }
    }

    #[test]
    fn test_root_name_from_prefix() {
        let l = Labeler::with_mode(StructureMode::Hierarchical, "example.com/repo");
        assert_eq!(l.binary_label("").to_string(), "//:repo");

        assert_eq!(l.rel_base_name(""), "repo");
        assert_eq!(l.rel_base_name("a/b"), "b");
        assert_eq!(Labeler::with_mode(StructureMode::Flat, "").rel_base_name(""), "root");

        let flat = Labeler::with_mode(StructureMode::Flat, "example.com/repo");
        assert_eq!(flat.library_label("").to_string(), "//:repo");
        assert_eq!(flat.binary_label("").to_string(), "//:repo_cmd");
    }

    #[test]
    fn test_labeler_is_pure() {
        let l = Labeler::with_mode(StructureMode::Hierarchical, "example.com/repo");
        for rel in ["", "a", "a/b/c"] {
            assert_eq!(l.library_label(rel), l.library_label(rel));
            assert_eq!(l.binary_label(rel), l.binary_label(rel));
        }
    }
}
