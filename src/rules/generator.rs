//! Generation of rules from a package.

use std::collections::BTreeMap;

use crate::build_file::rule::new_rule;
use crate::build_file::{Arg, CallExpr, Expr};
use crate::core::config::{
    Config, ProtoMode, StructureMode, DEFAULT_PROTOS_NAME, IMPORTS_ATTR, PLATFORM_LABEL_PREFIX,
    TESTDATA_DIR,
};
use crate::core::label::Label;
use crate::core::labeler::Labeler;
use crate::core::package::{GoTarget, Package, PlatformStrings};

const PUBLIC: &str = "//visibility:public";
const PRIVATE: &str = "//visibility:private";

/// Turns packages into rules for the build file at `build_rel`.
#[derive(Debug)]
pub struct Generator<'a> {
    config: &'a Config,
    labeler: &'a Labeler,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a Config, labeler: &'a Labeler) -> Self {
        Generator { config, labeler }
    }

    /// Generate the rules for a package.
    ///
    /// Returns the rules that have content, followed by `kind(name = ...)`
    /// stubs for the kinds the package doesn't need. The stubs name rules
    /// that may be deleted from an existing file. Both lists are in emission
    /// order: protos, library, binary, internal test, external test.
    pub fn generate_rules(&self, pkg: &Package) -> (Vec<CallExpr>, Vec<CallExpr>) {
        let mut candidates = Vec::new();

        let go_proto_name = self.generate_proto(pkg, &mut candidates);
        let lib_name = self.generate_lib(pkg, go_proto_name.as_deref(), &mut candidates);
        candidates.push(self.generate_bin(pkg, lib_name.as_deref()));
        candidates.push(self.generate_test(pkg, lib_name.as_deref(), false));
        candidates.push(self.generate_test(pkg, None, true));

        candidates.into_iter().partition(|rule| !is_empty_rule(rule))
    }

    /// Push the proto rules and return the name of the `go_proto_library`
    /// the library should embed.
    fn generate_proto(&self, pkg: &Package, out: &mut Vec<CallExpr>) -> Option<String> {
        let name = self.labeler.rel_base_name(&pkg.rel);
        let proto_name = self.labeler.proto_label(&pkg.rel, &name).name;
        let go_proto_name = self.labeler.go_proto_label(&pkg.rel, &name).name;

        match self.config.proto_mode {
            // Existing proto rules are likely hand-written.
            ProtoMode::Disable => None,

            ProtoMode::Legacy => {
                let mut filegroup = new_rule("filegroup", DEFAULT_PROTOS_NAME);
                if pkg.proto.has_pb_go && !pkg.proto.sources.is_empty() {
                    filegroup.set_attr("srcs", Expr::string_list(self.sorted_srcs(pkg, &pkg.proto.sources)));
                    filegroup.set_attr("visibility", Expr::string_list([PUBLIC]));
                }
                out.push(filegroup);
                None
            }

            ProtoMode::Default if pkg.proto.sources.is_empty() => {
                out.push(new_rule("filegroup", DEFAULT_PROTOS_NAME));
                out.push(new_rule("proto_library", &proto_name));
                out.push(new_rule("go_proto_library", &go_proto_name));
                out.push(new_rule("go_grpc_library", &go_proto_name));
                None
            }

            ProtoMode::Default => {
                out.push(new_rule("filegroup", DEFAULT_PROTOS_NAME));

                let mut proto = new_rule("proto_library", &proto_name);
                proto.set_attr("srcs", Expr::string_list(self.sorted_srcs(pkg, &pkg.proto.sources)));
                set_imports(&mut proto, sorted(&pkg.proto.imports).map(Expr::string_list));
                proto.set_attr("visibility", Expr::string_list([PUBLIC]));
                out.push(proto);

                let (kind, stub) = if pkg.proto.has_services {
                    ("go_grpc_library", "go_proto_library")
                } else {
                    ("go_proto_library", "go_grpc_library")
                };
                let mut go_proto = new_rule(kind, &go_proto_name);
                go_proto.set_attr("proto", Expr::string(local_ref(&proto_name)));
                go_proto.set_attr("importpath", Expr::string(self.import_path(&pkg.rel)));
                set_imports(&mut go_proto, sorted(&pkg.proto.imports).map(Expr::string_list));
                go_proto.set_attr("visibility", Expr::string_list([PUBLIC]));
                out.push(go_proto);
                out.push(new_rule(stub, &go_proto_name));

                Some(go_proto_name)
            }
        }
    }

    fn generate_lib(
        &self,
        pkg: &Package,
        go_proto_name: Option<&str>,
        out: &mut Vec<CallExpr>,
    ) -> Option<String> {
        let name = self.labeler.library_label(&pkg.rel).name;
        if !pkg.library.sources.has_go() && go_proto_name.is_none() {
            out.push(new_rule("go_library", &name));
            return None;
        }

        // A command's library only exists to be embedded in its binary.
        let visibility = if pkg.is_command() {
            PRIVATE.to_string()
        } else {
            internal_visibility(&pkg.rel, PUBLIC)
        };
        let mut rule = self.common_rule("go_library", &name, pkg, &pkg.library);
        if let Some(go_proto) = go_proto_name {
            rule.set_attr("library", Expr::string(local_ref(go_proto)));
        }
        set_imports(&mut rule, platform_expr(&sorted_platform(&pkg.library.imports)));
        rule.set_attr("visibility", Expr::string_list([visibility]));
        out.push(rule);
        Some(name)
    }

    fn generate_bin(&self, pkg: &Package, lib_name: Option<&str>) -> CallExpr {
        let name = self.labeler.binary_label(&pkg.rel).name;
        let mut rule = new_rule("go_binary", &name);
        let Some(lib) = lib_name.filter(|_| pkg.is_command()) else {
            return rule;
        };
        rule.set_attr("library", Expr::string(local_ref(lib)));
        rule.set_attr(
            "visibility",
            Expr::string_list([internal_visibility(&pkg.rel, PUBLIC)]),
        );
        rule
    }

    fn generate_test(&self, pkg: &Package, lib_name: Option<&str>, xtest: bool) -> CallExpr {
        let name = self.labeler.test_label(&pkg.rel, xtest).name;
        let target = if xtest { &pkg.xtest } else { &pkg.test };
        if !target.sources.has_go() {
            return new_rule("go_test", &name);
        }

        let mut rule = self.common_rule("go_test", &name, pkg, target);
        if let Some(lib) = lib_name {
            rule.set_attr("library", Expr::string(local_ref(lib)));
        }
        if pkg.has_testdata {
            let pattern = self.source_path(pkg, &format!("{}/**", TESTDATA_DIR));
            rule.set_attr(
                "data",
                Expr::call("glob", vec![Arg::positional(Expr::string_list([pattern]))]),
            );
        }
        set_imports(&mut rule, platform_expr(&sorted_platform(&target.imports)));
        rule
    }

    /// A rule with the attributes every Go rule shares.
    fn common_rule(&self, kind: &str, name: &str, pkg: &Package, target: &GoTarget) -> CallExpr {
        let mut rule = new_rule(kind, name);
        let srcs = sorted_platform(&target.sources.map(|s| self.source_path(pkg, s)));
        if let Some(srcs) = platform_expr(&srcs) {
            rule.set_attr("srcs", srcs);
        }
        if target.cgo {
            rule.set_attr("cgo", Expr::ident("True"));
        }
        if let Some(copts) = platform_expr(&target.copts) {
            rule.set_attr("copts", copts);
        }
        if let Some(clinkopts) = platform_expr(&target.clinkopts) {
            rule.set_attr("clinkopts", clinkopts);
        }
        rule
    }

    fn sorted_srcs(&self, pkg: &Package, srcs: &[String]) -> Vec<String> {
        let paths: Vec<String> = srcs.iter().map(|s| self.source_path(pkg, s)).collect();
        sorted(&paths).unwrap_or_default()
    }

    /// Path of a package file relative to the build file. In flat mode all
    /// rules live at the root, so paths carry the package directory.
    fn source_path(&self, pkg: &Package, name: &str) -> String {
        match self.config.structure_mode {
            StructureMode::Flat if !pkg.rel.is_empty() => format!("{}/{}", pkg.rel, name),
            _ => name.to_string(),
        }
    }

    fn import_path(&self, rel: &str) -> String {
        match (self.config.prefix.as_str(), rel) {
            (prefix, "") => prefix.to_string(),
            ("", rel) => rel.to_string(),
            (prefix, rel) => format!("{}/{}", prefix, rel),
        }
    }
}

/// A rule is empty when `name` is its only attribute.
pub fn is_empty_rule(rule: &CallExpr) -> bool {
    rule.args.iter().all(|a| a.name.as_deref() == Some("name"))
}

/// Restrict the visibility of packages below an `internal` directory to the
/// subtree rooted at its parent.
fn internal_visibility(rel: &str, default: &str) -> String {
    if let Some(i) = rel.rfind("/internal/") {
        return format!("//{}:__subpackages__", &rel[..i]);
    }
    if let Some(parent) = rel.strip_suffix("/internal") {
        return format!("//{}:__subpackages__", parent);
    }
    if rel == "internal" || rel.starts_with("internal/") {
        return "//:__subpackages__".to_string();
    }
    default.to_string()
}

fn local_ref(name: &str) -> String {
    Label::relative_to_package(name).to_string()
}

fn set_imports(rule: &mut CallExpr, imports: Option<Expr>) {
    if let Some(imports) = imports {
        rule.set_attr(IMPORTS_ATTR, imports);
    }
}

fn sorted(list: &[String]) -> Option<Vec<String>> {
    if list.is_empty() {
        return None;
    }
    let mut list = list.to_vec();
    list.sort();
    list.dedup();
    Some(list)
}

fn sorted_platform(strings: &PlatformStrings) -> PlatformStrings {
    let sort_table = |table: &BTreeMap<String, Vec<String>>| {
        table
            .iter()
            .filter_map(|(k, v)| sorted(v).map(|v| (k.clone(), v)))
            .collect()
    };
    PlatformStrings {
        generic: sorted(&strings.generic).unwrap_or_default(),
        os: sort_table(&strings.os),
        arch: sort_table(&strings.arch),
        platform: sort_table(&strings.platform),
    }
}

/// Render platform strings as `[...] + select({...}) + ...`, with one
/// `select` per non-empty table. Returns `None` when there are no strings.
pub fn platform_expr(strings: &PlatformStrings) -> Option<Expr> {
    let mut parts = Vec::new();
    if !strings.generic.is_empty() {
        parts.push(Expr::string_list(strings.generic.iter().cloned()));
    }
    for table in [&strings.os, &strings.arch, &strings.platform] {
        if table.is_empty() {
            continue;
        }
        let mut entries: Vec<(Expr, Expr)> = table
            .iter()
            .map(|(key, values)| {
                (
                    Expr::string(format!("{}{}", PLATFORM_LABEL_PREFIX, key)),
                    Expr::string_list(values.iter().cloned()),
                )
            })
            .collect();
        entries.push((Expr::string("//conditions:default"), Expr::list(Vec::new())));
        parts.push(Expr::call("select", vec![Arg::positional(Expr::dict(entries))]));
    }
    parts.into_iter().reduce(Expr::concat)
}
