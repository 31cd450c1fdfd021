//! Import resolution.
//!
//! Generated rules carry the raw import strings of their sources in the
//! private `_berth_imports` attribute. The [`Resolver`] rewrites that
//! attribute into `deps`, mapping each import to the label of the rule that
//! provides it. Imports inside the repository are named by the [`Labeler`];
//! everything else goes to a [`NonlocalResolver`] chosen by dependency mode.
//!
//! Resolution never fails a run. An import that can't be resolved is logged
//! and dropped from `deps`.

pub mod discovery;
pub mod errors;
pub mod external;
pub mod vendored;

pub use errors::ResolveError;
pub use external::ExternalResolver;
pub use vendored::VendoredResolver;

use std::collections::HashMap;
use std::fmt;

use anyhow::Result;

use crate::build_file::{CallExpr, DictExpr, Expr, ExprKind, KeyValue, ListExpr};
use crate::core::config::{
    Config, DependencyMode, IMPORTS_ATTR, RULES_GO_REPO_NAME, WELL_KNOWN_GO_PROTO_PKG,
    WELL_KNOWN_PROTO_REPO,
};
use crate::core::label::{base_name, Label};
use crate::core::labeler::Labeler;
use crate::packages::Language;

use self::discovery::GoGetDiscovery;

const WELL_KNOWN_PROTO_PREFIX: &str = "google/protobuf/";

const DEFAULT_CONDITION: &str = "//conditions:default";

/// Resolves imports outside the repository prefix.
///
/// Implementations must be idempotent within a run: the same import always
/// yields the same result.
pub trait NonlocalResolver: fmt::Debug {
    fn resolve(&mut self, imp: &str) -> Result<Label, ResolveError>;
}

/// How the imports of a rule kind are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportKind {
    Source,
    Proto,
    GoProto,
}

impl ImportKind {
    fn for_rule(kind: &str) -> Option<Self> {
        match kind {
            "proto_library" => Some(ImportKind::Proto),
            "go_proto_library" | "go_grpc_library" => Some(ImportKind::GoProto),
            "go_library" | "go_binary" | "go_test" => Some(ImportKind::Source),
            _ => None,
        }
    }
}

/// Maps imports to labels for one run.
#[derive(Debug)]
pub struct Resolver<'a> {
    labeler: Labeler,
    prefix: String,
    lang: &'a dyn Language,
    external: Box<dyn NonlocalResolver>,
    /// Results of nonlocal lookups, so each import is resolved once.
    cache: HashMap<String, Result<Label, ResolveError>>,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &Config, lang: &'a dyn Language, external: Box<dyn NonlocalResolver>) -> Self {
        Resolver {
            labeler: Labeler::new(config),
            prefix: config.prefix.clone(),
            lang,
            external,
            cache: HashMap::new(),
        }
    }

    /// Create a resolver whose nonlocal strategy follows the dependency mode.
    pub fn for_config(config: &Config, lang: &'a dyn Language) -> Result<Self> {
        let labeler = Labeler::new(config);
        let external: Box<dyn NonlocalResolver> = match config.dep_mode {
            DependencyMode::External => Box::new(ExternalResolver::new(
                labeler,
                &config.known_imports,
                Box::new(GoGetDiscovery::new()?),
            )),
            DependencyMode::Vendored => Box::new(VendoredResolver::new(labeler)),
        };
        Ok(Resolver::new(config, lang, external))
    }

    /// Replace the `_berth_imports` attribute of a generated rule with
    /// `deps`.
    ///
    /// `pkg_rel` is the package the rule was generated for and anchors
    /// relative imports. `build_rel` is the package of the build file the
    /// rule is written to; labels into it print as `:name`. Rules of other
    /// kinds, and rules without imports, are left alone.
    pub fn resolve_rule(&mut self, rule: &mut CallExpr, pkg_rel: &str, build_rel: &str) {
        let Some(kind) = ImportKind::for_rule(rule.kind()) else {
            return;
        };
        let Some(imports) = rule.attr(IMPORTS_ATTR).cloned() else {
            return;
        };

        let rule_name = rule.name().unwrap_or_default().to_string();
        let deps = map_expr_strings(&imports, &mut |imp| {
            let resolved = match kind {
                ImportKind::Source => self.resolve_go(imp, pkg_rel),
                ImportKind::Proto => self.resolve_proto(imp, pkg_rel),
                ImportKind::GoProto => self.resolve_go_proto(imp, pkg_rel),
            };
            match resolved {
                Ok(label) => Some(label.relative_from(build_rel).to_string()),
                Err(e) => {
                    if !e.is_silent() {
                        tracing::warn!("{}: {}", rule_name, e);
                    }
                    None
                }
            }
        });

        match deps {
            None => {
                rule.del_attr(IMPORTS_ATTR);
            }
            Some(deps) => {
                if let Some(arg) = rule.arg_mut(IMPORTS_ATTR) {
                    arg.name = Some("deps".to_string());
                    arg.value = deps;
                }
            }
        }
    }

    /// Resolve an import from a source file of the package at `pkg_rel`.
    pub fn resolve_go(&mut self, imp: &str, pkg_rel: &str) -> Result<Label, ResolveError> {
        let imp = if is_local_import(imp) {
            let clean = clean_path(&format!("{}/{}", pkg_rel, imp));
            if is_local_import(&clean) {
                return Err(ResolveError::EscapesRepository {
                    imp: imp.to_string(),
                    from: pkg_rel.to_string(),
                });
            }
            if self.prefix.is_empty() {
                return Ok(self.labeler.library_label(&clean));
            }
            join_path(&self.prefix, &clean)
        } else {
            imp.to_string()
        };

        if self.lang.is_standard_import(&imp) {
            return Err(ResolveError::StandardImport { imp });
        }
        if self.prefix.is_empty() {
            return self.resolve_nonlocal(&imp);
        }
        if imp == self.prefix {
            return Ok(self.labeler.library_label(""));
        }
        if let Some(rel) = imp
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            return Ok(self.labeler.library_label(rel));
        }
        self.resolve_nonlocal(&imp)
    }

    /// Resolve a `.proto` import to a `proto_library`.
    pub fn resolve_proto(&mut self, imp: &str, pkg_rel: &str) -> Result<Label, ResolveError> {
        let stem = proto_stem(imp)?;
        if is_well_known(stem) {
            return Ok(Label::new(
                WELL_KNOWN_PROTO_REPO,
                "",
                format!("{}_proto", base_name(stem)),
            ));
        }
        let rel = self.proto_rel(imp, pkg_rel);
        let name = self.labeler.rel_base_name(&rel);
        Ok(self.labeler.proto_label(&rel, &name))
    }

    /// Resolve a `.proto` import to the `go_proto_library` compiled from it.
    pub fn resolve_go_proto(&mut self, imp: &str, pkg_rel: &str) -> Result<Label, ResolveError> {
        let stem = proto_stem(imp)?;
        if is_well_known(stem) {
            return Ok(Label::new(
                RULES_GO_REPO_NAME,
                WELL_KNOWN_GO_PROTO_PKG,
                format!("{}_go_proto", base_name(stem)),
            ));
        }
        let rel = self.proto_rel(imp, pkg_rel);
        let name = self.labeler.rel_base_name(&rel);
        Ok(self.labeler.go_proto_label(&rel, &name))
    }

    fn resolve_nonlocal(&mut self, imp: &str) -> Result<Label, ResolveError> {
        if let Some(cached) = self.cache.get(imp) {
            return cached.clone();
        }
        let result = self.external.resolve(imp);
        self.cache.insert(imp.to_string(), result.clone());
        result
    }

    /// Package holding the protos of an import. Protos imported from a
    /// vendored package are looked up in the same vendor tree.
    fn proto_rel(&self, imp: &str, pkg_rel: &str) -> String {
        let rel = match imp.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };
        if pkg_rel == "vendor" || pkg_rel.starts_with("vendor/") {
            join_path("vendor", rel)
        } else {
            rel.to_string()
        }
    }
}

/// Apply `f` to every string in an imports expression.
///
/// Strings for which `f` returns `None` are dropped. Lists, dicts, `select`
/// calls and `+` concatenations are rebuilt around the mapped strings, and
/// collapse to `None` when nothing is left in them. A dict that only keeps
/// its `//conditions:default` entry counts as empty.
pub fn map_expr_strings(
    expr: &Expr,
    f: &mut dyn FnMut(&str) -> Option<String>,
) -> Option<Expr> {
    let kind = match &expr.kind {
        ExprKind::String(s) => ExprKind::String(f(s).filter(|s| !s.is_empty())?),

        ExprKind::List(list) => {
            let items: Vec<Expr> = list
                .items
                .iter()
                .filter_map(|item| map_expr_strings(item, f))
                .collect();
            if items.is_empty() && !list.items.is_empty() {
                return None;
            }
            ExprKind::List(ListExpr {
                items,
                trailing: list.trailing.clone(),
            })
        }

        ExprKind::Dict(dict) => {
            let mut entries = Vec::new();
            let mut is_empty = true;
            for entry in &dict.entries {
                let Some(value) = map_expr_strings(&entry.value, f) else {
                    continue;
                };
                if entry.key.as_str() != Some(DEFAULT_CONDITION) {
                    is_empty = false;
                }
                entries.push(KeyValue {
                    key: entry.key.clone(),
                    value,
                });
            }
            if is_empty {
                return None;
            }
            ExprKind::Dict(DictExpr {
                entries,
                trailing: dict.trailing.clone(),
            })
        }

        ExprKind::Call(call) if call.func == "select" && call.args.len() == 1 => {
            let arg = map_expr_strings(&call.args[0].value, f)?;
            let mut call = call.clone();
            call.args[0].value = arg;
            ExprKind::Call(call)
        }

        ExprKind::Concat(lhs, rhs) => {
            let lhs = map_expr_strings(lhs, f);
            let rhs = map_expr_strings(rhs, f);
            match (lhs, rhs) {
                (None, None) => return None,
                (Some(x), None) | (None, Some(x)) => return Some(x),
                (Some(lhs), Some(rhs)) => ExprKind::Concat(Box::new(lhs), Box::new(rhs)),
            }
        }

        _ => {
            tracing::warn!("unexpected expression in imports: {:?}", expr.kind);
            return Some(expr.clone());
        }
    };
    Some(Expr {
        kind,
        comments: expr.comments.clone(),
    })
}

fn proto_stem(imp: &str) -> Result<&str, ResolveError> {
    imp.strip_suffix(".proto").ok_or_else(|| ResolveError::NotProto {
        imp: imp.to_string(),
    })
}

/// Check for a proto shipped with protobuf itself, e.g.
/// `google/protobuf/any.proto`.
fn is_well_known(stem: &str) -> bool {
    stem.strip_prefix(WELL_KNOWN_PROTO_PREFIX)
        .is_some_and(|rest| !rest.contains('/'))
}

/// Check for an import path relative to the importing package.
fn is_local_import(imp: &str) -> bool {
    imp == "." || imp == ".." || imp.starts_with("./") || imp.starts_with("../")
}

/// Lexically normalize a slash-separated relative path.
fn clean_path(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ => out.push(".."),
            },
            s => out.push(s),
        }
    }
    if out.is_empty() {
        ".".to_string()
    } else {
        out.join("/")
    }
}

fn join_path(base: &str, rel: &str) -> String {
    match (base.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, rel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_file::{parse, rule::new_rule, Arg};
    use crate::core::config::StructureMode;
    use crate::packages::Go;
    use crate::test_support::MockDiscovery;
    use std::path::Path;

    fn test_resolver(prefix: &str, mode: DependencyMode) -> Resolver<'static> {
        let mut config = Config::new("/repo");
        config.prefix = prefix.to_string();
        config.dep_mode = mode;
        let labeler = Labeler::new(&config);
        let external: Box<dyn NonlocalResolver> = match mode {
            DependencyMode::External => Box::new(ExternalResolver::new(
                labeler,
                &[],
                Box::new(MockDiscovery::new()),
            )),
            DependencyMode::Vendored => Box::new(VendoredResolver::new(labeler)),
        };
        Resolver::new(&config, &Go, external)
    }

    #[test]
    fn test_resolve_go() {
        let mut r = test_resolver("example.com/repo", DependencyMode::External);
        let cases = [
            ("example.com/repo", "sub", "//:go_default_library"),
            ("example.com/repo/foo", "sub", "//foo:go_default_library"),
            ("./bar", "sub", "//sub/bar:go_default_library"),
            ("../baz", "sub/deep", "//sub/baz:go_default_library"),
            ("../foo", "sub", "//foo:go_default_library"),
            (
                "github.com/acme/widget/util",
                "",
                "@com_github_acme_widget//util:go_default_library",
            ),
        ];
        for (imp, pkg_rel, want) in cases {
            let got = r.resolve_go(imp, pkg_rel).unwrap();
            assert_eq!(got.to_string(), want, "resolve {:?} from {:?}", imp, pkg_rel);
        }

        assert_eq!(
            r.resolve_go("fmt", ""),
            Err(ResolveError::StandardImport {
                imp: "fmt".to_string()
            })
        );
        assert!(matches!(
            r.resolve_go("../../x", "sub"),
            Err(ResolveError::EscapesRepository { .. })
        ));
        assert!(matches!(
            r.resolve_go("github.com/foo", ""),
            Err(ResolveError::PrefixTooShort { .. })
        ));
    }

    #[test]
    fn test_resolve_go_empty_prefix() {
        let mut r = test_resolver("", DependencyMode::External);
        assert_eq!(
            r.resolve_go("github.com/acme/widget", "").unwrap().to_string(),
            "@com_github_acme_widget//:go_default_library"
        );
        // Only relative imports are local without a prefix.
        assert_eq!(
            r.resolve_go("./util", "lib").unwrap().to_string(),
            "//lib/util:go_default_library"
        );
    }

    #[test]
    fn test_resolve_go_vendored() {
        let mut r = test_resolver("example.com/repo", DependencyMode::Vendored);
        assert_eq!(
            r.resolve_go("github.com/acme/widget", "cmd").unwrap().to_string(),
            "//vendor/github.com/acme/widget:go_default_library"
        );
    }

    #[test]
    fn test_resolve_proto() {
        let mut r = test_resolver("example.com/repo", DependencyMode::External);
        let cases = [
            (
                "google/protobuf/any.proto",
                "",
                "@com_google_protobuf//:any_proto",
                "@io_bazel_rules_go//proto/wkt:any_go_proto",
            ),
            ("foo/bar.proto", "", "//foo:foo_proto", "//foo:foo_go_proto"),
            ("bar.proto", "", "//:repo_proto", "//:repo_go_proto"),
            (
                "foo/bar.proto",
                "vendor/x",
                "//vendor/foo:foo_proto",
                "//vendor/foo:foo_go_proto",
            ),
        ];
        for (imp, pkg_rel, proto, go_proto) in cases {
            assert_eq!(r.resolve_proto(imp, pkg_rel).unwrap().to_string(), proto);
            assert_eq!(r.resolve_go_proto(imp, pkg_rel).unwrap().to_string(), go_proto);
        }
        assert!(matches!(
            r.resolve_proto("foo/bar.txt", ""),
            Err(ResolveError::NotProto { .. })
        ));

        let mut flat = test_resolver("", DependencyMode::External);
        flat.labeler = Labeler::with_mode(StructureMode::Flat, "");
        assert_eq!(flat.resolve_proto("bar.proto", "").unwrap().to_string(), "//:root_proto");
    }

    #[test]
    fn test_nonlocal_results_are_cached() {
        let discovery = MockDiscovery::new();
        let requests = discovery.requests();
        let config = Config::new("/repo");
        let external = ExternalResolver::new(Labeler::new(&config), &[], Box::new(discovery));
        let mut r = Resolver::new(&config, &Go, Box::new(external));
        r.prefix = "example.com/self".to_string();

        assert!(r.resolve_go("unknown.org/x", "").is_err());
        assert!(r.resolve_go("unknown.org/x", "").is_err());
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_map_expr_strings() {
        let file = parse(
            Path::new("BUILD"),
            r#"x = ["a", "drop"] + select({
    "@io_bazel_rules_go//go/platform:linux": ["drop"],
    "//conditions:default": [],
})
"#,
        )
        .unwrap();
        let ExprKind::Assign { value, .. } = &file.stmts[0].kind else {
            panic!("expected assignment");
        };
        let mut upper = |s: &str| (s != "drop").then(|| s.to_uppercase());
        let mapped = map_expr_strings(value, &mut upper).unwrap();
        assert_eq!(mapped, Expr::string_list(["A"]));

        let mut drop_all = |_: &str| -> Option<String> { None };
        assert!(map_expr_strings(&Expr::string_list(["a"]), &mut drop_all).is_none());
        assert_eq!(
            map_expr_strings(&Expr::list(vec![]), &mut drop_all),
            Some(Expr::list(vec![]))
        );
        assert!(map_expr_strings(&Expr::string("a"), &mut drop_all).is_none());
    }

    #[test]
    fn test_resolve_rule() {
        let mut r = test_resolver("example.com/repo", DependencyMode::External);

        let mut lib = new_rule("go_library", "go_default_library");
        lib.set_attr(
            IMPORTS_ATTR,
            Expr::string_list(["fmt", "example.com/repo/sub", "example.com/repo/sub/deep"]),
        );
        r.resolve_rule(&mut lib, "sub", "sub");
        assert!(lib.attr(IMPORTS_ATTR).is_none());
        assert_eq!(
            lib.attr_strings("deps"),
            Some(vec![":go_default_library", "//sub/deep:go_default_library"])
        );

        let mut std_only = new_rule("go_test", "go_default_test");
        std_only.set_attr(IMPORTS_ATTR, Expr::string_list(["fmt", "testing"]));
        r.resolve_rule(&mut std_only, "", "");
        assert!(std_only.attr(IMPORTS_ATTR).is_none());
        assert!(std_only.attr("deps").is_none());

        let mut other = new_rule("filegroup", "x");
        other.args.push(Arg::named(IMPORTS_ATTR, Expr::string_list(["fmt"])));
        r.resolve_rule(&mut other, "", "");
        assert!(other.attr(IMPORTS_ATTR).is_some());
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("a/./b/../c"), "a/c");
        assert_eq!(clean_path("/../x"), "../x");
        assert_eq!(clean_path("sub/.."), ".");
    }
}
