//! Structural fixes for existing build files.

use std::collections::BTreeSet;

use crate::build_file::{Arg, CallExpr, Expr, ExprKind, File};
use crate::core::config::{
    DEFAULT_CGO_LIB_NAME, DEFAULT_LIB_NAME, RULES_GO_DEF_BZL_LABEL, RULES_GO_PROTO_DEF_BZL_LABEL,
};
use crate::merger::keep::is_keep_comment;
use crate::merger::union_into;

/// Load files whose symbol lists are managed, with the symbols each one
/// provides.
const KNOWN_LOADS: &[(&str, &[&str])] = &[
    (
        RULES_GO_DEF_BZL_LABEL,
        &[
            "cgo_library",
            "go_binary",
            "go_library",
            "go_prefix",
            "go_repository",
            "go_test",
        ],
    ),
    (
        RULES_GO_PROTO_DEF_BZL_LABEL,
        &["go_grpc_library", "go_proto_library"],
    ),
];

/// Apply potentially breaking fixes to a file. Returns whether anything
/// changed.
///
/// The only fix is squashing a deprecated `cgo_library` into the
/// `go_library` of the same package.
pub fn fix_file(file: &mut File) -> bool {
    squash_cgo_library(file)
}

fn is_pinned(stmt: &Expr) -> bool {
    stmt.comments.iter().any(is_keep_comment)
}

/// Fold `cgo_library(name = "cgo_default_library")` into
/// `go_library(name = "go_default_library")`.
fn squash_cgo_library(file: &mut File) -> bool {
    let Some(cgo_idx) = file.rule_index("cgo_library", DEFAULT_CGO_LIB_NAME) else {
        return false;
    };
    if is_pinned(&file.stmts[cgo_idx]) {
        return false;
    }

    match file.rule_index("go_library", DEFAULT_LIB_NAME) {
        None => {
            if let Some(cgo) = file.stmts[cgo_idx].as_call_mut() {
                cgo.func = "go_library".to_string();
                cgo.set_attr("name", Expr::string(DEFAULT_LIB_NAME));
                cgo.set_attr("cgo", Expr::ident("True"));
            }
        }
        Some(go_idx) => {
            if is_pinned(&file.stmts[go_idx]) {
                return false;
            }
            let cgo = file.stmts.remove(cgo_idx);
            let go_idx = if go_idx > cgo_idx { go_idx - 1 } else { go_idx };
            let (Some(cgo), Some(go)) = (cgo.as_call(), file.stmts[go_idx].as_call_mut()) else {
                return false;
            };
            squash_attrs(go, cgo);
        }
    }

    rewrite_library_refs(file);
    tracing::info!("{}: squashed cgo_library into go_library", file.path.display());
    true
}

fn squash_attrs(go: &mut CallExpr, cgo: &CallExpr) {
    for arg in &cgo.args {
        let Some(attr) = arg.name.as_deref() else {
            continue;
        };
        if attr == "name" {
            continue;
        }
        match go.attr_mut(attr) {
            Some(value) => union_into(value, &arg.value),
            None => go.args.push(arg.clone()),
        }
    }
    let cgo_ref = format!(":{}", DEFAULT_CGO_LIB_NAME);
    if go.attr_string("library") == Some(cgo_ref.as_str()) {
        go.del_attr("library");
    }
    go.set_attr("cgo", Expr::ident("True"));
}

/// Point `library` attributes that referenced the squashed rule at the
/// `go_library`.
fn rewrite_library_refs(file: &mut File) {
    let old_ref = format!(":{}", DEFAULT_CGO_LIB_NAME);
    for stmt in &mut file.stmts {
        let Some(call) = stmt.as_call_mut() else {
            continue;
        };
        if let Some(value) = call.attr_mut("library") {
            if value.as_str() == Some(old_ref.as_str()) {
                *value = Expr::string(format!(":{}", DEFAULT_LIB_NAME));
            }
        }
    }
}

/// Make the managed load statements list exactly the symbols the file
/// uses.
///
/// Missing loads are added after the existing loads, or after the leading
/// comments of the file. A load left with no symbols is removed. Symbols
/// the load file doesn't provide, and symbols already loaded from somewhere
/// else, are left as they are.
pub fn fix_loads(file: &mut File) {
    let used: BTreeSet<String> = file.rules().map(|r| r.kind().to_string()).collect();

    for &(label, known) in KNOWN_LOADS {
        let elsewhere = loaded_symbols(file, |l| l != label);
        let wanted: BTreeSet<&str> = known
            .iter()
            .copied()
            .filter(|s| used.contains(*s) && !elsewhere.contains(*s))
            .collect();

        match find_load(file, label) {
            Some(idx) => {
                let Some(call) = file.stmts[idx].as_call_mut() else {
                    continue;
                };
                set_load_symbols(call, known, &wanted);
                if call.args.len() <= 1 {
                    file.stmts.remove(idx);
                }
            }
            None if !wanted.is_empty() => {
                let mut args = vec![Arg::positional(Expr::string(label))];
                args.extend(wanted.iter().map(|s| Arg::positional(Expr::string(*s))));
                let at = load_insert_index(file);
                file.stmts.insert(at, Expr::call("load", args));
            }
            None => {}
        }
    }
}

fn find_load(file: &File, label: &str) -> Option<usize> {
    file.stmts
        .iter()
        .position(|stmt| load_label(stmt) == Some(label))
}

fn load_label(stmt: &Expr) -> Option<&str> {
    let call = stmt.as_call()?;
    if call.func != "load" {
        return None;
    }
    call.args.first()?.value.as_str()
}

/// Symbols bound by load statements whose label satisfies `filter`.
fn loaded_symbols(file: &File, filter: impl Fn(&str) -> bool) -> BTreeSet<String> {
    let mut symbols = BTreeSet::new();
    for stmt in &file.stmts {
        if !load_label(stmt).is_some_and(&filter) {
            continue;
        }
        let Some(call) = stmt.as_call() else {
            continue;
        };
        for arg in call.args.iter().skip(1) {
            match &arg.name {
                Some(alias) => {
                    symbols.insert(alias.clone());
                }
                None => {
                    if let Some(s) = arg.value.as_str() {
                        symbols.insert(s.to_string());
                    }
                }
            }
        }
    }
    symbols
}

/// Rewrite the positional symbols of a load. Managed symbols not in
/// `wanted` are dropped, wanted ones are added, and the list is sorted.
fn set_load_symbols(call: &mut CallExpr, known: &[&str], wanted: &BTreeSet<&str>) {
    let mut args = std::mem::take(&mut call.args).into_iter();
    let Some(label) = args.next() else {
        return;
    };
    let mut positional = Vec::new();
    let mut keyword = Vec::new();
    for arg in args {
        if arg.name.is_some() {
            keyword.push(arg);
            continue;
        }
        match arg.value.as_str() {
            Some(s) if known.contains(&s) && !wanted.contains(s) => {}
            Some(_) => positional.push(arg),
            None => keyword.push(arg),
        }
    }
    for symbol in wanted {
        if !positional.iter().any(|a| a.value.as_str() == Some(*symbol)) {
            positional.push(Arg::positional(Expr::string(*symbol)));
        }
    }
    positional.sort_by(|a, b| a.value.as_str().cmp(&b.value.as_str()));

    call.args = std::iter::once(label)
        .chain(positional)
        .chain(keyword)
        .collect();
}

/// Position for a new load: after the last load, otherwise after leading
/// comment blocks.
fn load_insert_index(file: &File) -> usize {
    if let Some(last) = file.stmts.iter().rposition(|s| load_label(s).is_some()) {
        return last + 1;
    }
    file.stmts
        .iter()
        .position(|s| !matches!(s.kind, ExprKind::CommentBlock))
        .unwrap_or(file.stmts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_file::parse;
    use std::path::Path;

    fn parse_str(src: &str) -> File {
        parse(Path::new("BUILD"), src).unwrap()
    }

    #[test]
    fn test_squash_cgo_library() {
        let mut file = parse_str(
            r#"cgo_library(
    name = "cgo_default_library",
    srcs = ["native.c"],
    copts = ["-DFOO"],
)

go_library(
    name = "go_default_library",
    srcs = ["lib.go"],
    library = ":cgo_default_library",
)

go_test(
    name = "go_default_test",
    library = ":cgo_default_library",
)
"#,
        );
        assert!(fix_file(&mut file));
        assert_eq!(
            file.format(),
            r#"go_library(
    name = "go_default_library",
    srcs = [
        "lib.go",
        "native.c",
    ],
    copts = ["-DFOO"],
    cgo = True,
)

go_test(
    name = "go_default_test",
    library = ":go_default_library",
)
"#
        );
        assert!(!fix_file(&mut file));
    }

    #[test]
    fn test_squash_renames_lone_cgo_library() {
        let mut file = parse_str("cgo_library(\n    name = \"cgo_default_library\",\n    srcs = [\"a.go\"],\n)\n");
        assert!(fix_file(&mut file));
        let rule = file.rules().next().unwrap();
        assert_eq!(rule.kind(), "go_library");
        assert_eq!(rule.name(), Some("go_default_library"));
        assert!(rule.attr("cgo").unwrap().is_true());
    }

    #[test]
    fn test_pinned_cgo_library_is_kept() {
        let src = "# keep\ncgo_library(name = \"cgo_default_library\")\n";
        let mut file = parse_str(src);
        assert!(!fix_file(&mut file));
        assert_eq!(file.format(), src);
    }

    #[test]
    fn test_fix_loads() {
        let mut file = parse_str(
            r#"# header

load("@io_bazel_rules_go//go:def.bzl", "go_prefix", "go_test", "my_macro")

go_library(name = "a")

go_binary(name = "b")
"#,
        );
        fix_loads(&mut file);
        assert!(file.format().contains(
            r#"load("@io_bazel_rules_go//go:def.bzl", "go_binary", "go_library", "my_macro")"#
        ));

        let mut fresh = parse_str("# header\n\ngo_grpc_library(name = \"x\")\n");
        fix_loads(&mut fresh);
        assert_eq!(
            fresh.format(),
            r#"# header

load("@io_bazel_rules_go//proto:def.bzl", "go_grpc_library")

go_grpc_library(name = "x")
"#
        );

        let mut unused = parse_str("load(\"@io_bazel_rules_go//go:def.bzl\", \"go_library\")\n\nfilegroup(name = \"x\")\n");
        fix_loads(&mut unused);
        assert_eq!(unused.format(), "filegroup(name = \"x\")\n");
    }

    #[test]
    fn test_fix_loads_respects_other_sources() {
        let mut file = parse_str(
            r#"load("@io_bazel_rules_go//proto:go_proto_library.bzl", "go_proto_library")

go_proto_library(name = "x")
"#,
        );
        let before = file.clone();
        fix_loads(&mut file);
        assert_eq!(file, before);
    }
}
