//! Merging generated rules into existing build files.
//!
//! Merging is non-destructive. Rules, attributes and list entries the user
//! wrote survive unless generation can prove they are stale, and anything
//! carrying a `# keep` marker is never touched. The only structural rewrite
//! of user rules is [`fix::fix_file`], which runs in fix mode.

pub mod fix;
pub mod keep;

pub use fix::{fix_file, fix_loads};
pub use keep::{is_keep_comment, PinTable};

use crate::build_file::{CallExpr, Expr, ExprKind, File, ListExpr};
use crate::core::directive::{has_ignore, parse_directives};

/// List attributes merged as a set union.
const LIST_ATTRS: &[&str] = &["srcs", "deps", "copts", "clinkopts"];

/// Attributes that always take the generated value.
const SCALAR_ATTRS: &[&str] = &["cgo", "library", "proto"];

/// Directory whose files generated `data` attributes glob.
const TESTDATA_GLOB_SUFFIX: &str = "testdata/**";

const DEFAULT_CONDITION: &str = "//conditions:default";

/// Merge generated rules into an existing build file.
///
/// `generated` holds the rules for the file, with imports already resolved.
/// `empty` lists `kind(name = ...)` stubs of rules that generation no longer
/// produces; matching rules are deleted unless something in them is pinned.
///
/// Returns `None` when the existing file carries an ignore directive and
/// must be left alone. Without an existing file the generated file is
/// returned as is.
pub fn merge_with_existing(
    generated: File,
    existing: Option<&File>,
    empty: &[CallExpr],
    should_fix: bool,
) -> Option<File> {
    let Some(existing) = existing else {
        return Some(generated);
    };
    if has_ignore(&parse_directives(existing)) {
        tracing::debug!("{}: ignored", existing.path.display());
        return None;
    }

    let mut merged = existing.clone();
    if should_fix {
        fix_file(&mut merged);
    } else {
        let mut fixed = merged.clone();
        if fix_file(&mut fixed) {
            tracing::warn!(
                "{}: file contains rules whose structure is out of date. Consider running 'berth fix'.",
                merged.path.display()
            );
        }
    }

    let pins = PinTable::new(&merged);
    delete_empty_rules(&mut merged, empty, &pins);

    for gen in generated.stmts {
        let ExprKind::Call(gen) = gen.kind else {
            continue;
        };
        let Some(name) = gen.name().map(str::to_string) else {
            continue;
        };
        let existing_rule = merged
            .stmts
            .iter_mut()
            .filter_map(Expr::as_call_mut)
            .find(|call| call.func != "load" && call.name() == Some(name.as_str()));
        match existing_rule {
            Some(old) if old.kind() == gen.kind() => merge_rule(old, &gen, &pins),
            Some(old) => tracing::warn!(
                "{}: rule {:?} has kind {} but {} was generated; leaving it alone",
                merged.path.display(),
                name,
                old.kind(),
                gen.kind()
            ),
            None => merged.stmts.push(gen.into()),
        }
    }
    Some(merged)
}

fn delete_empty_rules(file: &mut File, empty: &[CallExpr], pins: &PinTable) {
    for stub in empty {
        let Some(name) = stub.name() else {
            continue;
        };
        let Some(idx) = file.rule_index(stub.kind(), name) else {
            continue;
        };
        if pins.touches_rule(stub.kind(), name) {
            tracing::debug!("{}: keeping pinned empty rule {}", file.path.display(), name);
            continue;
        }
        tracing::debug!("{}: deleting empty rule {}", file.path.display(), name);
        file.stmts.remove(idx);
    }
}

/// Merge a generated rule into the existing rule of the same kind and name.
fn merge_rule(old: &mut CallExpr, gen: &CallExpr, pins: &PinTable) {
    let kind = old.kind().to_string();
    let name = old.name().unwrap_or_default().to_string();
    if pins.is_rule_pinned(&kind, &name) {
        return;
    }

    for &attr in LIST_ATTRS {
        if pins.is_attr_pinned(&kind, &name, attr) {
            continue;
        }
        let Some(gen_value) = gen.attr(attr) else {
            continue;
        };
        match old.attr_mut(attr) {
            Some(old_value) => union_into(old_value, gen_value),
            None => old.set_attr(attr, gen_value.clone()),
        }
    }

    for &attr in SCALAR_ATTRS {
        if pins.is_attr_pinned(&kind, &name, attr) {
            continue;
        }
        match gen.attr(attr) {
            Some(value) => old.set_attr(attr, value.clone()),
            None => {
                old.del_attr(attr);
            }
        }
    }

    if !pins.is_attr_pinned(&kind, &name, "data") {
        merge_data(old, gen.attr("data"));
    }
}

/// Merge `data`. Generation only ever produces the testdata glob, so that
/// operand follows the generated value and everything else in the existing
/// value is kept.
fn merge_data(old: &mut CallExpr, gen: Option<&Expr>) {
    let kept = old.attr("data").cloned().and_then(strip_testdata_globs);
    let value = match (kept, gen) {
        (None, None) => {
            old.del_attr("data");
            return;
        }
        (Some(kept), None) => kept,
        (None, Some(gen)) => gen.clone(),
        (Some(kept), Some(gen)) => Expr::concat(kept, gen.clone()),
    };
    if old.attr("data") != Some(&value) {
        old.set_attr("data", value);
    }
}

/// Remove `glob(["testdata/**"])` operands from a `+` chain.
fn strip_testdata_globs(expr: Expr) -> Option<Expr> {
    if is_testdata_glob(&expr) {
        return None;
    }
    let Expr { kind, comments } = expr;
    match kind {
        ExprKind::Concat(lhs, rhs) => {
            match (strip_testdata_globs(*lhs), strip_testdata_globs(*rhs)) {
                (None, None) => None,
                (Some(x), None) | (None, Some(x)) => Some(x),
                (Some(lhs), Some(rhs)) => Some(Expr {
                    kind: ExprKind::Concat(Box::new(lhs), Box::new(rhs)),
                    comments,
                }),
            }
        }
        kind => Some(Expr { kind, comments }),
    }
}

fn is_testdata_glob(expr: &Expr) -> bool {
    let Some(call) = expr.as_call() else {
        return false;
    };
    let [arg] = call.args.as_slice() else {
        return false;
    };
    call.func == "glob"
        && arg.name.is_none()
        && arg.value.as_list().is_some_and(|list| {
            !list.items.is_empty()
                && list.items.iter().all(|item| {
                    item.as_str().is_some_and(|s| {
                        s == TESTDATA_GLOB_SUFFIX || s.ends_with(&format!("/{}", TESTDATA_GLOB_SUFFIX))
                    })
                })
        })
}

/// Add the strings of `gen` that `old` lacks, keeping everything in `old`.
///
/// Both sides are split into `+` operands. A generated list merges into the
/// first existing list and a generated `select` into the existing `select`
/// that shares a condition with it; generated operands without a
/// counterpart are appended. An existing value made of anything else, such
/// as a `glob`, is left untouched.
pub(crate) fn union_into(old: &mut Expr, gen: &Expr) {
    let mut gen_parts = Vec::new();
    operands(gen, &mut gen_parts);

    let mut old_parts = Vec::new();
    operands_mut(old, &mut old_parts);
    if !old_parts.iter().any(|p| is_mergeable(p)) {
        return;
    }

    let mut unmatched = Vec::new();
    for gen_part in gen_parts {
        let target = old_parts
            .iter_mut()
            .find(|old_part| same_shape(old_part, gen_part));
        match target {
            Some(old_part) => union_operand(old_part, gen_part),
            None if is_mergeable(gen_part) => unmatched.push(gen_part.clone()),
            None => {}
        }
    }

    for part in unmatched {
        let prev = std::mem::replace(old, Expr::list(Vec::new()));
        *old = Expr::concat(prev, part);
    }
}

fn operands<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match &expr.kind {
        ExprKind::Concat(lhs, rhs) => {
            operands(lhs, out);
            operands(rhs, out);
        }
        _ => out.push(expr),
    }
}

fn operands_mut<'e>(expr: &'e mut Expr, out: &mut Vec<&'e mut Expr>) {
    if matches!(expr.kind, ExprKind::Concat(..)) {
        if let ExprKind::Concat(lhs, rhs) = &mut expr.kind {
            operands_mut(lhs, out);
            operands_mut(rhs, out);
        }
    } else {
        out.push(expr);
    }
}

fn is_mergeable(expr: &Expr) -> bool {
    expr.as_list().is_some() || select_dict(expr).is_some()
}

fn same_shape(old: &Expr, gen: &Expr) -> bool {
    if old.as_list().is_some() && gen.as_list().is_some() {
        return true;
    }
    let (Some(old), Some(gen)) = (select_dict(old), select_dict(gen)) else {
        return false;
    };
    conditions(old).any(|c| conditions(gen).any(|g| g == c))
}

/// The dict argument of a `select` call.
fn select_dict(expr: &Expr) -> Option<&Expr> {
    let call = expr.as_call()?;
    match call.args.as_slice() {
        [arg] if call.func == "select" && matches!(arg.value.kind, ExprKind::Dict(_)) => {
            Some(&arg.value)
        }
        _ => None,
    }
}

/// Non-default condition keys of a select dict.
fn conditions(dict: &Expr) -> impl Iterator<Item = &str> {
    let entries = match &dict.kind {
        ExprKind::Dict(dict) => dict.entries.as_slice(),
        _ => &[],
    };
    entries
        .iter()
        .filter_map(|e| e.key.as_str())
        .filter(|k| *k != DEFAULT_CONDITION)
}

fn union_operand(old: &mut Expr, gen: &Expr) {
    match (&mut old.kind, &gen.kind) {
        (ExprKind::List(old_list), ExprKind::List(gen_list)) => union_list(old_list, gen_list),
        (ExprKind::Call(old_call), ExprKind::Call(gen_call)) => {
            let (Some(old_arg), Some(gen_arg)) = (old_call.args.first_mut(), gen_call.args.first())
            else {
                return;
            };
            let (ExprKind::Dict(old_dict), ExprKind::Dict(gen_dict)) =
                (&mut old_arg.value.kind, &gen_arg.value.kind)
            else {
                return;
            };
            for entry in &gen_dict.entries {
                let key = entry.key.as_str();
                match old_dict
                    .entries
                    .iter_mut()
                    .find(|e| key.is_some() && e.key.as_str() == key)
                {
                    Some(old_entry) => {
                        if let (ExprKind::List(o), ExprKind::List(g)) =
                            (&mut old_entry.value.kind, &entry.value.kind)
                        {
                            union_list(o, g);
                        }
                    }
                    None => {
                        // New conditions go before the default branch.
                        let at = old_dict
                            .entries
                            .iter()
                            .position(|e| e.key.as_str() == Some(DEFAULT_CONDITION))
                            .unwrap_or(old_dict.entries.len());
                        old_dict.entries.insert(at, entry.clone());
                    }
                }
            }
        }
        _ => {}
    }
}

fn union_list(old: &mut ListExpr, gen: &ListExpr) {
    for item in &gen.items {
        let Some(s) = item.as_str() else {
            continue;
        };
        if !old.items.iter().any(|o| o.as_str() == Some(s)) {
            old.items.push(Expr::string(s));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_file::parse;
    use crate::build_file::rule::new_rule;
    use std::path::Path;

    fn parse_str(src: &str) -> File {
        parse(Path::new("BUILD.bazel"), src).unwrap()
    }

    fn merge(gen: &str, old: &str, empty: &[CallExpr]) -> Option<String> {
        merge_with_existing(parse_str(gen), Some(&parse_str(old)), empty, false)
            .map(|f| f.format())
    }

    const GENERATED: &str = r#"go_library(
    name = "go_default_library",
    srcs = [
        "a.go",
        "new.go",
    ],
    deps = ["//lib:go_default_library"],
    visibility = ["//visibility:public"],
)
"#;

    #[test]
    fn test_merge_without_existing() {
        let gen = parse_str(GENERATED);
        let merged = merge_with_existing(gen.clone(), None, &[], false).unwrap();
        assert_eq!(merged, gen);
    }

    #[test]
    fn test_merge_union() {
        let old = r#"go_library(
    name = "go_default_library",
    srcs = [
        "a.go",
        "manual.go",
    ],
    cgo = True,
    visibility = ["//foo:__pkg__"],
)
"#;
        let want = r#"go_library(
    name = "go_default_library",
    srcs = [
        "a.go",
        "manual.go",
        "new.go",
    ],
    visibility = ["//foo:__pkg__"],
    deps = ["//lib:go_default_library"],
)
"#;
        assert_eq!(merge(GENERATED, old, &[]).unwrap(), want);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let old = r#"load("@io_bazel_rules_go//go:def.bzl", "go_library")

# berth:exclude skip.go

go_library(
    name = "go_default_library",
    srcs = ["manual.go"] + select({
        "@io_bazel_rules_go//go/platform:linux": ["x_linux.go"],
        "//conditions:default": [],
    }),
)

go_test(
    name = "go_default_test",
    srcs = ["x_test.go"],
)
"#;
        let gen = r#"go_library(
    name = "go_default_library",
    srcs = ["a.go"] + select({
        "@io_bazel_rules_go//go/platform:darwin": ["x_darwin.go"],
        "@io_bazel_rules_go//go/platform:linux": ["y_linux.go"],
        "//conditions:default": [],
    }),
    cgo = True,
)
"#;
        let empty = [new_rule("go_test", "go_default_test")];
        let once = merge(gen, old, &empty).unwrap();
        let twice = merge(gen, &once, &empty).unwrap();
        assert_eq!(once, twice);
        assert!(!once.contains("go_default_test"));
        assert!(once.contains(
            r#"srcs = [
        "manual.go",
        "a.go",
    ] + select({
        "@io_bazel_rules_go//go/platform:linux": [
            "x_linux.go",
            "y_linux.go",
        ],
        "@io_bazel_rules_go//go/platform:darwin": ["x_darwin.go"],
        "//conditions:default": [],
    }),"#
        ));
    }

    #[test]
    fn test_pinned_values_survive() {
        let old = r#"go_library(
    name = "go_default_library",
    srcs = ["a.go"],
    cgo = False,  # keep
    library = ":manual",  # keep
)
"#;
        let gen = r#"go_library(
    name = "go_default_library",
    srcs = ["a.go"],
    cgo = True,
)
"#;
        let merged = merge(gen, old, &[]).unwrap();
        assert!(merged.contains("cgo = False,  # keep"));
        assert!(merged.contains(r#"library = ":manual",  # keep"#));
    }

    #[test]
    fn test_pinned_rule_untouched() {
        let old = r#"# keep
go_library(
    name = "go_default_library",
    srcs = ["a.go"],
)
"#;
        assert_eq!(merge(GENERATED, old, &[]).unwrap(), old);
    }

    #[test]
    fn test_empty_rules_deleted_unless_pinned() {
        let old = r#"go_binary(name = "cmd")

go_test(
    name = "go_default_test",
    srcs = ["x_test.go"],  # keep
)

go_test(
    name = "go_default_xtest",
    srcs = [
        "y_test.go",  # keep
    ],
)
"#;
        let empty = [
            new_rule("go_binary", "cmd"),
            new_rule("go_test", "go_default_test"),
            new_rule("go_test", "go_default_xtest"),
        ];
        let merged = merge("", old, &empty).unwrap();
        assert!(!merged.contains("go_binary"));
        assert!(merged.contains("go_default_test"));
        assert!(merged.contains("go_default_xtest"));
    }

    #[test]
    fn test_ignore_directive() {
        let old = "# berth:ignore\n\ngo_library(name = \"x\")\n";
        assert!(merge(GENERATED, old, &[]).is_none());
    }

    #[test]
    fn test_kind_mismatch_left_alone() {
        let old = "cc_library(name = \"go_default_library\")\n";
        let merged = merge(GENERATED, old, &[]).unwrap();
        assert_eq!(merged, old);
    }

    #[test]
    fn test_hand_written_data_survives() {
        let old = r#"go_test(
    name = "go_default_test",
    srcs = ["a_test.go"],
    data = ["//fixtures:golden"],
)
"#;
        let gen = r#"go_test(
    name = "go_default_test",
    srcs = ["a_test.go"],
)
"#;
        let merged = merge(gen, old, &[]).unwrap();
        assert!(merged.contains(r#"data = ["//fixtures:golden"],"#));

        let with_testdata = r#"go_test(
    name = "go_default_test",
    srcs = ["a_test.go"],
    data = glob(["testdata/**"]),
)
"#;
        let once = merge(with_testdata, old, &[]).unwrap();
        assert!(once.contains(r#"data = ["//fixtures:golden"] + glob(["testdata/**"]),"#));
        assert_eq!(merge(with_testdata, &once, &[]).unwrap(), once);

        // Dropping testdata removes only the generated glob.
        let dropped = merge(gen, &once, &[]).unwrap();
        assert!(dropped.contains(r#"data = ["//fixtures:golden"],"#));
        assert!(!dropped.contains("glob("));
    }

    #[test]
    fn test_generated_data_follows_testdata() {
        let old = r#"go_test(
    name = "go_default_test",
    srcs = ["a_test.go"],
    data = glob(["testdata/**"]),
)
"#;
        let gen = r#"go_test(
    name = "go_default_test",
    srcs = ["a_test.go"],
)
"#;
        assert!(!merge(gen, old, &[]).unwrap().contains("data"));
    }

    #[test]
    fn test_glob_is_untouched() {
        let old = r#"go_library(
    name = "go_default_library",
    srcs = glob(["*.go"]),
)
"#;
        let merged = merge(GENERATED, old, &[]).unwrap();
        assert!(merged.contains(r#"srcs = glob(["*.go"]),"#));
    }
}
