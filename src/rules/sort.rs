//! Canonical ordering of label lists.

use crate::build_file::{Expr, ExprKind, File};

/// Attributes whose string lists are kept sorted.
const SORTED_ATTRS: &[&str] = &["srcs", "deps"];

/// Sort the `srcs` and `deps` lists of every rule in a file.
///
/// Lists inside `select` branches and `+` concatenations are sorted too. A
/// list is left alone unless every element is a string literal. Strings
/// sort by byte order, so `//x` labels precede `:x` and `@repo` labels.
pub fn sort_labels(file: &mut File) {
    for stmt in &mut file.stmts {
        let Some(call) = stmt.as_call_mut() else {
            continue;
        };
        for arg in &mut call.args {
            if arg
                .name
                .as_deref()
                .is_some_and(|name| SORTED_ATTRS.contains(&name))
            {
                sort_expr_labels(&mut arg.value);
            }
        }
    }
}

fn sort_expr_labels(expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::List(list) => {
            if list.items.is_empty() || list.items.iter().any(|item| item.as_str().is_none()) {
                return;
            }
            // Comments above the first element stay at the top of the list.
            let head = std::mem::take(&mut list.items[0].comments.before);
            list.items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
            let first = &mut list.items[0].comments.before;
            let mut before = head;
            before.append(first);
            *first = before;
        }
        ExprKind::Concat(lhs, rhs) => {
            sort_expr_labels(lhs);
            sort_expr_labels(rhs);
        }
        ExprKind::Call(call) if call.func == "select" => {
            for arg in &mut call.args {
                sort_expr_labels(&mut arg.value);
            }
        }
        ExprKind::Dict(dict) => {
            for entry in &mut dict.entries {
                sort_expr_labels(&mut entry.value);
            }
        }
        _ => {}
    }
}
