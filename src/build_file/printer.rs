//! Canonical BUILD file printer.

use super::{CallExpr, DictExpr, Expr, ExprKind, File, ListExpr};

const INDENT: usize = 4;

/// Render a file in canonical layout.
pub fn format(file: &File) -> String {
    let mut out = String::new();
    for (i, stmt) in file.stmts.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_stmt(&mut out, stmt);
    }
    out
}

fn write_stmt(out: &mut String, stmt: &Expr) {
    for line in &stmt.comments.before {
        out.push_str(line);
        out.push('\n');
    }
    match &stmt.kind {
        ExprKind::CommentBlock => return,
        ExprKind::Assign { target, value } => {
            out.push_str(target);
            out.push_str(" = ");
            write_expr(out, value, 0);
            write_suffix(out, stmt.comments.suffix.as_deref());
        }
        // A top-level call keeps a same-line comment after the closing
        // paren when it fits on one line.
        ExprKind::Call(call) if call_fits_inline(call) => {
            write_inline_call(out, call, 0);
            write_suffix(out, stmt.comments.suffix.as_deref());
        }
        _ => {
            write_expr(out, stmt, 0);
            if !opens_multiline(stmt) {
                write_suffix(out, stmt.comments.suffix.as_deref());
            }
        }
    }
    out.push('\n');
}

fn write_suffix(out: &mut String, suffix: Option<&str>) {
    if let Some(comment) = suffix {
        out.push_str("  ");
        out.push_str(comment);
    }
}

fn write_comment_lines(out: &mut String, lines: &[String], indent: usize) {
    for line in lines {
        push_indent(out, indent);
        out.push_str(line);
        out.push('\n');
    }
}

fn push_indent(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

/// Check if an expression prints its own suffix after the opening bracket.
fn opens_multiline(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::List(list) => !list_is_inline(expr, list),
        ExprKind::Dict(dict) => !dict_is_inline(expr, dict),
        ExprKind::Call(call) => !call_is_inline(expr, call),
        _ => false,
    }
}

/// Check if an expression spans more than one line when printed.
fn is_multiline(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::String(s) => s.contains('\n'),
        ExprKind::Concat(lhs, rhs) => is_multiline(lhs) || is_multiline(rhs),
        ExprKind::Call(call) => {
            !call_is_inline(expr, call) || call.args.iter().any(|a| is_multiline(&a.value))
        }
        _ => opens_multiline(expr),
    }
}

fn list_is_inline(expr: &Expr, list: &ListExpr) -> bool {
    if expr.comments.suffix.is_some() || !list.trailing.is_empty() {
        return false;
    }
    match list.items.as_slice() {
        [] => true,
        [item] => item.comments.is_empty() && !is_multiline(item),
        _ => false,
    }
}

fn dict_is_inline(expr: &Expr, dict: &DictExpr) -> bool {
    expr.comments.suffix.is_none() && dict.trailing.is_empty() && dict.entries.is_empty()
}

fn call_is_inline(expr: &Expr, call: &CallExpr) -> bool {
    expr.comments.suffix.is_none() && call_fits_inline(call)
}

fn call_fits_inline(call: &CallExpr) -> bool {
    if !call.trailing.is_empty() {
        return false;
    }
    if call.args.iter().any(|a| !a.comments.is_empty()) {
        return false;
    }
    if call.args.iter().all(|a| a.name.is_none()) {
        return true;
    }
    match call.args.as_slice() {
        [arg] => !is_multiline(&arg.value),
        _ => false,
    }
}

fn write_expr(out: &mut String, expr: &Expr, indent: usize) {
    match &expr.kind {
        ExprKind::String(s) => write_string(out, s),
        ExprKind::Ident(name) | ExprKind::Number(name) => out.push_str(name),
        ExprKind::List(list) => write_list(out, expr, list, indent),
        ExprKind::Dict(dict) => write_dict(out, expr, dict, indent),
        ExprKind::Call(call) => write_call(out, expr, call, indent),
        ExprKind::Concat(lhs, rhs) => {
            write_expr(out, lhs, indent);
            out.push_str(" + ");
            write_expr(out, rhs, indent);
        }
        ExprKind::Assign { target, value } => {
            out.push_str(target);
            out.push_str(" = ");
            write_expr(out, value, indent);
        }
        ExprKind::CommentBlock => {}
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_list(out: &mut String, expr: &Expr, list: &ListExpr, indent: usize) {
    if list_is_inline(expr, list) {
        out.push('[');
        if let Some(item) = list.items.first() {
            write_expr(out, item, indent);
        }
        out.push(']');
        return;
    }

    out.push('[');
    write_suffix(out, expr.comments.suffix.as_deref());
    out.push('\n');
    for item in &list.items {
        write_comment_lines(out, &item.comments.before, indent + INDENT);
        push_indent(out, indent + INDENT);
        write_expr(out, item, indent + INDENT);
        out.push(',');
        write_suffix(out, item.comments.suffix.as_deref());
        out.push('\n');
    }
    write_comment_lines(out, &list.trailing, indent + INDENT);
    push_indent(out, indent);
    out.push(']');
}

fn write_dict(out: &mut String, expr: &Expr, dict: &DictExpr, indent: usize) {
    if dict_is_inline(expr, dict) {
        out.push_str("{}");
        return;
    }

    out.push('{');
    write_suffix(out, expr.comments.suffix.as_deref());
    out.push('\n');
    for entry in &dict.entries {
        write_comment_lines(out, &entry.key.comments.before, indent + INDENT);
        push_indent(out, indent + INDENT);
        write_expr(out, &entry.key, indent + INDENT);
        out.push_str(": ");
        write_expr(out, &entry.value, indent + INDENT);
        out.push(',');
        write_suffix(out, entry.value.comments.suffix.as_deref());
        out.push('\n');
    }
    write_comment_lines(out, &dict.trailing, indent + INDENT);
    push_indent(out, indent);
    out.push('}');
}

fn write_inline_call(out: &mut String, call: &CallExpr, indent: usize) {
    out.push_str(&call.func);
    out.push('(');
    for (i, arg) in call.args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if let Some(name) = &arg.name {
            out.push_str(name);
            out.push_str(" = ");
        }
        write_expr(out, &arg.value, indent);
    }
    out.push(')');
}

fn write_call(out: &mut String, expr: &Expr, call: &CallExpr, indent: usize) {
    if call_is_inline(expr, call) {
        write_inline_call(out, call, indent);
        return;
    }

    out.push_str(&call.func);
    out.push('(');
    write_suffix(out, expr.comments.suffix.as_deref());
    out.push('\n');
    for arg in &call.args {
        write_comment_lines(out, &arg.comments.before, indent + INDENT);
        push_indent(out, indent + INDENT);
        if let Some(name) = &arg.name {
            out.push_str(name);
            out.push_str(" = ");
        }
        write_expr(out, &arg.value, indent + INDENT);
        out.push(',');
        write_suffix(out, arg.comments.suffix.as_deref());
        out.push('\n');
    }
    write_comment_lines(out, &call.trailing, indent + INDENT);
    push_indent(out, indent);
    out.push(')');
}
