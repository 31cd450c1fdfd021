//! `# keep` pin markers.

use std::collections::HashSet;

use crate::build_file::{Comments, Expr, ExprKind, File};

/// Comment marking a rule, attribute or list entry as hand-maintained.
pub const KEEP_MARKER: &str = "# keep";

/// Check whether a comment line is a pin marker. A reason may follow the
/// marker, as in `# keep: needed by the plugin loader`.
pub fn is_keep_comment(comment: &str) -> bool {
    match comment.trim().strip_prefix(KEEP_MARKER) {
        Some(rest) => rest.is_empty() || rest.starts_with([':', ' ', '\t']),
        None => false,
    }
}

fn has_keep(comments: &Comments) -> bool {
    comments.iter().any(is_keep_comment)
}

type RuleKey = (String, String);

/// Pinned nodes of an existing build file.
///
/// The table is built once from the file as it was read. Nodes are
/// identified by rule kind and name and attribute name rather than by
/// position, so lookups stay valid while the merger rewrites the tree.
/// Pinned list entries only need recording per rule: the merger never
/// removes entries, so they matter only when a whole rule would be deleted.
#[derive(Debug, Default, Clone)]
pub struct PinTable {
    rules: HashSet<RuleKey>,
    attrs: HashSet<(RuleKey, String)>,
    entry_rules: HashSet<RuleKey>,
}

impl PinTable {
    pub fn new(file: &File) -> Self {
        let mut table = PinTable::default();
        for stmt in &file.stmts {
            let Some(call) = stmt.as_call() else {
                continue;
            };
            let Some(name) = call.name() else {
                continue;
            };
            let key = (call.kind().to_string(), name.to_string());
            if has_keep(&stmt.comments) {
                table.rules.insert(key.clone());
            }
            for arg in &call.args {
                let Some(attr) = arg.name.as_deref() else {
                    continue;
                };
                if has_keep(&arg.comments) || has_keep(&arg.value.comments) {
                    table.attrs.insert((key.clone(), attr.to_string()));
                }
                if has_pinned_entry(&arg.value) {
                    table.entry_rules.insert(key.clone());
                }
            }
        }
        table
    }

    pub fn is_rule_pinned(&self, kind: &str, name: &str) -> bool {
        self.rules.contains(&rule_key(kind, name))
    }

    pub fn is_attr_pinned(&self, kind: &str, name: &str, attr: &str) -> bool {
        self.attrs.contains(&(rule_key(kind, name), attr.to_string()))
    }

    /// Check whether the rule or anything inside it is pinned.
    pub fn touches_rule(&self, kind: &str, name: &str) -> bool {
        let key = rule_key(kind, name);
        self.rules.contains(&key)
            || self.attrs.iter().any(|(k, _)| *k == key)
            || self.entry_rules.contains(&key)
    }
}

fn rule_key(kind: &str, name: &str) -> RuleKey {
    (kind.to_string(), name.to_string())
}

/// Check for a pinned string entry in a list, including lists in `select`
/// branches.
fn has_pinned_entry(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::List(list) => list
            .items
            .iter()
            .any(|item| item.as_str().is_some() && has_keep(&item.comments)),
        ExprKind::Dict(dict) => dict.entries.iter().any(|e| has_pinned_entry(&e.value)),
        ExprKind::Call(call) => call.args.iter().any(|a| has_pinned_entry(&a.value)),
        ExprKind::Concat(lhs, rhs) => has_pinned_entry(lhs) || has_pinned_entry(rhs),
        _ => false,
    }
}
