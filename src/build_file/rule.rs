//! Rule-level accessors over call expressions.

use super::{Arg, CallExpr, Expr, ExprKind};

impl CallExpr {
    /// The rule kind, e.g. `go_library`.
    pub fn kind(&self) -> &str {
        &self.func
    }

    /// The value of the `name` attribute, if it is a string literal.
    pub fn name(&self) -> Option<&str> {
        self.attr_string("name")
    }

    /// Find a keyword argument.
    pub fn arg(&self, key: &str) -> Option<&Arg> {
        self.args.iter().find(|a| a.name.as_deref() == Some(key))
    }

    pub fn arg_mut(&mut self, key: &str) -> Option<&mut Arg> {
        self.args.iter_mut().find(|a| a.name.as_deref() == Some(key))
    }

    /// Get the value of a keyword argument.
    pub fn attr(&self, key: &str) -> Option<&Expr> {
        self.arg(key).map(|a| &a.value)
    }

    pub fn attr_mut(&mut self, key: &str) -> Option<&mut Expr> {
        self.arg_mut(key).map(|a| &mut a.value)
    }

    /// Set a keyword argument. An existing argument keeps its position and
    /// comments; a new one is appended.
    pub fn set_attr(&mut self, key: &str, value: Expr) {
        match self.arg_mut(key) {
            Some(arg) => arg.value = value,
            None => self.args.push(Arg::named(key, value)),
        }
    }

    /// Remove a keyword argument, returning it.
    pub fn del_attr(&mut self, key: &str) -> Option<Arg> {
        let idx = self
            .args
            .iter()
            .position(|a| a.name.as_deref() == Some(key))?;
        Some(self.args.remove(idx))
    }

    /// Get a string-valued attribute.
    pub fn attr_string(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(Expr::as_str)
    }

    /// Get an attribute holding a plain list of strings.
    ///
    /// Returns `None` if the attribute is missing or is anything other than
    /// a list literal of string literals.
    pub fn attr_strings(&self, key: &str) -> Option<Vec<&str>> {
        let list = self.attr(key)?.as_list()?;
        list.items.iter().map(Expr::as_str).collect()
    }

    /// Names of all keyword arguments in order.
    pub fn attr_keys(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|a| a.name.as_deref())
    }
}

/// Create a rule call `kind(name = "name")`.
pub fn new_rule(kind: &str, name: &str) -> CallExpr {
    CallExpr {
        func: kind.to_string(),
        args: vec![Arg::named("name", Expr::string(name))],
        trailing: Vec::new(),
    }
}

impl From<CallExpr> for Expr {
    fn from(call: CallExpr) -> Self {
        Expr::new(ExprKind::Call(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_accessors() {
        let mut rule = new_rule("go_library", "go_default_library");
        rule.set_attr("srcs", Expr::string_list(["a.go", "b.go"]));
        rule.set_attr("cgo", Expr::ident("True"));

        assert_eq!(rule.kind(), "go_library");
        assert_eq!(rule.name(), Some("go_default_library"));
        assert_eq!(rule.attr_strings("srcs"), Some(vec!["a.go", "b.go"]));
        assert!(rule.attr("cgo").unwrap().is_true());
        assert_eq!(
            rule.attr_keys().collect::<Vec<_>>(),
            vec!["name", "srcs", "cgo"]
        );

        rule.set_attr("srcs", Expr::string_list(["c.go"]));
        assert_eq!(rule.attr_keys().nth(1), Some("srcs"));
        assert_eq!(rule.attr_strings("srcs"), Some(vec!["c.go"]));

        assert!(rule.del_attr("cgo").is_some());
        assert!(rule.del_attr("cgo").is_none());
        assert!(rule.attr("cgo").is_none());
    }

    #[test]
    fn test_attr_strings_rejects_non_literals() {
        let mut rule = new_rule("go_library", "x");
        rule.set_attr(
            "srcs",
            Expr::call("glob", vec![Arg::positional(Expr::string_list(["*.go"]))]),
        );
        assert!(rule.attr_strings("srcs").is_none());
        rule.set_attr("deps", Expr::list(vec![Expr::ident("FOO")]));
        assert!(rule.attr_strings("deps").is_none());
    }
}
