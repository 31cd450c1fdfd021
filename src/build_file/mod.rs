//! BUILD file syntax tree.
//!
//! Berth never edits BUILD files as raw text. Files are parsed into the tree
//! defined here, rules are read and rewritten through the accessors in
//! [`rule`], and the result is printed back in a canonical layout.
//!
//! Only the subset of Starlark that appears in BUILD files is supported:
//! calls (`go_library(name = "x", ...)`, `load(...)`), assignments, lists,
//! dicts, strings, identifiers, numbers and `+` concatenation. Comments are
//! kept on the node they precede or trail so that `# keep` markers and
//! `# berth:` directives survive a round trip.
//!
//! Anything else is a [`ParseError`]: unary minus, `%` formatting,
//! comparisons, comprehensions, `def` and other control flow. The walker
//! logs the error and leaves that directory alone, so such files are never
//! rewritten. Files using them should move the logic into a `.bzl` file.

mod lexer;
mod parser;
mod printer;
pub mod rule;

use std::path::{Path, PathBuf};

pub use parser::{parse, ParseError};
pub use printer::format;

/// Comments attached to a syntax node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    /// Full-line comments directly above the node, including the `#`.
    pub before: Vec<String>,

    /// A comment on the same line, after the node.
    pub suffix: Option<String>,
}

impl Comments {
    /// Check if no comments are attached.
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.suffix.is_none()
    }

    /// Iterate over every comment line attached to the node.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.before
            .iter()
            .map(String::as_str)
            .chain(self.suffix.as_deref())
    }
}

/// An expression together with its comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub comments: Comments,
}

/// The shape of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    String(String),
    Ident(String),
    Number(String),
    List(ListExpr),
    Dict(DictExpr),
    Call(CallExpr),
    /// `lhs + rhs`
    Concat(Box<Expr>, Box<Expr>),
    /// `target = value` at the top level of a file.
    Assign { target: String, value: Box<Expr> },
    /// A statement made only of comment lines, kept in `comments.before`.
    CommentBlock,
}

/// A list literal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListExpr {
    pub items: Vec<Expr>,
    /// Comments between the last item and the closing bracket.
    pub trailing: Vec<String>,
}

/// A dict literal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictExpr {
    pub entries: Vec<KeyValue>,
    pub trailing: Vec<String>,
}

/// One `key: value` entry of a dict.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: Expr,
    pub value: Expr,
}

/// A call such as a rule declaration, `load`, `select` or `glob`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    /// Called name, possibly dotted (`native.go_library`).
    pub func: String,
    pub args: Vec<Arg>,
    pub trailing: Vec<String>,
}

/// A call argument, positional when `name` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
    pub comments: Comments,
}

impl Expr {
    /// Create an expression without comments.
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            comments: Comments::default(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::new(ExprKind::String(value.into()))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Ident(name.into()))
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Expr::new(ExprKind::List(ListExpr {
            items,
            trailing: Vec::new(),
        }))
    }

    /// Build a list of string literals.
    pub fn string_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::list(values.into_iter().map(Expr::string).collect())
    }

    pub fn dict(entries: Vec<(Expr, Expr)>) -> Self {
        Expr::new(ExprKind::Dict(DictExpr {
            entries: entries
                .into_iter()
                .map(|(key, value)| KeyValue { key, value })
                .collect(),
            trailing: Vec::new(),
        }))
    }

    pub fn call(func: impl Into<String>, args: Vec<Arg>) -> Self {
        Expr::new(ExprKind::Call(CallExpr {
            func: func.into(),
            args,
            trailing: Vec::new(),
        }))
    }

    pub fn concat(lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprKind::Concat(Box::new(lhs), Box::new(rhs)))
    }

    /// Get the value of a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListExpr> {
        match &self.kind {
            ExprKind::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&CallExpr> {
        match &self.kind {
            ExprKind::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_call_mut(&mut self) -> Option<&mut CallExpr> {
        match &mut self.kind {
            ExprKind::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Check for the identifier `True`.
    pub fn is_true(&self) -> bool {
        matches!(&self.kind, ExprKind::Ident(name) if name == "True")
    }
}

impl Arg {
    /// A keyword argument `name = value`.
    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Arg {
            name: Some(name.into()),
            value,
            comments: Comments::default(),
        }
    }

    pub fn positional(value: Expr) -> Self {
        Arg {
            name: None,
            value,
            comments: Comments::default(),
        }
    }
}

/// A parsed BUILD file.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    /// Location of the file on disk. Generated files carry the path they
    /// will be written to.
    pub path: PathBuf,

    /// Top-level statements in source order.
    pub stmts: Vec<Expr>,
}

impl File {
    /// Create an empty file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        File {
            path: path.into(),
            stmts: Vec::new(),
        }
    }

    /// Create a file holding the given statements.
    pub fn with_stmts(path: impl Into<PathBuf>, stmts: Vec<Expr>) -> Self {
        File {
            path: path.into(),
            stmts,
        }
    }

    /// Read and parse a file from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read build file: {}", path.display()))?;
        Ok(parse(path, &content)?)
    }

    /// Iterate over top-level rule calls, skipping `load` statements.
    pub fn rules(&self) -> impl Iterator<Item = &CallExpr> {
        self.stmts
            .iter()
            .filter_map(Expr::as_call)
            .filter(|call| call.func != "load")
    }

    /// Find the statement index of the rule with the given kind and name.
    pub fn rule_index(&self, kind: &str, name: &str) -> Option<usize> {
        self.stmts.iter().position(|stmt| {
            stmt.as_call()
                .is_some_and(|call| call.kind() == kind && call.name() == Some(name))
        })
    }

    /// Iterate over every comment line in the file, top to bottom.
    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.stmts.iter().flat_map(|stmt| stmt.comments.iter())
    }

    /// Print the file in canonical layout.
    pub fn format(&self) -> String {
        format(self)
    }
}
