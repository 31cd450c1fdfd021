//! Build constraints and platform matching.
//!
//! A file is restricted to some platforms either by its name
//! (`foo_linux.go`, `foo_amd64.go`, `foo_linux_amd64.go`) or by constraint
//! comments (`//go:build linux && !cgo`, `// +build linux,!cgo`). Both forms
//! are parsed into a [`Constraint`] tree and evaluated against a tag set.

use thiserror::Error;

use crate::core::config::BuildTags;

/// Operating systems recognized in file names and constraints.
pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "illumos", "ios", "js", "linux", "netbsd",
    "openbsd", "plan9", "solaris", "windows",
];

/// Architectures recognized in file names and constraints.
pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "arm", "arm64", "mips", "mips64", "mips64le", "mipsle", "ppc64", "ppc64le",
    "riscv64", "s390x", "wasm",
];

/// Supported (os, arch) pairs.
pub const KNOWN_PLATFORMS: &[(&str, &str)] = &[
    ("aix", "ppc64"),
    ("android", "386"),
    ("android", "amd64"),
    ("android", "arm"),
    ("android", "arm64"),
    ("darwin", "amd64"),
    ("darwin", "arm64"),
    ("dragonfly", "amd64"),
    ("freebsd", "386"),
    ("freebsd", "amd64"),
    ("freebsd", "arm"),
    ("freebsd", "arm64"),
    ("illumos", "amd64"),
    ("ios", "arm64"),
    ("js", "wasm"),
    ("linux", "386"),
    ("linux", "amd64"),
    ("linux", "arm"),
    ("linux", "arm64"),
    ("linux", "mips"),
    ("linux", "mips64"),
    ("linux", "mips64le"),
    ("linux", "mipsle"),
    ("linux", "ppc64"),
    ("linux", "ppc64le"),
    ("linux", "riscv64"),
    ("linux", "s390x"),
    ("netbsd", "386"),
    ("netbsd", "amd64"),
    ("netbsd", "arm"),
    ("netbsd", "arm64"),
    ("openbsd", "386"),
    ("openbsd", "amd64"),
    ("openbsd", "arm"),
    ("openbsd", "arm64"),
    ("plan9", "386"),
    ("plan9", "amd64"),
    ("plan9", "arm"),
    ("solaris", "amd64"),
    ("windows", "386"),
    ("windows", "amd64"),
    ("windows", "arm"),
    ("windows", "arm64"),
];

/// Operating systems matched by the `unix` tag.
const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "illumos", "ios", "linux", "netbsd",
    "openbsd", "solaris",
];

pub fn is_known_os(tag: &str) -> bool {
    KNOWN_OS.contains(&tag)
}

pub fn is_known_arch(tag: &str) -> bool {
    KNOWN_ARCH.contains(&tag)
}

/// A boolean expression over build tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Vec<Constraint>),
    Or(Vec<Constraint>),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid build constraint {expr:?}: {reason}")]
pub struct ConstraintError {
    pub expr: String,
    pub reason: &'static str,
}

impl Constraint {
    /// Parse the expression of a `//go:build` line.
    pub fn parse_expr(expr: &str) -> Result<Constraint, ConstraintError> {
        let tokens = tokenize_expr(expr).ok_or_else(|| ConstraintError {
            expr: expr.to_string(),
            reason: "unexpected character",
        })?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let constraint = parser.parse_or().map_err(|reason| ConstraintError {
            expr: expr.to_string(),
            reason,
        })?;
        if parser.pos != parser.tokens.len() {
            return Err(ConstraintError {
                expr: expr.to_string(),
                reason: "unexpected token",
            });
        }
        Ok(constraint)
    }

    /// Parse the options of a `// +build` line: space-separated options are
    /// OR'ed, comma-separated terms within an option are AND'ed.
    pub fn parse_plus_build(line: &str) -> Result<Constraint, ConstraintError> {
        let mut options = Vec::new();
        for option in line.split_whitespace() {
            let mut terms = Vec::new();
            for term in option.split(',') {
                let (negated, tag) = match term.strip_prefix('!') {
                    Some(tag) => (true, tag),
                    None => (false, term),
                };
                if tag.is_empty() || !tag.chars().all(is_tag_char) {
                    return Err(ConstraintError {
                        expr: line.to_string(),
                        reason: "malformed tag",
                    });
                }
                let atom = Constraint::Tag(tag.to_string());
                terms.push(if negated {
                    Constraint::Not(Box::new(atom))
                } else {
                    atom
                });
            }
            options.push(Constraint::And(terms));
        }
        if options.is_empty() {
            return Err(ConstraintError {
                expr: line.to_string(),
                reason: "empty constraint",
            });
        }
        Ok(Constraint::Or(options))
    }

    /// Evaluate with `ok` deciding each tag.
    pub fn eval(&self, ok: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Constraint::Tag(tag) => ok(tag),
            Constraint::Not(inner) => !inner.eval(ok),
            Constraint::And(terms) => terms.iter().all(|t| t.eval(ok)),
            Constraint::Or(terms) => terms.iter().any(|t| t.eval(ok)),
        }
    }

    /// Every tag mentioned, negated or not.
    pub fn tags(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_tags(&mut out);
        out
    }

    fn collect_tags<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Constraint::Tag(tag) => out.push(tag),
            Constraint::Not(inner) => inner.collect_tags(out),
            Constraint::And(terms) | Constraint::Or(terms) => {
                for term in terms {
                    term.collect_tags(out);
                }
            }
        }
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExprToken {
    Tag(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize_expr(expr: &str) -> Option<Vec<ExprToken>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(ExprToken::Not);
            }
            '(' => {
                chars.next();
                tokens.push(ExprToken::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(ExprToken::RParen);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return None;
                }
                tokens.push(if c == '&' {
                    ExprToken::And
                } else {
                    ExprToken::Or
                });
            }
            c if is_tag_char(c) => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_tag_char(c) {
                        break;
                    }
                    tag.push(c);
                    chars.next();
                }
                tokens.push(ExprToken::Tag(tag));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn parse_or(&mut self) -> Result<Constraint, &'static str> {
        let mut terms = vec![self.parse_and()?];
        while self.peek() == Some(&ExprToken::Or) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Constraint::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Constraint, &'static str> {
        let mut terms = vec![self.parse_not()?];
        while self.peek() == Some(&ExprToken::And) {
            self.pos += 1;
            terms.push(self.parse_not()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Constraint::And(terms)
        })
    }

    fn parse_not(&mut self) -> Result<Constraint, &'static str> {
        match self.peek().cloned() {
            Some(ExprToken::Not) => {
                self.pos += 1;
                Ok(Constraint::Not(Box::new(self.parse_not()?)))
            }
            Some(ExprToken::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                if self.peek() != Some(&ExprToken::RParen) {
                    return Err("missing `)`");
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(ExprToken::Tag(tag)) => {
                self.pos += 1;
                Ok(Constraint::Tag(tag))
            }
            Some(_) => Err("unexpected operator"),
            None => Err("unexpected end of expression"),
        }
    }
}

/// Platform information taken from a file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSuffix {
    pub os: Option<String>,
    pub arch: Option<String>,
}

/// Read the `_GOOS`, `_GOARCH` or `_GOOS_GOARCH` suffix of a file name.
pub fn name_suffix(name: &str) -> NameSuffix {
    let stem = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };
    let stem = stem.strip_suffix("_test").unwrap_or(stem);
    let parts: Vec<&str> = stem.split('_').collect();
    let n = parts.len();

    if n >= 3 && is_known_os(parts[n - 2]) && is_known_arch(parts[n - 1]) {
        return NameSuffix {
            os: Some(parts[n - 2].to_string()),
            arch: Some(parts[n - 1].to_string()),
        };
    }
    if n >= 2 {
        if is_known_os(parts[n - 1]) {
            return NameSuffix {
                os: Some(parts[n - 1].to_string()),
                arch: None,
            };
        }
        if is_known_arch(parts[n - 1]) {
            return NameSuffix {
                os: None,
                arch: Some(parts[n - 1].to_string()),
            };
        }
    }
    NameSuffix::default()
}

/// Report whether a file is specific to operating systems and/or
/// architectures, from its name and any constraints that apply to it.
pub fn is_os_arch_specific(suffix: &NameSuffix, constraints: &[&Constraint]) -> (bool, bool) {
    let mut os_specific = suffix.os.is_some();
    let mut arch_specific = suffix.arch.is_some();
    for constraint in constraints {
        for tag in constraint.tags() {
            if is_known_os(tag) || tag == "unix" {
                os_specific = true;
            }
            if is_known_arch(tag) {
                arch_specific = true;
            }
        }
    }
    (os_specific, arch_specific)
}

/// Check whether a file matches the platform `(os, arch)`. An empty `os` or
/// `arch` matches no OS- or architecture-specific tag.
pub fn check_constraints(
    tags: &BuildTags,
    os: &str,
    arch: &str,
    suffix: &NameSuffix,
    constraints: &[&Constraint],
) -> bool {
    if suffix.os.as_deref().is_some_and(|s| s != os)
        || suffix.arch.as_deref().is_some_and(|s| s != arch)
    {
        return false;
    }
    let ok = |tag: &str| -> bool {
        if is_known_os(tag) {
            return tag == os;
        }
        if is_known_arch(tag) {
            return tag == arch;
        }
        if tag == "unix" {
            return UNIX_OS.contains(&os);
        }
        // Release tags are satisfied by any supported toolchain.
        if tag.starts_with("go1.") {
            return true;
        }
        tags.contains(tag)
    };
    constraints.iter().all(|c| c.eval(&ok))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &str) -> BuildTags {
        let mut tags = BuildTags::parse(list).unwrap();
        tags.insert("cgo");
        tags.insert("gc");
        tags
    }

    #[test]
    fn test_parse_expr() {
        let c = Constraint::parse_expr("linux && (amd64 || arm64) && !purego").unwrap();
        assert_eq!(c.tags(), vec!["linux", "amd64", "arm64", "purego"]);

        let none = NameSuffix::default();
        assert!(check_constraints(&tags(""), "linux", "amd64", &none, &[&c]));
        assert!(!check_constraints(&tags("purego"), "linux", "amd64", &none, &[&c]));
        assert!(!check_constraints(&tags(""), "darwin", "amd64", &none, &[&c]));

        assert!(Constraint::parse_expr("linux &&").is_err());
        assert!(Constraint::parse_expr("linux & amd64").is_err());
        assert!(Constraint::parse_expr("(linux").is_err());
    }

    #[test]
    fn test_parse_plus_build() {
        let c = Constraint::parse_plus_build("linux,!cgo darwin").unwrap();
        let none = NameSuffix::default();
        assert!(!check_constraints(&tags(""), "linux", "", &none, &[&c]));
        assert!(check_constraints(&tags(""), "darwin", "", &none, &[&c]));
        assert!(Constraint::parse_plus_build("").is_err());
        assert!(Constraint::parse_plus_build("linux,").is_err());
    }

    #[test]
    fn test_name_suffix() {
        assert_eq!(
            name_suffix("foo_linux_amd64_test.go"),
            NameSuffix {
                os: Some("linux".into()),
                arch: Some("amd64".into())
            }
        );
        assert_eq!(name_suffix("foo_windows.go").os.as_deref(), Some("windows"));
        assert_eq!(name_suffix("asm_arm64.s").arch.as_deref(), Some("arm64"));
        assert_eq!(name_suffix("linux.go"), NameSuffix::default());
        assert_eq!(name_suffix("foo_bar.go"), NameSuffix::default());
    }

    #[test]
    fn test_os_arch_specific() {
        let c = Constraint::parse_expr("!windows").unwrap();
        assert_eq!(is_os_arch_specific(&NameSuffix::default(), &[&c]), (true, false));
        assert_eq!(
            is_os_arch_specific(&name_suffix("x_amd64.go"), &[]),
            (false, true)
        );
        let generic = Constraint::parse_expr("go1.18 && cgo").unwrap();
        assert_eq!(is_os_arch_specific(&NameSuffix::default(), &[&generic]), (false, false));
        assert!(check_constraints(&tags(""), "", "", &NameSuffix::default(), &[&generic]));
    }
}
