//! `# berth:` directives embedded in build file comments.

use crate::build_file::File;

/// Comment prefix introducing a directive.
pub const DIRECTIVE_PREFIX: &str = "# berth:";

/// Directive keys with a defined meaning.
pub const KNOWN_DIRECTIVES: &[&str] = &["exclude", "ignore", "proto"];

/// A `key value` pair read from a `# berth:key value` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: String,
    pub value: String,
}

impl Directive {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Directive {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse a single comment line. Returns `None` for ordinary comments.
    pub fn parse(comment: &str) -> Option<Self> {
        let rest = comment.trim().strip_prefix(DIRECTIVE_PREFIX)?;
        let (key, value) = match rest.split_once(char::is_whitespace) {
            Some((key, value)) => (key, value.trim()),
            None => (rest, ""),
        };
        if key.is_empty() {
            return None;
        }
        Some(Directive::new(key, value))
    }
}

/// Collect every directive in a file, in source order.
///
/// Unknown keys are logged and skipped, so callers only see directives they
/// can act on.
pub fn parse_directives(file: &File) -> Vec<Directive> {
    file.comments()
        .filter_map(Directive::parse)
        .filter(|d| {
            let known = KNOWN_DIRECTIVES.contains(&d.key.as_str());
            if !known {
                tracing::warn!(
                    "{}: unknown directive `{}`",
                    file.path.display(),
                    d.key
                );
            }
            known
        })
        .collect()
}

/// Check for an `ignore` directive.
pub fn has_ignore(directives: &[Directive]) -> bool {
    directives.iter().any(|d| d.key == "ignore")
}

/// Values of all `exclude` directives.
pub fn excluded_names(directives: &[Directive]) -> impl Iterator<Item = &str> {
    directives
        .iter()
        .filter(|d| d.key == "exclude")
        .map(|d| d.value.as_str())
}
