//! Metadata extracted from individual source files.
//!
//! Only what the generator needs is read: the declared package, imports,
//! the cgo marker and its `#cgo` flags, and build constraints. Sources are
//! scanned with regular expressions and a small line scanner; nothing is
//! type-checked.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{anyhow, bail, Result};
use regex::Regex;

use crate::packages::constraint::{name_suffix, Constraint, NameSuffix};

static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^package\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:;|//.*|/\*.*)?$")
        .expect("package clause regex")
});

static IMPORT_SPEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:([A-Za-z_][A-Za-z0-9_]*|\.)\s+)?(?:"((?:[^"\\]|\\.)*)"|`([^`]*)`)"#)
        .expect("import spec regex")
});

static PROTO_BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").expect("block comment regex"));

static PROTO_LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[^\n]*").expect("line comment regex"));

static PROTO_PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_.]*)\s*;").expect("proto package regex")
});

static PROTO_GO_PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*option\s+go_package\s*=\s*"([^"]*)"\s*;"#)
        .expect("go_package regex")
});

static PROTO_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:public\s+|weak\s+)?"([^"]+)"\s*;"#)
        .expect("proto import regex")
});

static PROTO_SERVICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*service\s+[A-Za-z_][A-Za-z0-9_]*\s*\{").expect("service regex")
});

/// How a file participates in a package, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// `.go`
    Go,
    /// `.c`
    C,
    /// `.cc`, `.cpp`, `.cxx`
    Cxx,
    /// `.h`, `.hh`, `.hpp`, `.hxx`
    Header,
    /// `.s`
    Asm,
    /// `.S`, assembly run through the C preprocessor.
    PreprocessedAsm,
    /// `.proto`
    Proto,
    /// Anything else; not a source file.
    Unknown,
}

impl FileCategory {
    pub fn from_name(name: &str) -> Self {
        let ext = match name.rfind('.') {
            Some(idx) => &name[idx..],
            None => "",
        };
        match ext {
            ".go" => FileCategory::Go,
            ".c" => FileCategory::C,
            ".cc" | ".cpp" | ".cxx" => FileCategory::Cxx,
            ".h" | ".hh" | ".hpp" | ".hxx" => FileCategory::Header,
            ".s" => FileCategory::Asm,
            ".S" => FileCategory::PreprocessedAsm,
            ".proto" => FileCategory::Proto,
            _ => FileCategory::Unknown,
        }
    }

    /// Files that are only compiled when the package uses cgo.
    pub fn needs_cgo(self) -> bool {
        matches!(
            self,
            FileCategory::C | FileCategory::Cxx | FileCategory::PreprocessedAsm
        )
    }
}

/// Compiler or linker options from a `#cgo` line, with its platform
/// restriction if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedOpts {
    pub constraint: Option<Constraint>,
    pub opts: Vec<String>,
}

/// Information about one file in a package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub name: String,
    pub category: FileCategory,

    /// Declared package name, empty when it could not be determined.
    /// External test packages have their `_test` suffix removed.
    pub package_name: String,

    pub is_test: bool,
    pub is_xtest: bool,
    pub imports: Vec<String>,
    pub is_cgo: bool,
    pub copts: Vec<TaggedOpts>,
    pub clinkopts: Vec<TaggedOpts>,

    /// Platform restriction from the file name.
    pub suffix: NameSuffix,

    /// Constraint comments, all of which must hold.
    pub constraints: Vec<Constraint>,

    /// Proto file declares at least one service.
    pub has_services: bool,
}

impl FileInfo {
    pub fn is_pb_go(&self) -> bool {
        self.name.ends_with(".pb.go")
    }

    pub fn constraint_refs(&self) -> Vec<&Constraint> {
        self.constraints.iter().collect()
    }
}

/// Information available from a file name alone. Used for generated files,
/// which may not exist yet.
pub fn file_name_info(dir: &Path, name: &str) -> FileInfo {
    let category = FileCategory::from_name(name);
    let suffix = if category == FileCategory::Proto {
        NameSuffix::default()
    } else {
        name_suffix(name)
    };
    FileInfo {
        path: dir.join(name),
        name: name.to_string(),
        category,
        package_name: String::new(),
        is_test: category == FileCategory::Go && name.ends_with("_test.go"),
        is_xtest: false,
        imports: Vec::new(),
        is_cgo: false,
        copts: Vec::new(),
        clinkopts: Vec::new(),
        suffix,
        constraints: Vec::new(),
        has_services: false,
    }
}

/// Read a Go source file. Read and parse failures are logged and yield a
/// file with an unknown package, which the compiler will report later.
pub fn go_file_info(dir: &Path, name: &str) -> FileInfo {
    let mut info = file_name_info(dir, name);
    let content = match std::fs::read_to_string(&info.path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!("{}: {}", info.path.display(), e);
            return info;
        }
    };
    let source = match parse_go_source(&content) {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!("{}: {}", info.path.display(), e);
            return info;
        }
    };

    info.package_name = source.package;
    if info.is_test {
        if let Some(base) = info.package_name.strip_suffix("_test") {
            info.package_name = base.to_string();
            info.is_xtest = true;
        }
    }
    info.imports = source.imports;
    info.is_cgo = source.is_cgo;
    info.constraints = source.constraints;

    for line in &source.cgo_lines {
        match parse_cgo_line(line) {
            Ok(Some((verb, tagged))) => match verb.as_str() {
                "CFLAGS" | "CPPFLAGS" | "CXXFLAGS" => info.copts.push(tagged),
                "LDFLAGS" => info.clinkopts.push(tagged),
                _ => tracing::warn!(
                    "{}: unsupported #cgo directive {}",
                    info.path.display(),
                    verb
                ),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("{}: {}", info.path.display(), e),
        }
    }

    info
}

/// Read a `.proto` file. `default_name` is used when the file declares
/// neither `go_package` nor `package`.
pub fn proto_file_info(dir: &Path, name: &str, default_name: &str) -> FileInfo {
    let mut info = file_name_info(dir, name);
    let content = match std::fs::read_to_string(&info.path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!("{}: {}", info.path.display(), e);
            return info;
        }
    };
    let content = PROTO_BLOCK_COMMENT_RE.replace_all(&content, "");
    let content = PROTO_LINE_COMMENT_RE.replace_all(&content, "");

    let go_package = PROTO_GO_PACKAGE_RE
        .captures(&content)
        .map(|c| go_package_name(&c[1]));
    let proto_package = PROTO_PACKAGE_RE
        .captures(&content)
        .map(|c| c[1].replace('.', "_"));
    info.package_name = go_package
        .or(proto_package)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default_name.to_string());

    info.imports = PROTO_IMPORT_RE
        .captures_iter(&content)
        .map(|c| c[1].to_string())
        .collect();
    info.has_services = PROTO_SERVICE_RE.is_match(&content);
    info
}

/// Read a non-Go static file. C, C++, header and assembly files may carry
/// constraint comments; everything else is described by its name.
pub fn other_file_info(dir: &Path, name: &str) -> FileInfo {
    let mut info = file_name_info(dir, name);
    if matches!(info.category, FileCategory::Unknown | FileCategory::Proto) {
        return info;
    }
    match std::fs::read_to_string(&info.path) {
        Ok(content) => info.constraints = header_constraints(&content),
        Err(e) => tracing::error!("{}: {}", info.path.display(), e),
    }
    info
}

/// Name a Go package gets from a `go_package` option.
fn go_package_name(option: &str) -> String {
    let name = match option.rsplit_once(';') {
        Some((_, name)) => name,
        None => option.rsplit('/').next().unwrap_or(option),
    };
    name.replace(['-', '.'], "_")
}

#[derive(Debug, Default)]
struct GoSource {
    package: String,
    imports: Vec<String>,
    is_cgo: bool,
    cgo_lines: Vec<String>,
    constraints: Vec<Constraint>,
}

/// Parse a constraint comment line, returning `None` for other comments.
/// A malformed constraint is logged and ignored, leaving the file
/// unconstrained by that line.
fn constraint_comment(line: &str) -> Option<Constraint> {
    let parsed = if let Some(expr) = line.strip_prefix("//go:build") {
        if !expr.is_empty() && !expr.starts_with(char::is_whitespace) {
            return None;
        }
        Constraint::parse_expr(expr.trim())
    } else {
        let opts = line
            .strip_prefix("//")?
            .trim_start()
            .strip_prefix("+build")?;
        if !opts.is_empty() && !opts.starts_with(char::is_whitespace) {
            return None;
        }
        Constraint::parse_plus_build(opts.trim())
    };
    match parsed {
        Ok(c) => Some(c),
        Err(e) => {
            tracing::warn!("ignoring invalid constraint {:?}: {}", line, e);
            None
        }
    }
}

/// Combine header constraints. A `//go:build` line supersedes `// +build`
/// lines, which otherwise must all hold.
fn select_constraints(go_build: Option<Constraint>, plus_build: Vec<Constraint>) -> Vec<Constraint> {
    match go_build {
        Some(c) => vec![c],
        None => plus_build,
    }
}

/// Collect constraint comments at the top of a non-Go file.
fn header_constraints(content: &str) -> Vec<Constraint> {
    let mut go_build = None;
    let mut plus_build = Vec::new();
    for line in content.lines() {
        let t = line.trim();
        if t.is_empty() {
            continue;
        }
        if !t.starts_with("//") {
            break;
        }
        match constraint_comment(t) {
            Some(c) if t.starts_with("//go:build") => go_build = Some(c),
            Some(c) => plus_build.push(c),
            None => {}
        }
    }
    select_constraints(go_build, plus_build)
}

fn parse_go_source(content: &str) -> Result<GoSource> {
    let mut lines = content.lines();
    let mut source = GoSource::default();

    // Header: comments and constraints up to the package clause.
    let mut go_build = None;
    let mut plus_build = Vec::new();
    let mut in_block = false;
    let mut package = None;
    for line in lines.by_ref() {
        let t = line.trim();
        if in_block {
            if t.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if t.is_empty() {
            continue;
        }
        if t.starts_with("//") {
            match constraint_comment(t) {
                Some(c) if t.starts_with("//go:build") => go_build = Some(c),
                Some(c) => plus_build.push(c),
                None => {}
            }
            continue;
        }
        if let Some(rest) = t.strip_prefix("/*") {
            if !rest.contains("*/") {
                in_block = true;
            }
            continue;
        }
        let caps = PACKAGE_RE
            .captures(t)
            .ok_or_else(|| anyhow!("expected package clause, found {:?}", t))?;
        package = Some(caps[1].to_string());
        break;
    }
    source.package = package.ok_or_else(|| anyhow!("missing package clause"))?;
    source.constraints = select_constraints(go_build, plus_build);

    // Body: import declarations, tracking the comment group right before
    // each one for the cgo preamble.
    let mut comment: Vec<String> = Vec::new();
    let mut in_block = false;
    let mut in_group = false;
    for line in lines {
        let t = line.trim();
        if in_block {
            match t.find("*/") {
                Some(end) => {
                    comment.push(t[..end].to_string());
                    in_block = false;
                }
                None => comment.push(t.to_string()),
            }
            continue;
        }
        if t.is_empty() {
            comment.clear();
            continue;
        }
        if let Some(text) = t.strip_prefix("//") {
            comment.push(text.to_string());
            continue;
        }
        if let Some(rest) = t.strip_prefix("/*") {
            match rest.find("*/") {
                Some(end) => comment.push(rest[..end].to_string()),
                None => {
                    comment.push(rest.to_string());
                    in_block = true;
                }
            }
            continue;
        }

        let spec = if in_group {
            if t.starts_with(')') {
                in_group = false;
                comment.clear();
                continue;
            }
            t
        } else if let Some(rest) = t.strip_prefix("import") {
            if !rest.starts_with(|c: char| c.is_whitespace() || c == '(' || c == '"' || c == '`')
            {
                break;
            }
            let rest = rest.trim_start();
            match rest.strip_prefix('(') {
                Some(inner) => {
                    in_group = true;
                    let inner = inner.trim();
                    if let Some(after) = inner.strip_prefix(')') {
                        in_group = false;
                        if !after.trim().trim_start_matches(';').is_empty() {
                            bail!("unexpected text after import group");
                        }
                        comment.clear();
                        continue;
                    }
                    if inner.is_empty() {
                        continue;
                    }
                    inner
                }
                None => rest,
            }
        } else if t == ";" {
            continue;
        } else {
            break;
        };

        let caps = IMPORT_SPEC_RE
            .captures(spec)
            .ok_or_else(|| anyhow!("malformed import {:?}", spec))?;
        let path = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let remainder = &spec[caps.get(0).map_or(0, |m| m.end())..];
        if in_group && remainder.contains(')') {
            in_group = false;
        }

        if path == "C" {
            source.is_cgo = true;
            source.cgo_lines.extend(
                comment
                    .iter()
                    .map(|l| l.trim().to_string())
                    .filter(|l| l.starts_with("#cgo")),
            );
        } else if !source.imports.contains(&path) {
            source.imports.push(path);
        }
        comment.clear();
    }

    Ok(source)
}

/// Parse `#cgo [constraints] VERB: options`. Returns `None` for lines with
/// no options.
fn parse_cgo_line(line: &str) -> Result<Option<(String, TaggedOpts)>> {
    let rest = line
        .strip_prefix("#cgo")
        .ok_or_else(|| anyhow!("not a #cgo line: {:?}", line))?;
    let (head, opts) = rest
        .split_once(':')
        .ok_or_else(|| anyhow!("malformed #cgo line: {:?}", line))?;
    let mut fields: Vec<&str> = head.split_whitespace().collect();
    let verb = fields
        .pop()
        .ok_or_else(|| anyhow!("malformed #cgo line: {:?}", line))?
        .to_string();
    let constraint = if fields.is_empty() {
        None
    } else {
        Some(Constraint::parse_plus_build(&fields.join(" "))?)
    };
    let opts = split_quoted(opts)?;
    if opts.is_empty() {
        return Ok(None);
    }
    Ok(Some((verb, TaggedOpts { constraint, opts })))
}

/// Split a string on whitespace, keeping quoted sections together.
fn split_quoted(s: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote = None;
    let mut escaped = false;
    let mut in_arg = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match (c, quote) {
            ('\\', _) => {
                escaped = true;
                in_arg = true;
            }
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => current.push(c),
            ('"' | '\'', None) => {
                quote = Some(c);
                in_arg = true;
            }
            (c, None) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (c, None) => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if quote.is_some() || escaped {
        bail!("unterminated quote in {:?}", s);
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}
