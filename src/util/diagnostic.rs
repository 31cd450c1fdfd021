//! User-facing error reports.
//!
//! Fatal errors are printed once by the binary. Errors that carry `miette`
//! metadata contribute their code and help text to the report.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;

use crate::build_file::ParseError;
use crate::core::config::ConfigError;

/// Common suggestion messages.
pub mod suggestions {
    /// Suggestion when an existing build file uses outdated rules.
    pub const RUN_FIX: &str = "Run `berth fix` to update rules with outdated structure";

    /// Suggestion when a build file can't be parsed.
    pub const SYNTAX_ERROR: &str = "Fix the syntax error or add `# berth:ignore` to skip the file";

    /// Suggestion for verbose output.
    pub const VERBOSE: &str = "Run again with `--verbose` for more details";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Diagnostic code, e.g. `berth::config::unknown_mode`
    pub code: Option<String>,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            code: None,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    /// Build a report from a fatal error.
    ///
    /// The top-level message is the outermost error; every cause below it
    /// becomes a context line. Help text comes from the first error in the
    /// chain that carries `miette` metadata.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut diag = Diagnostic::error(err.to_string());
        for cause in err.chain().skip(1) {
            diag = diag.with_context(cause.to_string());
        }

        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<ConfigError>() {
                diag = diag.with_miette(e);
                break;
            }
            if let Some(e) = cause.downcast_ref::<ParseError>() {
                diag = diag
                    .with_location(e.path.clone())
                    .with_suggestion(suggestions::SYNTAX_ERROR);
                break;
            }
        }
        diag
    }

    fn with_miette(mut self, err: &dyn MietteDiagnostic) -> Self {
        if let Some(code) = err.code() {
            self.code = Some(code.to_string());
        }
        if let Some(help) = err.help() {
            self = self.with_suggestion(help.to_string());
        }
        self
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = match (color, self.severity) {
            (true, Severity::Error) => "\x1b[1;31merror\x1b[0m".to_string(),
            (true, Severity::Warning) => "\x1b[1;33mwarning\x1b[0m".to_string(),
            (false, severity) => severity.to_string(),
        };

        match &self.code {
            Some(code) => output.push_str(&format!("{}[{}]: {}\n", severity_str, code, self.message)),
            None => output.push_str(&format!("{}: {}\n", severity_str, self.message)),
        }

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  caused by: {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            for suggestion in &self.suggestions {
                output.push_str(&format!("{}: {}\n", help_prefix, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
