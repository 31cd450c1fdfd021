//! Output sinks for generated build files.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::build_file::File;
use crate::core::config::ConfigError;
use crate::util::fs::write_string;
use crate::util::process::{find_executable, ProcessBuilder};

/// What to do with each generated build file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmitMode {
    /// Print the file to stdout.
    Print,
    /// Write the file in place.
    #[default]
    Fix,
    /// Print a unified diff against the file on disk.
    Diff,
}

impl FromStr for EmitMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "print" => Ok(EmitMode::Print),
            "fix" => Ok(EmitMode::Fix),
            "diff" => Ok(EmitMode::Diff),
            _ => Err(ConfigError::UnknownMode {
                kind: "emit",
                value: s.to_string(),
                expected: Some("Expected one of: print, fix, diff".to_string()),
            }),
        }
    }
}

impl fmt::Display for EmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitMode::Print => write!(f, "print"),
            EmitMode::Fix => write!(f, "fix"),
            EmitMode::Diff => write!(f, "diff"),
        }
    }
}

/// Emit a file in the given mode. Printed output goes to `out`.
///
/// Returns whether the file differs from what is on disk.
pub fn emit(mode: EmitMode, file: &File, out: &mut dyn Write) -> Result<bool> {
    let content = file.format();
    let changed = read_existing(&file.path)?.as_deref() != Some(content.as_str());
    match mode {
        EmitMode::Print => {
            out.write_all(content.as_bytes())
                .context("failed to write to stdout")?;
        }
        EmitMode::Fix => {
            if changed {
                write_string(&file.path, &content)?;
                tracing::info!("wrote {}", file.path.display());
            } else {
                tracing::debug!("{}: unchanged", file.path.display());
            }
        }
        EmitMode::Diff => {
            if changed {
                let diff = diff_file(&file.path, &content)?;
                out.write_all(&diff).context("failed to write to stdout")?;
            }
        }
    }
    Ok(changed)
}

fn read_existing(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read file: {}", path.display())),
    }
}

/// Run `diff -u` between the file on disk and new content.
fn diff_file(path: &Path, content: &str) -> Result<Vec<u8>> {
    let diff = find_executable("diff").context("`diff` not found in PATH")?;
    let old = if path.exists() {
        path.to_path_buf()
    } else {
        Path::new("/dev/null").to_path_buf()
    };
    let label = path.display().to_string();
    // diff exits with 1 when the inputs differ.
    let output = ProcessBuilder::new(diff)
        .arg("-u")
        .args(["--label", &label, "--label", &label])
        .arg(&old)
        .arg("-")
        .stdin(content)
        .exec_with_codes(&[0, 1])?;
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_file::parse;
    use tempfile::TempDir;

    fn sample(path: &Path) -> File {
        parse(path, "go_library(name = \"go_default_library\")\n").unwrap()
    }

    #[test]
    fn test_emit_mode_parse() {
        assert_eq!("diff".parse::<EmitMode>().unwrap(), EmitMode::Diff);
        assert_eq!(EmitMode::default(), EmitMode::Fix);
        assert!("patch".parse::<EmitMode>().is_err());
    }

    #[test]
    fn test_print() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("BUILD.bazel");
        let mut out = Vec::new();

        assert!(emit(EmitMode::Print, &sample(&path), &mut out).unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), "go_library(name = \"go_default_library\")\n");
        assert!(!path.exists());
    }

    #[test]
    fn test_fix_skips_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pkg/BUILD.bazel");
        let file = sample(&path);
        let mut out = Vec::new();

        assert!(emit(EmitMode::Fix, &file, &mut out).unwrap());
        assert!(path.exists());
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        assert!(!emit(EmitMode::Fix, &file, &mut out).unwrap());
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
        assert!(out.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_diff() {
        if find_executable("diff").is_none() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("BUILD.bazel");
        std::fs::write(&path, "go_library(name = \"old\")\n").unwrap();
        let mut out = Vec::new();

        assert!(emit(EmitMode::Diff, &sample(&path), &mut out).unwrap());
        let diff = String::from_utf8(out).unwrap();
        assert!(diff.contains("-go_library(name = \"old\")"));
        assert!(diff.contains("+go_library(name = \"go_default_library\")"));
        // The file on disk is untouched.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "go_library(name = \"old\")\n");
    }
}
