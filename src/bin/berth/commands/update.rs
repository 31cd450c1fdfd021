//! `berth update` command

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::GenerateArgs;
use berth::core::{find_repo_root, Config};
use berth::ops::{update, EmitMode, UpdateOptions};
use berth::util::config::{global_config_path, load_config, project_config_path};

pub fn execute(args: GenerateArgs) -> Result<()> {
    run(args, false)
}

/// Run an update, with deprecated rules squashed when `should_fix` is set.
pub fn run(args: GenerateArgs, should_fix: bool) -> Result<()> {
    let emit: EmitMode = args.mode.parse()?;
    let config = build_config(&args, should_fix)?;

    let summary = update(&config, &UpdateOptions { emit })?;

    match emit {
        EmitMode::Fix => eprintln!(
            "     Updated {} of {} build files",
            summary.changed, summary.files
        ),
        EmitMode::Diff if summary.changed > 0 => {
            eprintln!("{} build files would change", summary.changed)
        }
        _ => {}
    }
    Ok(())
}

/// Layer defaults, settings files and flags into a run configuration.
fn build_config(args: &GenerateArgs, should_fix: bool) -> Result<Config> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;

    let repo_root = match &args.repo_root {
        Some(root) => normalize(&cwd.join(root)),
        None => find_repo_root(&cwd)?,
    };

    let mut config = Config::new(&repo_root);
    let settings = load_config(
        global_config_path().as_deref(),
        &project_config_path(&repo_root),
    );
    settings.apply(&mut config)?;

    if !args.build_file_names.is_empty() {
        config.valid_build_file_names = args.build_file_names.clone();
    }
    if let Some(tags) = &args.build_tags {
        config.set_build_tags(tags)?;
    }
    if let Some(prefix) = &args.prefix {
        config.prefix = prefix.clone();
    }
    config.known_imports.extend(args.known_imports.iter().cloned());
    if let Some(mode) = &args.external {
        config.dep_mode = mode.parse()?;
    }
    if let Some(mode) = &args.proto {
        config.proto_mode = mode.parse()?;
        config.proto_mode_explicit = true;
    }
    if let Some(mode) = &args.structure {
        config.structure_mode = mode.parse()?;
    }
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    if !args.dirs.is_empty() {
        config.dirs = args.dirs.iter().map(|d| normalize(&cwd.join(d))).collect();
    }
    config.should_fix = should_fix;
    config.preprocess_tags();
    config.validate()?;

    tracing::debug!(
        "repository root {}, prefix {:?}",
        config.repo_root.display(),
        config.prefix
    );
    Ok(config)
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
