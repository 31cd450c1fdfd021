//! Implementation of `berth update` and `berth fix`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::build_file::{CallExpr, Expr, File};
use crate::core::config::{Config, StructureMode};
use crate::core::labeler::Labeler;
use crate::merger::{fix_loads, merge_with_existing};
use crate::ops::emit::{emit, EmitMode};
use crate::packages::language::{by_name, Language};
use crate::packages::walk::walk;
use crate::resolver::Resolver;
use crate::rules::{sort_labels, Generator};

/// Options for the update command.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// What to do with the resulting files.
    pub emit: EmitMode,
}

/// Rules generated for one package, waiting for resolution and merge.
#[derive(Debug)]
pub struct VisitRecord {
    /// Package the rules were generated from.
    pub pkg_rel: String,

    /// Package of the build file the rules go to. Equals `pkg_rel` except
    /// in flat mode, where every rule goes to the root build file.
    pub build_rel: String,

    pub rules: Vec<CallExpr>,

    /// Stubs of rules the package no longer needs.
    pub empty: Vec<CallExpr>,

    /// The existing build file of the package directory.
    pub file: Option<File>,
}

/// Outcome of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Build files emitted.
    pub files: usize,
    /// Emitted files that differ from what is on disk.
    pub changed: usize,
}

/// Generate, merge and emit build files for the configured directories.
///
/// Printed output and diffs go to stdout.
pub fn update(config: &Config, opts: &UpdateOptions) -> Result<UpdateSummary> {
    config.validate().context("invalid configuration")?;
    let lang = by_name(&config.language)?;
    let mut resolver = Resolver::for_config(config, lang.as_ref())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    update_with(config, lang.as_ref(), &mut resolver, opts, &mut out)
}

/// Like [`update`], with the language, resolver and output supplied by the
/// caller.
pub fn update_with(
    config: &Config,
    lang: &dyn Language,
    resolver: &mut Resolver<'_>,
    opts: &UpdateOptions,
    out: &mut dyn Write,
) -> Result<UpdateSummary> {
    let (mut records, root_file) = collect_records(config, lang);
    tracing::debug!("generated rules for {} packages", records.len());

    for record in &mut records {
        for rule in &mut record.rules {
            resolver.resolve_rule(rule, &record.pkg_rel, &record.build_rel);
        }
    }

    let mut summary = UpdateSummary::default();
    match config.structure_mode {
        StructureMode::Hierarchical => {
            for record in records {
                let path = build_file_path(config, &record.pkg_rel, record.file.as_ref());
                emit_merged(config, path, record.rules, record.file.as_ref(), &record.empty, opts, out, &mut summary)?;
            }
        }
        StructureMode::Flat => {
            if records.is_empty() {
                return Ok(summary);
            }
            let path = build_file_path(config, "", root_file.as_ref());
            let mut rules = Vec::new();
            let mut empty = Vec::new();
            for record in records {
                rules.extend(record.rules);
                empty.extend(record.empty);
            }
            emit_merged(config, path, rules, root_file.as_ref(), &empty, opts, out, &mut summary)?;
        }
    }
    Ok(summary)
}

/// Walk the repository and generate rules for every package in the update
/// set. Also returns the root build file, which receives every rule in flat
/// mode.
pub fn collect_records(config: &Config, lang: &dyn Language) -> (Vec<VisitRecord>, Option<File>) {
    let mut records = Vec::new();
    let mut root_file = None;
    walk(config, lang, |visit| {
        if visit.rel.is_empty() {
            root_file = visit.file.clone();
        }
        if !visit.is_update_dir {
            return;
        }
        let Some(pkg) = visit.pkg else {
            return;
        };
        let labeler = Labeler::new(&visit.config);
        let (rules, empty) = Generator::new(&visit.config, &labeler).generate_rules(&pkg);
        let build_rel = match visit.config.structure_mode {
            StructureMode::Hierarchical => visit.rel.clone(),
            StructureMode::Flat => String::new(),
        };
        records.push(VisitRecord {
            pkg_rel: visit.rel,
            build_rel,
            rules,
            empty,
            file: visit.file,
        });
    });
    (records, root_file)
}

fn build_file_path(config: &Config, rel: &str, existing: Option<&File>) -> PathBuf {
    match existing {
        Some(file) => file.path.clone(),
        None => config
            .repo_root
            .join(rel)
            .join(config.default_build_file_name()),
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_merged(
    config: &Config,
    path: PathBuf,
    rules: Vec<CallExpr>,
    existing: Option<&File>,
    empty: &[CallExpr],
    opts: &UpdateOptions,
    out: &mut dyn Write,
    summary: &mut UpdateSummary,
) -> Result<()> {
    let generated = File::with_stmts(path, rules.into_iter().map(Expr::from).collect());
    let Some(mut merged) = merge_with_existing(generated, existing, empty, config.should_fix) else {
        return Ok(());
    };
    sort_labels(&mut merged);
    fix_loads(&mut merged);

    let changed = emit(opts.emit, &merged, out)?;
    summary.files += 1;
    if changed {
        summary.changed += 1;
    }
    Ok(())
}
