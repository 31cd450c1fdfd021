//! Build a package from the files in one directory.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::core::config::{Config, DOCUMENTATION_PACKAGE};
use crate::core::package::Package;
use crate::packages::fileinfo::{self, FileCategory, FileInfo};
use crate::packages::language::Language;
use crate::packages::PackageError;

/// Files found in a directory, as classified by the walker.
#[derive(Debug, Clone, Default)]
pub struct DirContents {
    /// Files that declare a package: language sources and `.proto` files.
    pub pkg_files: Vec<String>,

    /// Other static files.
    pub other_files: Vec<String>,

    /// Outputs of rules in the existing build file.
    pub gen_files: Vec<String>,

    /// A `testdata` subdirectory holds fixture data.
    pub has_testdata: bool,
}

/// Build the package for a directory.
///
/// Returns `Ok(None)` when nothing in the directory is buildable. When
/// several packages are buildable and none matches the default name, the
/// conflict is returned as an error.
pub fn build_package(
    config: &Config,
    lang: &dyn Language,
    dir: &Path,
    rel: &str,
    contents: &DirContents,
) -> Result<Option<Package>, PackageError> {
    let default_name = default_package_name(config, dir);

    // Declared names decide the package, so sources are read first.
    let mut packages: BTreeMap<String, Package> = BTreeMap::new();
    let mut unknown: Vec<FileInfo> = Vec::new();
    let mut cgo = false;
    for name in &contents.pkg_files {
        let info = if FileCategory::from_name(name) == FileCategory::Proto {
            fileinfo::proto_file_info(dir, name, &default_name)
        } else {
            lang.file_info(dir, name)
        };
        if info.package_name.is_empty() {
            unknown.push(info);
            continue;
        }
        if info.package_name == DOCUMENTATION_PACKAGE {
            continue;
        }
        cgo |= info.is_cgo;

        let pkg = packages
            .entry(info.package_name.clone())
            .or_insert_with(|| {
                let mut pkg = Package::new(info.package_name.clone(), dir, rel);
                pkg.has_testdata = contents.has_testdata;
                pkg
            });
        if let Err(e) = pkg.add_file(config, &info, false) {
            tracing::warn!("{}", e);
        }
    }

    let Some(mut pkg) = select_package(config, dir, &default_name, packages)? else {
        return Ok(None);
    };

    // Files with parse errors stay in srcs so the compiler reports them.
    for info in &unknown {
        if let Err(e) = pkg.add_file(config, info, cgo) {
            tracing::warn!("{}", e);
        }
    }

    for name in &contents.other_files {
        let info = fileinfo::other_file_info(dir, name);
        if let Err(e) = pkg.add_file(config, &info, cgo) {
            tracing::warn!("{}", e);
        }
    }

    let static_files: HashSet<&str> = contents
        .pkg_files
        .iter()
        .chain(&contents.other_files)
        .map(String::as_str)
        .collect();
    for name in &contents.gen_files {
        if static_files.contains(name.as_str()) {
            continue;
        }
        let info = fileinfo::file_name_info(dir, name);
        if let Err(e) = pkg.add_file(config, &info, cgo) {
            tracing::warn!("{}", e);
        }
    }

    Ok(Some(pkg))
}

/// Pick the package to generate rules for.
fn select_package(
    config: &Config,
    dir: &Path,
    default_name: &str,
    packages: BTreeMap<String, Package>,
) -> Result<Option<Package>, PackageError> {
    let mut buildable: BTreeMap<String, Package> = packages
        .into_iter()
        .filter(|(_, pkg)| pkg.is_buildable(config))
        .collect();

    if buildable.len() <= 1 {
        return Ok(buildable.into_values().next());
    }
    if let Some(pkg) = buildable.remove(default_name) {
        return Ok(Some(pkg));
    }

    let packages = buildable
        .into_iter()
        .map(|(name, pkg)| {
            let file = pkg.first_source_file().unwrap_or_default().to_string();
            (name, file)
        })
        .collect();
    Err(PackageError::MultiplePackages {
        dir: dir.to_path_buf(),
        packages,
    })
}

/// The package name preferred when a directory declares several: the
/// directory name, or the last prefix element at the repository root.
pub fn default_package_name(config: &Config, dir: &Path) -> String {
    if dir != config.repo_root {
        return dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
    }
    match config.prefix.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "unnamed".to_string(),
    }
}
