//! Resolution of imports provided by external repositories.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::label::Label;
use crate::core::labeler::Labeler;
use crate::resolver::discovery::RepoRootDiscovery;
use crate::resolver::errors::ResolveError;
use crate::resolver::NonlocalResolver;

static GOPKG_IN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^gopkg\.in/(?:[^/]+/)?[^/]+\.v\d+").expect("gopkg.in regex"));

/// Hosts whose repository roots are a fixed number of segments below the
/// host prefix.
const SPECIAL_HOSTS: &[(&str, usize)] = &[
    ("github.com", 2),
    ("golang.org/x", 1),
    ("google.golang.org", 1),
    ("cloud.google.com", 1),
];

/// Resolves imports to the external repository that provides them.
///
/// Repository roots are found, in order, in the cache (seeded with the known
/// imports), from the special-cased hosts, and finally through discovery.
/// Every subpath between an import and its root is cached, so each root is
/// discovered at most once per run.
#[derive(Debug)]
pub struct ExternalResolver {
    labeler: Labeler,
    discovery: Box<dyn RepoRootDiscovery>,
    cache: HashMap<String, String>,
}

impl ExternalResolver {
    pub fn new(
        labeler: Labeler,
        known_imports: &[String],
        discovery: Box<dyn RepoRootDiscovery>,
    ) -> Self {
        let cache = known_imports
            .iter()
            .map(|imp| (imp.clone(), imp.clone()))
            .collect();
        ExternalResolver {
            labeler,
            discovery,
            cache,
        }
    }

    /// Find the root of the repository that provides `imp`.
    pub fn lookup_prefix(&mut self, imp: &str) -> Result<String, ResolveError> {
        for sub in subpaths(imp) {
            if let Some(root) = self.cache.get(sub) {
                return Ok(root.clone());
            }
        }

        let root = self.find_root(imp)?;
        for sub in subpaths(imp) {
            self.cache.insert(sub.to_string(), root.clone());
            if sub == root {
                break;
            }
        }
        Ok(root)
    }

    fn find_root(&self, imp: &str) -> Result<String, ResolveError> {
        for &(host, missing) in SPECIAL_HOSTS {
            let Some(rest) = imp
                .strip_prefix(host)
                .and_then(|rest| rest.strip_prefix('/'))
            else {
                continue;
            };
            let segments: Vec<&str> = rest.splitn(missing + 1, '/').collect();
            if segments.len() < missing {
                return Err(ResolveError::PrefixTooShort {
                    imp: imp.to_string(),
                    prefix: host.to_string(),
                });
            }
            return Ok(format!("{}/{}", host, segments[..missing].join("/")));
        }

        if imp.starts_with("gopkg.in/") {
            return match GOPKG_IN_RE.find(imp) {
                Some(m) => Ok(m.as_str().to_string()),
                None => Err(ResolveError::PrefixTooShort {
                    imp: imp.to_string(),
                    prefix: "gopkg.in".to_string(),
                }),
            };
        }

        tracing::debug!("discovering repository root of {}", imp);
        self.discovery
            .repo_root(imp)
            .map_err(|e| ResolveError::Discovery {
                imp: imp.to_string(),
                reason: format!("{:#}", e),
            })
    }
}

impl NonlocalResolver for ExternalResolver {
    fn resolve(&mut self, imp: &str) -> Result<Label, ResolveError> {
        let root = self.lookup_prefix(imp)?;
        let pkg = match imp.strip_prefix(root.as_str()) {
            Some(rest) => rest.trim_start_matches('/'),
            None => "",
        };
        let mut label = self.labeler.library_label(pkg);
        label.repo = import_path_to_repo_name(&root);
        Ok(label)
    }
}

/// Derive the repository name used in WORKSPACE for a repository root:
/// host labels reversed, then path segments, joined with `_`.
pub fn import_path_to_repo_name(root: &str) -> String {
    let root = root.to_lowercase();
    let mut segments = root.split('/');
    let host = segments.next().unwrap_or_default();
    let mut parts: Vec<&str> = host.rsplit('.').collect();
    parts.extend(segments);
    parts.join("_").replace(['-', '.'], "_")
}

/// An import path followed by each of its parents, longest first.
fn subpaths(imp: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(imp), |p| p.rsplit_once('/').map(|(parent, _)| parent))
}
