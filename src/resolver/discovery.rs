//! Remote lookup of repository roots.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use regex::Regex;
use url::Url;

static GO_IMPORT_META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+name\s*=\s*["']go-import["']\s+content\s*=\s*["']([^"']+)["']"#)
        .expect("go-import meta regex")
});

/// Finds the root of the repository that provides an import path.
pub trait RepoRootDiscovery: fmt::Debug {
    fn repo_root(&self, imp: &str) -> Result<String>;
}

/// Discovery through the `go-import` meta tag served at
/// `https://<import>?go-get=1`.
#[derive(Debug)]
pub struct GoGetDiscovery {
    client: reqwest::blocking::Client,
}

impl GoGetDiscovery {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("berth/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create HTTP client")?;
        Ok(GoGetDiscovery { client })
    }
}

impl RepoRootDiscovery for GoGetDiscovery {
    fn repo_root(&self, imp: &str) -> Result<String> {
        let mut url = Url::parse(&format!("https://{}", imp))
            .with_context(|| format!("invalid import path: {}", imp))?;
        url.set_query(Some("go-get=1"));
        tracing::debug!("looking up repository root at {}", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .with_context(|| format!("failed to fetch {}", url))?;
        if !response.status().is_success() {
            bail!("failed to fetch {}: HTTP {}", url, response.status());
        }
        let body = response
            .text()
            .with_context(|| format!("failed to read response from {}", url))?;
        parse_go_import(imp, &body)
    }
}

/// Pick the root from the `go-import` meta tags of a page. The root must be
/// the import path itself or one of its prefixes.
pub fn parse_go_import(imp: &str, html: &str) -> Result<String> {
    for caps in GO_IMPORT_META_RE.captures_iter(html) {
        let Some(root) = caps[1].split_whitespace().next() else {
            continue;
        };
        if imp == root
            || imp
                .strip_prefix(root)
                .is_some_and(|rest| rest.starts_with('/'))
        {
            return Ok(root.to_string());
        }
    }
    bail!("no go-import meta tag for {}", imp)
}
