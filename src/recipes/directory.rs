use std::sync::OnceLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::checksums::fetch_checksum;
use super::{Artifact, Descriptor, Strategy};
use crate::http::RetrievalClient;
use crate::listing::{self, anchors, as_dir, child_dir, file_name};
use crate::selector::{Candidate, FileMatcher, Pattern, Tier, rank, select_best};

const DEFAULT_MAX_DIRS: usize = 12;

fn default_max_dirs() -> usize {
    DEFAULT_MAX_DIRS
}

fn default_inner_paths() -> Vec<String> {
    vec![String::new()]
}

fn default_version_label() -> String {
    "Latest".to_string()
}

/// Best matching file in one listing, as `(version, url)`.
fn best_file(body: &str, dir_url: &str, files: &FileMatcher, default_version: &str) -> Option<Candidate<String>> {
    let candidates = anchors(body)
        .iter()
        .filter_map(|href| files.candidate(file_name(href), default_version, listing::join(dir_url, href)))
        .collect();
    select_best(candidates)
}

/// A single listing that holds the artifacts directly.
#[derive(Debug, Clone, Deserialize)]
pub struct FlatDirectory {
    pub url: String,
    pub files: FileMatcher,
    /// Reported when the file name carries no version.
    #[serde(default = "default_version_label")]
    pub version_label: String,
}

#[async_trait]
impl Strategy for FlatDirectory {
    async fn crawl(&self, _descriptor: &Descriptor, client: &RetrievalClient) -> Result<Option<Artifact>> {
        let dir_url = as_dir(&self.url);
        debug!("Checking {dir_url}");
        let body = client
            .get_text(&dir_url)
            .await
            .with_context(|| format!("list {dir_url}"))?;

        Ok(best_file(&body, &dir_url, &self.files, &self.version_label).map(|best| {
            info!("Found {}", best.item);
            Artifact::new(best.version, best.item)
        }))
    }
}

fn date_dir_regex() -> &'static Regex {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    DATE_RE.get_or_init(|| Regex::new(r"^\d{4}\.\d{2}\.\d{2}$").expect("invalid date dir regex"))
}

fn numeric_dir_regex() -> &'static Regex {
    static NUM_RE: OnceLock<Regex> = OnceLock::new();
    NUM_RE.get_or_init(|| Regex::new(r"^\d+\.\d+(?:\.\d+)?$").expect("invalid numeric dir regex"))
}

/// Which subdirectory names count as versions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirPattern {
    /// `YYYY.MM.DD`
    Date,
    /// `N.N` or `N.N.N`
    Numeric,
    Custom(Pattern),
}

impl DirPattern {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            DirPattern::Date => date_dir_regex().is_match(name),
            DirPattern::Numeric => numeric_dir_regex().is_match(name),
            DirPattern::Custom(pattern) => pattern.regex().is_match(name),
        }
    }
}

/// Two-level layout: version-named subdirectories, artifacts inside.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryLayout {
    pub dirs: DirPattern,
    /// Subdirectories containing any of these are skipped.
    #[serde(default)]
    pub dir_exclude: Vec<String>,
    /// Suffixes tried under each version directory, in order.
    #[serde(default = "default_inner_paths")]
    pub inner_paths: Vec<String>,
    #[serde(default = "default_max_dirs")]
    pub max_dirs: usize,
    pub files: FileMatcher,
    /// Checksum list looked up next to the chosen file.
    #[serde(default)]
    pub checksum_file: Option<String>,
}

impl DirectoryLayout {
    /// Version subdirectories of a listing, best first.
    fn version_dirs(&self, body: &str) -> Vec<Candidate<()>> {
        let mut dirs: Vec<Candidate<()>> = Vec::new();
        for href in anchors(body) {
            let Some(name) = child_dir(&href) else { continue };
            let lower = name.to_lowercase();
            if !self.dirs.matches(name) || self.dir_exclude.iter().any(|x| lower.contains(&x.to_lowercase())) {
                continue;
            }
            if dirs.iter().all(|d| d.version != name) {
                dirs.push(Candidate::new(Tier::STABLE, name, ()));
            }
        }
        rank(&mut dirs);
        dirs
    }

    /// Crawl `base`: pick version directories newest first, descend, and
    /// return the first directory that holds a matching artifact.
    pub async fn crawl_from(&self, base: &str, client: &RetrievalClient) -> Result<Option<Artifact>> {
        let base = as_dir(base);
        let body = client
            .get_text(&base)
            .await
            .with_context(|| format!("list version directories at {base}"))?;

        let dirs = self.version_dirs(&body);
        if dirs.is_empty() {
            warn!("No version directories found at {base}");
            return Ok(None);
        }
        let top: Vec<&str> = dirs.iter().take(5).map(|d| d.version.as_str()).collect();
        debug!("Top versions found: {top:?}");

        for dir in dirs.iter().take(self.max_dirs) {
            let version_url = listing::join(&base, &format!("{}/", dir.version));
            for inner in &self.inner_paths {
                let dir_url = as_dir(&listing::join(&version_url, inner));
                match self.scan(&dir_url, &dir.version, client).await {
                    Ok(Some(found)) => return Ok(Some(found)),
                    Ok(None) => debug!("No match in {dir_url}"),
                    Err(err) => warn!("Error checking {dir_url}: {err:#}"),
                }
            }
        }

        Ok(None)
    }

    async fn scan(&self, dir_url: &str, dir_version: &str, client: &RetrievalClient) -> Result<Option<Artifact>> {
        debug!("Checking files in {dir_url}");
        let body = client.get_text(dir_url).await?;
        let Some(best) = best_file(&body, dir_url, &self.files, dir_version) else {
            return Ok(None);
        };
        info!("Found {}", best.item);

        let checksum = match &self.checksum_file {
            Some(list) => fetch_checksum(client, dir_url, list, file_name(&best.item)).await,
            None => None,
        };
        Ok(Some(Artifact::new(best.version, best.item).with_checksum(checksum)))
    }
}

/// One listing of version directories.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionedDirectory {
    pub url: String,
    #[serde(flatten)]
    pub layout: DirectoryLayout,
}

#[async_trait]
impl Strategy for VersionedDirectory {
    async fn crawl(&self, _descriptor: &Descriptor, client: &RetrievalClient) -> Result<Option<Artifact>> {
        self.layout.crawl_from(&self.url, client).await
    }
}

/// The versioned-directory crawl repeated over equivalent mirrors, in order.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorFailover {
    pub mirrors: Vec<String>,
    #[serde(flatten)]
    pub layout: DirectoryLayout,
}

#[async_trait]
impl Strategy for MirrorFailover {
    async fn crawl(&self, _descriptor: &Descriptor, client: &RetrievalClient) -> Result<Option<Artifact>> {
        for mirror in &self.mirrors {
            debug!("Checking mirror: {mirror}");
            match self.layout.crawl_from(mirror, client).await {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => warn!("Mirror {mirror} has no matching artifact"),
                Err(err) => warn!("Mirror {mirror} failed: {err:#}"),
            }
        }
        Ok(None)
    }
}
