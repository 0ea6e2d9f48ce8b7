use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{Artifact, Descriptor, Strategy};
use crate::http::RetrievalClient;
use crate::listing::{self, anchors, as_dir, child_dir, file_name};
use crate::selector::{Candidate, FileMatcher, select_best};

/// Listing levels walked below a mirror root: the matched directory plus two
/// more.
pub const MAX_DEPTH: usize = 3;

const DEFAULT_EXCLUSIONS: &[&str] = &[
    "pet_packages",
    "drivers",
    "firmware",
    "headers",
    "help",
    "huge",
    "kernels",
    "packages",
    "pupget",
    "devx",
    "doc",
    "nls",
];

fn default_exclusions() -> Vec<String> {
    DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect()
}

/// Decentralised layouts where releases hide a few directories deep under a
/// project folder whose exact name drifts between mirrors.
#[derive(Debug, Clone, Deserialize)]
pub struct RecursiveScrape {
    pub mirrors: Vec<String>,
    /// A root entry containing any of these is the project folder.
    pub dir_keywords: Vec<String>,
    /// Root entries containing any of these are never the project folder.
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,
    pub files: FileMatcher,
}

impl RecursiveScrape {
    fn project_dir(&self, body: &str) -> Option<String> {
        anchors(body).into_iter().find_map(|href| {
            let name = href.trim_matches('/');
            let lower = name.to_lowercase();
            if name.is_empty() || href.contains("://") || href.starts_with('?') || href.starts_with("..") {
                return None;
            }
            if self.exclusions.iter().any(|x| lower.contains(&x.to_lowercase())) {
                return None;
            }
            self.dir_keywords
                .iter()
                .any(|k| lower.contains(&k.to_lowercase()))
                .then(|| name.to_string())
        })
    }

    /// Walk up to [`MAX_DEPTH`] levels from `root`, pooling every matching
    /// artifact. The last level only follows version-looking directories.
    async fn collect(&self, root: String, client: &RetrievalClient) -> Vec<Candidate<String>> {
        let mut pool = Vec::new();
        let mut frontier = vec![root];

        for depth in 0..MAX_DEPTH {
            let mut next = Vec::new();
            for dir in &frontier {
                let body = match client.get_text(dir).await {
                    Ok(body) => body,
                    Err(err) => {
                        debug!("Skipping {dir}: {err}");
                        continue;
                    }
                };
                for href in anchors(&body) {
                    let url = listing::join(dir, &href);
                    if let Some(candidate) = self.files.candidate(file_name(&href), "0", url.clone()) {
                        pool.push(candidate);
                        continue;
                    }
                    if depth + 1 >= MAX_DEPTH {
                        continue;
                    }
                    let Some(child) = child_dir(&href) else { continue };
                    if depth == 0 || child.starts_with(|c: char| c.is_ascii_digit()) {
                        next.push(as_dir(&url));
                    }
                }
            }
            frontier = next;
        }

        pool
    }

    async fn scrape_mirror(&self, base: &str, client: &RetrievalClient) -> Result<Option<Artifact>> {
        let base = as_dir(base);
        let body = client.get_text(&base).await.with_context(|| format!("list mirror {base}"))?;

        let Some(project) = self.project_dir(&body) else {
            warn!("No project directory at {base}");
            return Ok(None);
        };
        let root = as_dir(&listing::join(&base, &project));
        debug!("Matched directory: {root}");

        let pool = self.collect(root, client).await;
        debug!("{} candidate artifacts pooled", pool.len());
        Ok(select_best(pool).map(|best| Artifact::new(best.version, best.item)))
    }
}

#[async_trait]
impl Strategy for RecursiveScrape {
    async fn crawl(&self, _descriptor: &Descriptor, client: &RetrievalClient) -> Result<Option<Artifact>> {
        for mirror in &self.mirrors {
            info!("Checking mirror: {mirror}");
            match self.scrape_mirror(mirror, client).await {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => warn!("Mirror {mirror} yielded no artifacts"),
                Err(err) => warn!("Error checking mirror {mirror}: {err:#}"),
            }
        }
        warn!("All mirrors failed");
        Ok(None)
    }
}
