use anyhow::{Result, ensure};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Artifact, Descriptor, Strategy};
use crate::http::RetrievalClient;

/// For hosts that forbid directory indexes: guess URLs from a filename
/// template and a build range, newest build first, and HEAD each one.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildProbe {
    /// URL with `{release}` and `{build}` placeholders.
    pub template: String,
    /// Releases tried in order.
    pub releases: Vec<String>,
    /// Highest build probed (inclusive).
    pub upper: u32,
    /// Lowest build probed (inclusive).
    pub lower: u32,
}

impl BuildProbe {
    pub fn candidate_url(&self, release: &str, build: u32) -> String {
        self.template
            .replace("{release}", release)
            .replace("{build}", &build.to_string())
    }
}

#[async_trait]
impl Strategy for BuildProbe {
    async fn crawl(&self, _descriptor: &Descriptor, client: &RetrievalClient) -> Result<Option<Artifact>> {
        ensure!(self.upper >= self.lower, "empty build range {}..={}", self.upper, self.lower);

        for release in &self.releases {
            info!("Probing {release} builds {}..={}", self.upper, self.lower);
            for build in (self.lower..=self.upper).rev() {
                let url = self.candidate_url(release, build);
                match client.probe(&url).await {
                    Ok(true) => {
                        info!("Found valid build: {build}");
                        return Ok(Some(Artifact::new(format!("{release} (Build {build})"), url)));
                    }
                    Ok(false) => {}
                    Err(err) => debug!("Probe failed for {url}: {err}"),
                }
            }
        }

        Ok(None)
    }
}
