use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Artifact, Descriptor, Strategy};
use crate::http::RetrievalClient;
use crate::selector::{Candidate, Pattern, Tier, rank};

const VERSIONS_TRIED: usize = 3;

/// A human-facing release page that names versions but links no files. The
/// download URL is built from a template and confirmed with a HEAD probe.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleasePage {
    pub url: String,
    /// Captures a version number somewhere in the page.
    pub version_pattern: Pattern,
    /// Download URL with `{version}` and `{flavor}` (lowercased) placeholders.
    pub url_template: String,
}

impl ReleasePage {
    fn versions(&self, body: &str) -> Vec<Candidate<()>> {
        let mut found: Vec<Candidate<()>> = Vec::new();
        for caps in self.version_pattern.regex().captures_iter(body) {
            let Some(version) = caps.get(1).or_else(|| caps.get(0)) else { continue };
            let version = version.as_str().trim();
            if found.iter().all(|c| c.version != version) {
                found.push(Candidate::new(Tier::classify(version, true), version, ()));
            }
        }
        rank(&mut found);
        found
    }

    fn download_url(&self, version: &str, flavor: &str) -> String {
        self.url_template
            .replace("{version}", version)
            .replace("{flavor}", &flavor.to_lowercase())
    }
}

#[async_trait]
impl Strategy for ReleasePage {
    async fn crawl(&self, descriptor: &Descriptor, client: &RetrievalClient) -> Result<Option<Artifact>> {
        let body = client
            .get_text(&self.url)
            .await
            .with_context(|| format!("fetch release page {}", self.url))?;

        let versions = self.versions(&body);
        if versions.is_empty() {
            warn!("No versions found on {}", self.url);
            return Ok(None);
        }

        for candidate in versions.iter().take(VERSIONS_TRIED) {
            let url = self.download_url(&candidate.version, descriptor.flavor());
            match client.probe(&url).await {
                Ok(true) => return Ok(Some(Artifact::new(candidate.version.clone(), url))),
                Ok(false) => debug!("Check failed: {url}"),
                // An unreachable candidate counts as a miss.
                Err(err) => warn!("Check failed: {err}"),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::Mechanism;
    use crate::recipes::tests::{client, descriptor};
    use mockito::Server;

    const DOWNLOAD_ALL: &str = r#"
        <table>
          <tr><td>Linux Mint 21.3</td><td>Cinnamon</td></tr>
          <tr><td>Linux Mint 22.1</td><td>Cinnamon</td></tr>
          <tr><td>Linux Mint 22</td><td>Xfce</td></tr>
          <tr><td>LMDE 6</td><td>Cinnamon</td></tr>
        </table>
    "#;

    fn mint(base: &str) -> ReleasePage {
        ReleasePage {
            url: format!("{base}/download_all.php"),
            version_pattern: Pattern::new(r"Linux Mint (\d+(?:\.\d+)?)").unwrap(),
            url_template: format!("{base}/stable/{{version}}/linuxmint-{{version}}-{{flavor}}-64bit.iso"),
        }
    }

    #[tokio::test]
    async fn newest_verified_version_wins() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/download_all.php")
            .with_status(200)
            .with_body(DOWNLOAD_ALL)
            .create_async()
            .await;
        let _newest_missing = server
            .mock("HEAD", "/stable/22.1/linuxmint-22.1-cinnamon-64bit.iso")
            .with_status(404)
            .create_async()
            .await;
        let _next = server
            .mock("HEAD", "/stable/22/linuxmint-22-cinnamon-64bit.iso")
            .with_status(200)
            .create_async()
            .await;

        let found = mint(&server.url())
            .crawl(&descriptor("Cinnamon", Mechanism::ReleasePage), &client())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.version, "22");
        assert_eq!(found.url, format!("{}/stable/22/linuxmint-22-cinnamon-64bit.iso", server.url()));
    }

    #[tokio::test]
    async fn unreachable_candidate_falls_through_to_next_version() {
        let mut server = Server::new_async().await;
        let host = server.host_with_port();
        let port = host.rsplit(':').next().unwrap().to_string();
        // Versions double as ports: 65535 ranks first and nothing listens there.
        let _page = server
            .mock("GET", "/download_all.php")
            .with_status(200)
            .with_body(format!("<p>Linux Mint 65535</p><p>Linux Mint {port}</p>"))
            .create_async()
            .await;
        let head = server
            .mock("HEAD", "/linuxmint-cinnamon.iso")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let page = ReleasePage {
            url: format!("{}/download_all.php", server.url()),
            version_pattern: Pattern::new(r"Linux Mint (\d+)").unwrap(),
            url_template: "http://127.0.0.1:{version}/linuxmint-{flavor}.iso".to_string(),
        };
        let found = page
            .crawl(&descriptor("Cinnamon", Mechanism::ReleasePage), &client())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.version, port);
        assert_eq!(found.url, format!("http://{host}/linuxmint-cinnamon.iso"));
        head.assert_async().await;
    }

    #[test]
    fn versions_are_ranked_and_unique() {
        let page = mint("https://mint.example");
        let versions: Vec<String> = page.versions(DOWNLOAD_ALL).into_iter().map(|c| c.version).collect();
        assert_eq!(versions, vec!["22.1", "22", "21.3"]);
    }
}
