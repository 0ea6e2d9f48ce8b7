use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

/// Browser fingerprint sent with every request. Several mirrors refuse the
/// default reqwest agent outright.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

const EXCERPT_CHARS: usize = 200;

/// Timeouts applied by the retrieval client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub get_timeout_secs: u64,
    /// HEAD probes run in loops, keep this short.
    pub head_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            get_timeout_secs: 30,
            head_timeout_secs: 5,
            connect_timeout_secs: 10,
        }
    }
}

impl HttpSettings {
    pub fn get_timeout(&self) -> Duration {
        Duration::from_secs(self.get_timeout_secs)
    }

    pub fn head_timeout(&self) -> Duration {
        Duration::from_secs(self.head_timeout_secs)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} for {url}")]
    Http { status: StatusCode, url: String },
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Raw response captured by [`RetrievalClient::fetch`].
#[derive(Debug, Clone)]
pub struct Fetched {
    status: StatusCode,
    body: String,
    headers: HeaderMap,
}

impl Fetched {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

/// Shared outbound HTTP handle. Cloning is cheap; the underlying connection
/// pool and header set are shared between every task.
#[derive(Debug, Clone)]
pub struct RetrievalClient {
    inner: Client,
    settings: HttpSettings,
}

impl RetrievalClient {
    pub fn new(settings: HttpSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));

        let inner = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .map_err(FetchError::Build)?;

        Ok(Self { inner, settings })
    }

    /// Issue a single request and capture status, body and headers. Non-2xx
    /// statuses are returned, not raised; only transport failures error out.
    pub async fn fetch(&self, url: &str, method: Method, timeout: Duration) -> Result<Fetched, FetchError> {
        let response = self
            .inner
            .request(method.clone(), url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        debug!("HTTP {} {} {}", status.as_u16(), method, url);

        let body = if method == Method::HEAD {
            String::new()
        } else {
            response.text().await.map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?
        };

        if status != StatusCode::OK {
            let excerpt: String = body.chars().take(EXCERPT_CHARS).collect();
            warn!("  > {} {}: {}...", status.as_u16(), url, excerpt);
        }

        Ok(Fetched { status, body, headers })
    }

    /// GET `url` with the long timeout and require a 2xx status.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let fetched = self.fetch(url, Method::GET, self.settings.get_timeout()).await?;
        if !fetched.status().is_success() {
            return Err(FetchError::Http {
                status: fetched.status(),
                url: url.to_string(),
            });
        }
        Ok(fetched.into_body())
    }

    /// Cheap existence check: HEAD with the short probe timeout.
    pub async fn probe(&self, url: &str) -> Result<bool, FetchError> {
        let fetched = self.fetch(url, Method::HEAD, self.settings.head_timeout()).await?;
        if !fetched.status().is_success() {
            return Ok(false);
        }
        if let Some(length) = fetched.headers().get(CONTENT_LENGTH).and_then(|v| v.to_str().ok()) {
            debug!("{url} exists ({length} bytes)");
        }
        Ok(true)
    }

    /// Underlying reqwest client, for the streaming downloader.
    pub fn raw(&self) -> &Client {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn client() -> RetrievalClient {
        RetrievalClient::new(HttpSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn sends_browser_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/index.html")
            .match_header("user-agent", BROWSER_USER_AGENT)
            .match_header("accept-language", BROWSER_ACCEPT_LANGUAGE)
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let body = client().get_text(&format!("{}/index.html", server.url())).await.unwrap();
        assert_eq!(body, "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_text_rejects_non_success() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("not here")
            .create_async()
            .await;

        let err = client().get_text(&format!("{}/missing", server.url())).await.unwrap_err();
        match err {
            FetchError::Http { status, .. } => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn fetch_returns_non_success_without_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/forbidden")
            .with_status(403)
            .with_body("nope")
            .create_async()
            .await;

        let fetched = client()
            .fetch(&format!("{}/forbidden", server.url()), Method::GET, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::FORBIDDEN);
        assert_eq!(fetched.body(), "nope");
    }

    #[tokio::test]
    async fn probe_reports_existence() {
        let mut server = Server::new_async().await;
        let _ok = server.mock("HEAD", "/a.iso").with_status(200).create_async().await;
        let _missing = server.mock("HEAD", "/b.iso").with_status(404).create_async().await;

        let client = client();
        assert!(client.probe(&format!("{}/a.iso", server.url())).await.unwrap());
        assert!(!client.probe(&format!("{}/b.iso", server.url())).await.unwrap());
    }

    #[tokio::test]
    async fn fetch_captures_response_headers() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("HEAD", "/big.iso")
            .with_status(200)
            .with_header("x-mirror", "edge-3")
            .create_async()
            .await;

        let fetched = client()
            .fetch(&format!("{}/big.iso", server.url()), Method::HEAD, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(fetched.headers().get("x-mirror").unwrap(), "edge-3");
        assert!(fetched.body().is_empty());
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let err = client().get_text("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
    }
}
