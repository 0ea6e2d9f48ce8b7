//! Helpers for autoindex-style HTML directory listings.
//!
//! Listings are scraped with a single `href` regex rather than a full HTML
//! parser. Nothing here touches the network.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;

fn href_regex() -> &'static Regex {
    static HREF_RE: OnceLock<Regex> = OnceLock::new();
    HREF_RE.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*["']([^"'#]+)["']"#).expect("invalid listing href regex")
    })
}

/// Decode the handful of entities that show up in hrefs and feed text.
/// `&amp;` goes last so `&amp;lt;` stays `&lt;`.
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Every `href` target in document order, entity-decoded, with duplicates
/// removed.
pub fn anchors(html: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in href_regex().captures_iter(html) {
        let href = unescape(cap[1].trim());
        if !href.is_empty() && !seen.contains(&href) {
            seen.push(href);
        }
    }
    seen
}

/// Last path segment of an href, without any query string.
///
/// `"/pub/iso/archlinux-x86_64.iso?x=1"` becomes `"archlinux-x86_64.iso"`.
pub fn file_name(href: &str) -> &str {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// Name of a child directory linked from a listing, if `href` is one.
///
/// Sort links, parent links and links leaving the listing host are ignored.
pub fn child_dir(href: &str) -> Option<&str> {
    if href.starts_with('?') || href.starts_with('/') || href.contains("://") {
        return None;
    }
    let trimmed = href.strip_prefix("./").unwrap_or(href);
    let name = trimmed.strip_suffix('/')?;
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return None;
    }
    Some(name)
}

/// Make sure a directory URL ends with a slash so joins descend into it.
pub fn as_dir(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Resolve `href` against the directory URL `base`.
pub fn join(base: &str, href: &str) -> String {
    let base = as_dir(base);
    Url::parse(&base)
        .and_then(|b| b.join(href))
        .map(String::from)
        .unwrap_or_else(|_| format!("{base}{href}"))
}
