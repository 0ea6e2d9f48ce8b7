use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use super::Checksum;
use crate::http::RetrievalClient;
use crate::listing;

/// `SHA256 (file.iso) = <hex>`
fn bsd_line_regex() -> &'static Regex {
    static LINE_RE: OnceLock<Regex> = OnceLock::new();
    LINE_RE.get_or_init(|| {
        Regex::new(r"^SHA(?:256|512) \((?P<file>[^)]+)\) = (?P<sha>[A-Fa-f0-9]+)$")
            .expect("invalid BSD checksum line regex")
    })
}

/// `<hex>  file.iso` or `<hex> *file.iso`
fn gnu_line_regex() -> &'static Regex {
    static LINE_RE: OnceLock<Regex> = OnceLock::new();
    LINE_RE.get_or_init(|| {
        Regex::new(r"^(?P<sha>[A-Fa-f0-9]{64}|[A-Fa-f0-9]{128})\s+\*?(?P<file>\S+)$")
            .expect("invalid GNU checksum line regex")
    })
}

/// Digest for `filename` in a checksum list, in either GNU or BSD layout.
pub fn find_checksum(body: &str, filename: &str) -> Option<Checksum> {
    body.lines().map(str::trim).find_map(|line| {
        let caps = bsd_line_regex()
            .captures(line)
            .or_else(|| gnu_line_regex().captures(line))?;
        if listing::file_name(&caps["file"]) != filename {
            return None;
        }
        Checksum::from_hex(&caps["sha"])
    })
}

/// Fetch `list_name` from `dir_url` and look up `filename`. Missing or
/// malformed lists yield `None`; a checksum is never required.
pub async fn fetch_checksum(
    client: &RetrievalClient,
    dir_url: &str,
    list_name: &str,
    filename: &str,
) -> Option<Checksum> {
    let list_url = listing::join(dir_url, list_name);
    match client.get_text(&list_url).await {
        Ok(body) => {
            let found = find_checksum(&body, filename);
            if found.is_none() {
                debug!("{filename} not listed in {list_url}");
            }
            found
        }
        Err(err) => {
            warn!("Checksum list unavailable: {err}");
            None
        }
    }
}
