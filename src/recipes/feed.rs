use std::sync::OnceLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Artifact, Checksum, Descriptor, Strategy};
use crate::http::RetrievalClient;
use crate::listing;
use crate::selector::{Candidate, FileMatcher, Tier, select_best};

/// Machine-readable release list (Fedora's `releases.json` shape): an array of
/// entries carrying version, arch, variant, a direct link and a digest.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonFeed {
    pub url: String,
    /// Keyword matched against each entry's variant. Defaults to the
    /// descriptor's flavor.
    #[serde(default)]
    pub variant: Option<String>,
    /// Flagship variant retried when the specific one matches nothing.
    #[serde(default)]
    pub fallback_variant: Option<String>,
    /// Every keyword must appear in an entry's link.
    #[serde(default)]
    pub link_keywords: Vec<String>,
}

/// One feed entry. Fields are loose because upstream flips between strings,
/// numbers, booleans and nulls.
#[derive(Debug, Deserialize)]
struct FeedEntry {
    #[serde(default)]
    version: Value,
    #[serde(default, deserialize_with = "loose_string")]
    arch: String,
    #[serde(default, deserialize_with = "loose_string")]
    variant: String,
    #[serde(default, deserialize_with = "loose_string")]
    subvariant: String,
    #[serde(default, deserialize_with = "loose_string")]
    link: String,
    #[serde(default)]
    sha256: Value,
    #[serde(default)]
    stable: Value,
}

/// Null reads as empty, scalars as their JSON text.
fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Decode each entry on its own so one drifted record does not sink the feed.
fn parse_entries(body: &str) -> serde_json::Result<Vec<FeedEntry>> {
    let raw: Vec<Value> = serde_json::from_str(body)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<FeedEntry>(value) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("Skipping malformed feed entry: {err}");
                None
            }
        })
        .collect())
}

impl FeedEntry {
    fn digest(&self) -> Option<&str> {
        self.sha256.as_str()
    }

    fn version_text(&self) -> String {
        match &self.version {
            Value::String(s) => s.clone(),
            Value::Null => "0".to_string(),
            other => other.to_string(),
        }
    }

    fn is_stable(&self) -> bool {
        match &self.stable {
            Value::Bool(b) => *b,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    fn matches_variant(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.variant.to_lowercase().contains(&keyword) || self.subvariant.to_lowercase().contains(&keyword)
    }
}

impl JsonFeed {
    fn candidates<'a>(
        &self,
        entries: &'a [FeedEntry],
        arch: &str,
        variant: &str,
    ) -> Vec<Candidate<&'a FeedEntry>> {
        entries
            .iter()
            .filter(|e| e.arch == arch && e.matches_variant(variant))
            .filter(|e| {
                let link = e.link.to_lowercase();
                !link.is_empty() && self.link_keywords.iter().all(|k| link.contains(&k.to_lowercase()))
            })
            .map(|e| {
                let version = e.version_text();
                Candidate::new(Tier::classify(&version, e.is_stable()), version, e)
            })
            .filter(|c| c.tier > Tier::PRERELEASE)
            .collect()
    }
}

#[async_trait]
impl Strategy for JsonFeed {
    async fn crawl(&self, descriptor: &Descriptor, client: &RetrievalClient) -> Result<Option<Artifact>> {
        let body = client
            .get_text(&self.url)
            .await
            .with_context(|| format!("fetch release feed {}", self.url))?;
        let entries = parse_entries(&body).with_context(|| format!("parse release feed {}", self.url))?;
        debug!("Feed fetched, {} entries", entries.len());

        let variant = self.variant.as_deref().unwrap_or(descriptor.flavor());
        let mut candidates = self.candidates(&entries, descriptor.arch(), variant);

        if candidates.is_empty() {
            warn!("No entry matches variant '{variant}'");
            if let Some(generic) = self.fallback_variant.as_deref().filter(|g| *g != variant) {
                info!("Retrying with '{generic}' as generic source");
                candidates = self.candidates(&entries, descriptor.arch(), generic);
            }
        }

        Ok(select_best(candidates).map(|best| {
            Artifact::new(best.version, best.item.link.clone())
                .with_checksum(best.item.digest().and_then(Checksum::from_hex))
        }))
    }
}

fn item_regex() -> &'static Regex {
    static ITEM_RE: OnceLock<Regex> = OnceLock::new();
    ITEM_RE.get_or_init(|| Regex::new(r"(?s)<item\b[^>]*>(.*?)</item>").expect("invalid RSS item regex"))
}

fn element_regex(tag: &'static str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}\b[^>]*>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</{tag}>"))
        .expect("invalid RSS element regex")
}

fn title_regex() -> &'static Regex {
    static TITLE_RE: OnceLock<Regex> = OnceLock::new();
    TITLE_RE.get_or_init(|| element_regex("title"))
}

fn link_regex() -> &'static Regex {
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    LINK_RE.get_or_init(|| element_regex("link"))
}

/// `(title, link)` for every `<item>` in an RSS document.
fn rss_items(xml: &str) -> Vec<(String, String)> {
    item_regex()
        .captures_iter(xml)
        .filter_map(|item| {
            let inner = item.get(1)?.as_str();
            let title = title_regex().captures(inner)?.get(1)?.as_str();
            let link = link_regex().captures(inner)?.get(1)?.as_str();
            Some((listing::unescape(title.trim()), listing::unescape(link.trim())))
        })
        .collect()
}

/// Project file feed (SourceForge style): item titles are file paths, links
/// are the download URLs.
#[derive(Debug, Clone, Deserialize)]
pub struct RssFeed {
    pub url: String,
    pub files: FileMatcher,
}

#[async_trait]
impl Strategy for RssFeed {
    async fn crawl(&self, _descriptor: &Descriptor, client: &RetrievalClient) -> Result<Option<Artifact>> {
        let xml = client
            .get_text(&self.url)
            .await
            .with_context(|| format!("fetch RSS feed {}", self.url))?;

        let items = rss_items(&xml);
        debug!("RSS feed has {} items", items.len());

        let candidates: Vec<Candidate<String>> = items
            .into_iter()
            .filter_map(|(title, link)| {
                let name = listing::file_name(&title);
                // Items without an extractable version are release notes, not images.
                self.files.version(name)?;
                self.files.candidate(name, "", link)
            })
            .collect();

        Ok(select_best(candidates).map(|best| Artifact::new(best.version, best.item)))
    }
}
