use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, de};

use super::{Candidate, Tier};

/// Regex loaded from the catalog file. Compiled once at load time so a bad
/// pattern is a configuration error, not a resolution failure.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }

    /// First capture group, or the whole match when the pattern has none.
    pub fn extract<'h>(&self, haystack: &'h str) -> Option<&'h str> {
        let caps = self.0.captures(haystack)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(de::Error::custom)
    }
}

/// Filename filter shared by every listing-based strategy.
///
/// Matching is case-insensitive. A name must end with `extension`, contain
/// every keyword and none of the exclusions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileMatcher {
    pub extension: String,
    pub keywords: Vec<String>,
    pub exclude: Vec<String>,
    /// Names containing any of these rank above the rest.
    pub prefer: Vec<String>,
    /// Names containing any of these rank below the rest.
    pub demote: Vec<String>,
    /// Extracts the version token from a file name.
    pub version_pattern: Option<Pattern>,
}

impl FileMatcher {
    #[cfg(test)]
    pub fn new(extension: &str, keywords: &[&str]) -> Self {
        Self {
            extension: extension.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        lower.ends_with(&self.extension.to_lowercase())
            && self.keywords.iter().all(|k| lower.contains(&k.to_lowercase()))
            && !self.exclude.iter().any(|x| lower.contains(&x.to_lowercase()))
    }

    pub fn tier(&self, name: &str) -> Tier {
        let lower = name.to_lowercase();
        let hit = |words: &[String]| words.iter().any(|w| lower.contains(&w.to_lowercase()));
        if hit(&self.prefer) {
            Tier::STABLE
        } else if hit(&self.demote) {
            Tier::PRERELEASE
        } else {
            Tier::UNSTABLE
        }
    }

    pub fn version<'h>(&self, name: &'h str) -> Option<&'h str> {
        self.version_pattern.as_ref()?.extract(name)
    }

    /// Candidate for `name` if it passes the filter. `default_version` is
    /// used when no version can be extracted from the name itself.
    pub fn candidate<T>(&self, name: &str, default_version: &str, item: T) -> Option<Candidate<T>> {
        if !self.matches(name) {
            return None;
        }
        let version = self.version(name).unwrap_or(default_version);
        Some(Candidate::new(self.tier(name), version, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch_matcher() -> FileMatcher {
        FileMatcher {
            version_pattern: Some(Pattern::new(r"archlinux-(\d{4}\.\d{2}\.\d{2})-").unwrap()),
            ..FileMatcher::new(".iso", &["archlinux", "x86_64"])
        }
    }

    #[test]
    fn requires_extension_and_all_keywords() {
        let m = arch_matcher();
        assert!(m.matches("archlinux-2024.03.01-x86_64.iso"));
        assert!(m.matches("ArchLinux-2024.03.01-X86_64.ISO"));
        assert!(!m.matches("archlinux-2024.03.01-x86_64.iso.sig"));
        assert!(!m.matches("archlinux-bootstrap-2024.03.01-aarch64.iso"));
    }

    #[test]
    fn exclusions_reject() {
        let m = FileMatcher {
            exclude: vec!["beta".into()],
            ..FileMatcher::new(".iso", &["ubuntu", "amd64"])
        };
        assert!(m.matches("ubuntu-24.04.1-desktop-amd64.iso"));
        assert!(!m.matches("ubuntu-24.10-beta-desktop-amd64.iso"));
    }

    #[test]
    fn prefer_and_demote_set_tiers() {
        let m = FileMatcher {
            prefer: vec!["live".into()],
            demote: vec!["minimal".into()],
            ..FileMatcher::new(".iso", &[])
        };
        assert_eq!(m.tier("kali-linux-2024.4-live-amd64.iso"), Tier::STABLE);
        assert_eq!(m.tier("kali-linux-2024.4-installer-amd64.iso"), Tier::UNSTABLE);
        assert_eq!(m.tier("manjaro-kde-24.1-minimal.iso"), Tier::PRERELEASE);
    }

    #[test]
    fn candidate_extracts_version_or_defaults() {
        let m = arch_matcher();
        let c = m.candidate("archlinux-2024.03.01-x86_64.iso", "2024.03.01", ()).unwrap();
        assert_eq!(c.version, "2024.03.01");

        let plain = FileMatcher::new(".iso", &["archlinux"]);
        let c = plain.candidate("archlinux-x86_64.iso", "2024.03.01", ()).unwrap();
        assert_eq!(c.version, "2024.03.01");
        assert!(plain.candidate("README.txt", "x", ()).is_none());
    }

    #[test]
    fn pattern_deserializes_and_rejects_bad_regex() {
        let ok: Pattern = serde_json::from_str(r#""neon-user-(\\d+)-""#).unwrap();
        assert_eq!(ok.extract("neon-user-20250109-0716.iso"), Some("20250109"));
        assert!(serde_json::from_str::<Pattern>(r#""(unclosed""#).is_err());
    }
}
