use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Deserialize;

/// Which strategy family resolves a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    JsonFeed,
    RssFeed,
    FlatDirectory,
    VersionedDirectory,
    MirrorFailover,
    RecursiveScrape,
    BuildProbe,
    ReleasePage,
}

impl Mechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mechanism::JsonFeed => "json-feed",
            Mechanism::RssFeed => "rss-feed",
            Mechanism::FlatDirectory => "flat-directory",
            Mechanism::VersionedDirectory => "versioned-directory",
            Mechanism::MirrorFailover => "mirror-failover",
            Mechanism::RecursiveScrape => "recursive-scrape",
            Mechanism::BuildProbe => "build-probe",
            Mechanism::ReleasePage => "release-page",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Identity of one trackable distribution variant. Two descriptors are the
/// same descriptor when their names match.
#[derive(Debug, Clone)]
pub struct Descriptor {
    name: String,
    family: String,
    flavor: String,
    arch: String,
    mechanism: Mechanism,
}

impl Descriptor {
    pub fn new(
        name: impl Into<String>,
        family: impl Into<String>,
        flavor: impl Into<String>,
        arch: impl Into<String>,
        mechanism: Mechanism,
    ) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            flavor: flavor.into(),
            arch: arch.into(),
            mechanism,
        }
    }

    /// Unique catalog key, e.g. "Fedora Workstation".
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Packaging lineage, e.g. "RPM-based".
    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn flavor(&self) -> &str {
        &self.flavor
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn mechanism(&self) -> Mechanism {
        self.mechanism
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Descriptor {}

impl Hash for Descriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Sha256,
    Sha512,
}

impl ChecksumKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumKind::Sha256 => "sha256",
            ChecksumKind::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Digest reported by the upstream source. Reported, never verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    kind: ChecksumKind,
    value: String,
}

impl Checksum {
    /// Accepts a hex digest and infers the algorithm from its length.
    pub fn from_hex(value: &str) -> Option<Self> {
        let value = value.trim();
        let bytes = hex::decode(value).ok()?;
        let kind = match bytes.len() {
            32 => ChecksumKind::Sha256,
            64 => ChecksumKind::Sha512,
            _ => return None,
        };
        Some(Self {
            kind,
            value: value.to_ascii_lowercase(),
        })
    }

    #[cfg(test)]
    pub fn kind(&self) -> ChecksumKind {
        self.kind
    }

    #[cfg(test)]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Hardcoded last-known-good reference, used when live resolution comes up
/// empty. May be stale.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KnownGood {
    pub version: String,
    pub url: String,
}

/// What a live crawl found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub version: String,
    pub url: String,
    pub checksum: Option<Checksum>,
}

impl Artifact {
    pub fn new(version: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            url: url.into(),
            checksum: None,
        }
    }

    pub fn with_checksum(mut self, checksum: Option<Checksum>) -> Self {
        self.checksum = checksum;
        self
    }
}

/// Outcome of resolving one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Live match.
    Success {
        version: String,
        url: String,
        checksum: Option<Checksum>,
    },
    /// Every live path failed; this is the recipe's hardcoded reference.
    Fallback { version: String, url: String },
    /// Nothing usable.
    Failed { reason: String },
}

/// How a consumer should present a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Live,
    Degraded,
    Failed,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Live => "Done",
            Status::Degraded => "Done with fallback",
            Status::Failed => "Failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl Resolution {
    pub fn failed(reason: impl Into<String>) -> Self {
        Resolution::Failed { reason: reason.into() }
    }

    pub fn status(&self) -> Status {
        match self {
            Resolution::Success { .. } => Status::Live,
            Resolution::Fallback { .. } => Status::Degraded,
            Resolution::Failed { .. } => Status::Failed,
        }
    }

    /// Download URL, absent only for failures.
    pub fn url(&self) -> Option<&str> {
        match self {
            Resolution::Success { url, .. } | Resolution::Fallback { url, .. } => Some(url),
            Resolution::Failed { .. } => None,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Resolution::Success { version, .. } | Resolution::Fallback { version, .. } => Some(version),
            Resolution::Failed { .. } => None,
        }
    }

    pub fn checksum(&self) -> Option<&Checksum> {
        match self {
            Resolution::Success { checksum, .. } => checksum.as_ref(),
            _ => None,
        }
    }

    /// Human readable version column: fallbacks carry a marker, failures
    /// show their reason.
    pub fn display_version(&self) -> String {
        match self {
            Resolution::Success { version, .. } => version.clone(),
            Resolution::Fallback { version, .. } => format!("{version} (Fallback)"),
            Resolution::Failed { reason } => format!("ERROR: {reason}"),
        }
    }
}

impl From<Artifact> for Resolution {
    fn from(artifact: Artifact) -> Self {
        Resolution::Success {
            version: artifact.version,
            url: artifact.url,
            checksum: artifact.checksum,
        }
    }
}

impl From<KnownGood> for Resolution {
    fn from(known: KnownGood) -> Self {
        Resolution::Fallback {
            version: known.version,
            url: known.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_equality_is_by_name() {
        let a = Descriptor::new("Arch Linux", "Arch-based", "Rolling", "x86_64", Mechanism::MirrorFailover);
        let b = Descriptor::new("Arch Linux", "Other", "Other", "aarch64", Mechanism::FlatDirectory);
        let c = Descriptor::new("EndeavourOS", "Arch-based", "Rolling", "x86_64", Mechanism::FlatDirectory);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn checksum_kind_follows_digest_length() {
        let sha256 = "a".repeat(64);
        let sha512 = "B".repeat(128);
        assert_eq!(Checksum::from_hex(&sha256).unwrap().kind(), ChecksumKind::Sha256);
        let long = Checksum::from_hex(&sha512).unwrap();
        assert_eq!(long.kind(), ChecksumKind::Sha512);
        assert_eq!(long.value(), "b".repeat(128));
        assert!(Checksum::from_hex("deadbeef").is_none());
        assert!(Checksum::from_hex(&"z".repeat(64)).is_none());
    }

    #[test]
    fn status_is_carried_by_variant_not_text() {
        let live = Resolution::Success {
            version: "Fallback Edition 1.0".into(),
            url: "https://example.org/x.iso".into(),
            checksum: None,
        };
        assert_eq!(live.status(), Status::Live);
        assert_eq!(live.display_version(), "Fallback Edition 1.0");

        let degraded: Resolution = KnownGood {
            version: "41".into(),
            url: "https://example.org/41.iso".into(),
        }
        .into();
        assert_eq!(degraded.status(), Status::Degraded);
        assert_eq!(degraded.display_version(), "41 (Fallback)");
        assert_eq!(degraded.url(), Some("https://example.org/41.iso"));

        let failed = Resolution::failed("connection refused");
        assert_eq!(failed.status(), Status::Failed);
        assert_eq!(failed.url(), None);
        assert_eq!(failed.status().label(), "Failed");
    }
}
