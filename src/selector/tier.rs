use std::fmt;

/// Selection priority. Higher tiers always win over higher versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tier(u8);

impl Tier {
    /// Rawhide, betas, release candidates.
    pub const PRERELEASE: Tier = Tier(0);
    /// Named but not flagged stable.
    pub const UNSTABLE: Tier = Tier(1);
    pub const STABLE: Tier = Tier(2);

    /// Tier for a release label and its upstream stability flag.
    pub fn classify(label: &str, stable: bool) -> Self {
        if is_prerelease(label) {
            Self::PRERELEASE
        } else if stable {
            Self::STABLE
        } else {
            Self::UNSTABLE
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.0)
    }
}

const PRERELEASE_WORDS: &[&str] = &["rawhide", "beta", "alpha", "rc", "pre", "preview", "test", "testing", "daily"];

/// Word-level check so that e.g. "source" is not mistaken for an "rc".
pub fn is_prerelease(label: &str) -> bool {
    label
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| {
            let stem = token.trim_end_matches(|c: char| c.is_ascii_digit());
            PRERELEASE_WORDS.contains(&stem)
        })
}
