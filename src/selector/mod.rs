//! Version ordering and candidate selection shared by every strategy.
//!
//! Candidates are ranked by tier first, then by version key, both descending.
//! The sort is stable, so equal candidates keep their discovery order and the
//! earliest one wins.

mod filter;
mod key;
mod tier;

pub use filter::{FileMatcher, Pattern};
pub use key::VersionKey;
pub use tier::{Tier, is_prerelease};

/// One discovered option: a ranking key, the raw version text and whatever the
/// resolver needs to turn it into a result (usually a URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<T> {
    pub tier: Tier,
    pub key: VersionKey,
    pub version: String,
    pub item: T,
}

impl<T> Candidate<T> {
    pub fn new(tier: Tier, version: impl Into<String>, item: T) -> Self {
        let version = version.into();
        let key = VersionKey::parse(&version);
        Self { tier, key, version, item }
    }
}

/// Stable sort, best first.
pub fn rank<T>(candidates: &mut [Candidate<T>]) {
    candidates.sort_by(|a, b| b.tier.cmp(&a.tier).then_with(|| b.key.cmp(&a.key)));
}

/// First candidate after [`rank`].
pub fn select_best<T>(mut candidates: Vec<Candidate<T>>) -> Option<Candidate<T>> {
    rank(&mut candidates);
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_dominates_version() {
        let candidates = vec![
            Candidate::new(Tier::STABLE, "10.0", "stable"),
            Candidate::new(Tier::PRERELEASE, "99.0-rawhide", "rawhide"),
            Candidate::new(Tier::UNSTABLE, "11.0", "named"),
        ];
        let best = select_best(candidates).unwrap();
        assert_eq!(best.item, "stable");
        assert_eq!(best.version, "10.0");
    }

    #[test]
    fn version_breaks_ties_within_tier() {
        let candidates = vec![
            Candidate::new(Tier::STABLE, "9.5", "a"),
            Candidate::new(Tier::STABLE, "22.10", "b"),
            Candidate::new(Tier::STABLE, "22.4", "c"),
        ];
        let mut ranked = candidates.clone();
        rank(&mut ranked);
        let order: Vec<&str> = ranked.iter().map(|c| c.item).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn equal_candidates_keep_discovery_order() {
        let candidates = vec![
            Candidate::new(Tier::UNSTABLE, "2024.4", "first"),
            Candidate::new(Tier::UNSTABLE, "2024.4", "second"),
        ];
        assert_eq!(select_best(candidates).unwrap().item, "first");
    }

    #[test]
    fn empty_pool_selects_nothing() {
        assert!(select_best::<()>(Vec::new()).is_none());
    }
}
