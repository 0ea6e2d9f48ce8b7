use std::sync::OnceLock;

use regex::Regex;

fn date_regex() -> &'static Regex {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    DATE_RE.get_or_init(|| {
        Regex::new(r"^(?P<y>\d{4})[.\-_]?(?P<m>\d{2})[.\-_]?(?P<d>\d{2})$")
            .expect("invalid date version regex")
    })
}

/// Comparable form of a version string.
///
/// Keys compare component-wise, so `22.10 > 22.4 > 9.5` and date stamps
/// order chronologically.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionKey(Vec<u64>);

impl VersionKey {
    /// Dot-separated numeric parse. Leading non-digits are skipped, each
    /// component contributes its leading digit run, and components without
    /// one are ignored. Never fails.
    pub fn numeric(raw: &str) -> Self {
        let trimmed = raw.trim().trim_start_matches(|c: char| !c.is_ascii_digit());
        let parts = trimmed
            .split('.')
            .filter_map(|component| {
                let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    None
                } else {
                    Some(digits.parse::<u64>().unwrap_or(0))
                }
            })
            .collect();
        Self(parts)
    }

    /// `YYYY.MM.DD`, `YYYY-MM-DD` or `YYYYMMDD`.
    pub fn date(raw: &str) -> Option<Self> {
        let caps = date_regex().captures(raw.trim())?;
        let year: u64 = caps["y"].parse().ok()?;
        let month: u64 = caps["m"].parse().ok()?;
        let day: u64 = caps["d"].parse().ok()?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        Some(Self(vec![year, month, day]))
    }

    /// Date parse when the string is date-shaped, numeric otherwise.
    pub fn parse(raw: &str) -> Self {
        Self::date(raw).unwrap_or_else(|| Self::numeric(raw))
    }

    #[cfg(test)]
    pub fn components(&self) -> &[u64] {
        &self.0
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::VersionKey;

    #[test]
    fn numeric_order_matches_intent() {
        assert!(VersionKey::numeric("22.10") > VersionKey::numeric("22.4"));
        assert!(VersionKey::numeric("22.4") > VersionKey::numeric("9.5"));
        assert!(VersionKey::numeric("10.0.12") > VersionKey::numeric("10.0.6"));
    }

    #[test]
    fn numeric_tolerates_trailing_garbage() {
        assert_eq!(VersionKey::numeric("10.0.6-rc1").components(), &[10, 0, 6]);
        assert_eq!(VersionKey::numeric("22.04 LTS").components(), &[22, 4]);
        assert_eq!(VersionKey::numeric("v1.2").components(), &[1, 2]);
        assert_eq!(VersionKey::numeric("1.x.3").components(), &[1, 3]);
        assert!(VersionKey::numeric("Rolling").is_empty());
    }

    #[test]
    fn dates_order_chronologically() {
        let early = VersionKey::date("2024.01.01").unwrap();
        let later = VersionKey::date("2024.06.15").unwrap();
        assert!(early < later);
        assert_eq!(VersionKey::date("20250109").unwrap().components(), &[2025, 1, 9]);
        assert_eq!(VersionKey::date("2024-03-01").unwrap().components(), &[2024, 3, 1]);
    }

    #[test]
    fn date_rejects_non_dates() {
        assert!(VersionKey::date("22.04").is_none());
        assert!(VersionKey::date("2024.13.01").is_none());
        assert!(VersionKey::date("kali-2024.01.01").is_none());
    }

    #[test]
    fn parse_prefers_date_shape() {
        assert_eq!(VersionKey::parse("2024.03.01").components(), &[2024, 3, 1]);
        assert_eq!(VersionKey::parse("24.1").components(), &[24, 1]);
    }
}
