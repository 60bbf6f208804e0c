//! Search query normalization.
//!
//! A raw search request (three optional free-text filters plus the
//! personal flag) is reduced to a canonical [`SearchQuery`]: filters are
//! trimmed and lowercased, and empty filters become absent. The
//! normalized form determines both the store predicate and the cache
//! key, so two requests that differ only in casing or whitespace share
//! one cache entry.

/// Sentinel used in cache keys for an absent filter.
const KEY_SENTINEL: &str = "all";

/// A normalized, ephemeral search query.
///
/// Equivalence of two queries (and therefore cache-key identity) is
/// equality of the three normalized filters plus the `personal` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub subject: Option<String>,
    pub class_name: Option<String>,
    pub school: Option<String>,
    /// True only when an academy caller asked for its own documents.
    /// Personal queries are never cached.
    pub personal: bool,
}

/// Trim and lowercase a raw filter; empty after trimming means absent.
fn normalize_filter(raw: &str) -> Option<String> {
    let cleaned = raw.trim().to_lowercase();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

impl SearchQuery {
    /// Build a normalized query from raw inputs. Inputs are coerced,
    /// never rejected.
    pub fn normalize(subject: &str, class_name: &str, school: &str, personal: bool) -> SearchQuery {
        SearchQuery {
            subject: normalize_filter(subject),
            class_name: normalize_filter(class_name),
            school: normalize_filter(school),
            personal,
        }
    }

    /// Cache key for this query, or `None` for personal queries.
    ///
    /// The key places the filters positionally (subject, class, school)
    /// with absent filters replaced by `all`, so a caller's private
    /// result set can never be keyed, and equivalent queries always
    /// produce the identical key.
    pub fn cache_key(&self) -> Option<String> {
        if self.personal {
            return None;
        }
        Some(format!(
            "search:{}:{}:{}",
            self.subject.as_deref().unwrap_or(KEY_SENTINEL),
            self.class_name.as_deref().unwrap_or(KEY_SENTINEL),
            self.school.as_deref().unwrap_or(KEY_SENTINEL),
        ))
    }

    /// True when no filter is present (match everything).
    pub fn is_unfiltered(&self) -> bool {
        self.subject.is_none() && self.class_name.is_none() && self.school.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        let q = SearchQuery::normalize("  MaTh ", "10TH GRADE", " dps", false);
        assert_eq!(q.subject.as_deref(), Some("math"));
        assert_eq!(q.class_name.as_deref(), Some("10th grade"));
        assert_eq!(q.school.as_deref(), Some("dps"));
    }

    #[test]
    fn test_empty_and_whitespace_filters_are_absent() {
        let q = SearchQuery::normalize("", "   ", "\t", false);
        assert!(q.is_unfiltered());
        assert_eq!(q.cache_key().as_deref(), Some("search:all:all:all"));
    }

    #[test]
    fn test_normalization_idempotent() {
        let once = SearchQuery::normalize(" Math ", "10th", " DPS ", false);
        let twice = SearchQuery::normalize(
            once.subject.as_deref().unwrap_or(""),
            once.class_name.as_deref().unwrap_or(""),
            once.school.as_deref().unwrap_or(""),
            false,
        );
        assert_eq!(once, twice);
        assert_eq!(once.cache_key(), twice.cache_key());
    }

    #[test]
    fn test_casing_variants_share_a_key() {
        let keys: Vec<_> = [" Math ", "math", "MATH", "  mAtH"]
            .iter()
            .map(|s| SearchQuery::normalize(s, "", "", false).cache_key().unwrap())
            .collect();
        assert!(keys.iter().all(|k| k == "search:math:all:all"));
    }

    #[test]
    fn test_personal_queries_have_no_key() {
        let q = SearchQuery::normalize("math", "10th", "dps", true);
        assert_eq!(q.cache_key(), None);
    }

    #[test]
    fn test_key_is_positional() {
        // The same filter text in different positions must not collide.
        let by_subject = SearchQuery::normalize("dps", "", "", false);
        let by_school = SearchQuery::normalize("", "", "dps", false);
        assert_ne!(by_subject.cache_key(), by_school.cache_key());
    }
}
