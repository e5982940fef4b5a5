//! Identity rules and match predicates for styling targets.
//!
//! A target is identified by three independent rule sets: name patterns
//! (full-match regular expressions over a session's display name), url parts
//! (substrings of a session's address) and alias keywords (exact strings used
//! only for name-based lookups). Any one satisfied rule is sufficient.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use veneer_remote_interface::SessionInfo;

/// Sentinel wrapped around a query to force literal-address semantics,
/// e.g. `~store.example.com~`.
pub const LITERAL_ADDRESS_MARKER: char = '~';

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIdentity {
    /// Full-match regular expressions over a session's display name
    #[serde(default)]
    pub name_patterns: Vec<String>,

    /// Substrings of a session's address
    #[serde(default)]
    pub url_parts: Vec<String>,

    /// Exact-match alias keywords, used for name-based lookups only
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TargetIdentity {
    pub fn from_name_pattern(pattern: impl Into<String>) -> Self {
        Self {
            name_patterns: vec![pattern.into()],
            ..Self::default()
        }
    }

    pub fn from_url_part(part: impl Into<String>) -> Self {
        Self {
            url_parts: vec![part.into()],
            ..Self::default()
        }
    }

    /// Whether a live candidate session satisfies this identity.
    ///
    /// Url parts are checked first as plain substrings of the candidate's
    /// address; name patterns are then matched against the full display name.
    pub fn matches_session(&self, candidate: &SessionInfo) -> bool {
        for part in &self.url_parts {
            if candidate.address.contains(part.as_str()) {
                return true;
            }
        }

        for pattern in &self.name_patterns {
            if full_match(pattern, &candidate.display_name) {
                return true;
            }
        }

        false
    }

    /// Whether a textual query names this identity. Used for lookups that do
    /// not involve a live session: the query must equal a name pattern, a
    /// keyword, the currently resolved display name, or a url part (plain or
    /// wrapped in the literal-address marker).
    pub fn identifies(&self, query: &str, resolved_name: Option<&str>) -> bool {
        if self.name_patterns.iter().any(|p| p == query) {
            return true;
        }

        if self.keywords.iter().any(|k| k == query) {
            return true;
        }

        if resolved_name.is_some_and(|name| name == query) {
            return true;
        }

        if self.url_parts.iter().any(|u| u == query) {
            return true;
        }

        if let Some(inner) = literal_address(query) {
            return self.url_parts.iter().any(|u| u == inner);
        }

        false
    }

    /// Set-union migration used when one target absorbs another: appends each
    /// of `other`'s rules not already present, preserving order.
    pub fn absorb(&mut self, other: &TargetIdentity) {
        for pattern in &other.name_patterns {
            if !self.name_patterns.contains(pattern) {
                self.name_patterns.push(pattern.clone());
            }
        }

        for part in &other.url_parts {
            if !self.url_parts.contains(part) {
                self.url_parts.push(part.clone());
            }
        }

        for keyword in &other.keywords {
            if !self.keywords.contains(keyword) {
                self.keywords.push(keyword.clone());
            }
        }
    }
}

/// Unwrap a `~...~`-wrapped query into its inner address text. The inner text
/// must be non-empty.
pub fn literal_address(query: &str) -> Option<&str> {
    let inner = query
        .strip_prefix(LITERAL_ADDRESS_MARKER)?
        .strip_suffix(LITERAL_ADDRESS_MARKER)?;
    (!inner.is_empty()).then_some(inner)
}

/// Anchored full match of `pattern` against `name`. A pattern that fails to
/// compile never matches.
fn full_match(pattern: &str, name: &str) -> bool {
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(re) => re.is_match(name),
        Err(err) => {
            debug!(pattern, "name pattern failed to compile: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str, address: &str) -> SessionInfo {
        SessionInfo {
            display_name: name.to_string(),
            address: address.to_string(),
        }
    }

    #[test]
    fn test_url_part_matches_as_substring() {
        let identity = TargetIdentity::from_url_part("store.example.com");
        assert!(identity.matches_session(&session("Store", "https://store.example.com/app/1")));
        assert!(!identity.matches_session(&session("Store", "https://other.example.com/")));
    }

    #[test]
    fn test_name_pattern_is_full_match() {
        let identity = TargetIdentity::from_name_pattern("QuickAccess.*");
        assert!(identity.matches_session(&session("QuickAccess_2", "")));
        assert!(identity.matches_session(&session("QuickAccess", "")));
        // no partial matches in either direction
        let prefix = TargetIdentity::from_name_pattern("Quick");
        assert!(!prefix.matches_session(&session("QuickAccess", "")));
        let suffix = TargetIdentity::from_name_pattern("Menu");
        assert!(!suffix.matches_session(&session("MainMenu", "")));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let identity = TargetIdentity::from_name_pattern("[unclosed");
        assert!(!identity.matches_session(&session("[unclosed", "")));
    }

    #[test]
    fn test_identifies_by_each_rule_kind() {
        let identity = TargetIdentity {
            name_patterns: vec!["MainMenu.*".to_string()],
            url_parts: vec!["menu.internal".to_string()],
            keywords: vec!["All".to_string()],
        };

        assert!(identity.identifies("MainMenu.*", None));
        assert!(identity.identifies("All", None));
        assert!(identity.identifies("menu.internal", None));
        assert!(identity.identifies("~menu.internal~", None));
        assert!(identity.identifies("MainMenu_3", Some("MainMenu_3")));
        assert!(!identity.identifies("MainMenu_3", Some("MainMenu_4")));
        assert!(!identity.identifies("MainMenu_3", None));
    }

    #[test]
    fn test_literal_address_unwrapping() {
        assert_eq!(literal_address("~a.b~"), Some("a.b"));
        assert_eq!(literal_address("a.b"), None);
        assert_eq!(literal_address("~~"), None);
        assert_eq!(literal_address("~"), None);
    }

    #[test]
    fn test_absorb_unions_without_duplicates() {
        let mut primary = TargetIdentity {
            name_patterns: vec!["A".to_string()],
            url_parts: vec!["u1".to_string()],
            keywords: vec!["k1".to_string()],
        };
        let other = TargetIdentity {
            name_patterns: vec!["A".to_string(), "B".to_string()],
            url_parts: vec!["u2".to_string()],
            keywords: vec!["k1".to_string(), "k2".to_string()],
        };

        primary.absorb(&other);

        assert_eq!(primary.name_patterns, vec!["A", "B"]);
        assert_eq!(primary.url_parts, vec!["u1", "u2"]);
        assert_eq!(primary.keywords, vec!["k1", "k2"]);
    }
}
