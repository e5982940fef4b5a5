//! Mapping-file parsing.
//!
//! One rule per line, `<existingTargetQuery>:<newNamePattern>`. Blank lines
//! and lines starting with `#` or `//` are ignored. A line that does not
//! split into exactly two parts is rejected; the registry skips it with a
//! warning and keeps loading.

use crate::error::{Result, StyleError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MappingEntry {
    /// Query resolved against the registry's cached targets
    pub query: String,
    /// Name pattern appended to the resolved target (or seeding a new one)
    pub pattern: String,
}

/// Parse one mapping-file line. `Ok(None)` for ignorable lines.
pub(crate) fn parse_line(line: &str) -> Result<Option<MappingEntry>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() != 2 {
        return Err(StyleError::MappingEntry(line.to_string()));
    }

    Ok(Some(MappingEntry {
        query: parts[0].to_string(),
        pattern: parts[1].to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_query_and_pattern() {
        let entry = parse_line("QuickAccess:Foo.*").unwrap().unwrap();
        assert_eq!(entry.query, "QuickAccess");
        assert_eq!(entry.pattern, "Foo.*");
    }

    #[test]
    fn test_ignores_blank_and_comment_lines() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# comment").unwrap(), None);
        assert_eq!(parse_line("// comment").unwrap(), None);
    }

    #[test]
    fn test_rejects_lines_without_exactly_one_colon() {
        assert!(parse_line("garbage_no_colon").is_err());
        assert!(parse_line("a:b:c").is_err());
    }

    #[test]
    fn test_whitespace_is_trimmed_around_the_line_only() {
        let entry = parse_line("  QuickAccess:Foo.*  ").unwrap().unwrap();
        assert_eq!(entry.query, "QuickAccess");
        assert_eq!(entry.pattern, "Foo.*");
    }
}
