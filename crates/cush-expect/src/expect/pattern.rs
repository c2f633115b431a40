//! Pattern types for expect operations.
//!
//! A pattern is either a literal substring or a compiled regular expression.
//! The variant is fixed when the pattern is built; matching always runs over
//! raw bytes so output that is not valid UTF-8 cannot hide a match.

use std::fmt;

use regex::bytes::Regex;

/// A pattern that can be matched against shell output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact string.
    Literal(String),

    /// Match a regular expression.
    Regex(CompiledRegex),
}

impl Pattern {
    /// Create a literal pattern.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self::Regex(CompiledRegex::new(pattern.to_string(), regex)))
    }

    /// Get the pattern as a string for display purposes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.pattern(),
        }
    }

    /// Whether the pattern can match without consuming any output.
    #[must_use]
    pub fn matches_empty(&self) -> bool {
        match self {
            Self::Literal(s) => s.is_empty(),
            Self::Regex(r) => r.find(b"").is_some(),
        }
    }

    /// Find the first occurrence of this pattern in `haystack`.
    ///
    /// Positions in the result are relative to `haystack`.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<PatternMatch> {
        match self {
            Self::Literal(s) => find_literal(haystack, s.as_bytes()).map(|start| PatternMatch {
                start,
                end: start + s.len(),
                captures: Vec::new(),
            }),
            Self::Regex(r) => r.find(haystack),
        }
    }
}

fn find_literal(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

impl From<&String> for Pattern {
    fn from(s: &String) -> Self {
        Self::Literal(s.clone())
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Self::Regex(CompiledRegex::new(regex.as_str().to_string(), regex))
    }
}

/// A compiled regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Create a new compiled regex.
    #[must_use]
    pub const fn new(pattern: String, regex: Regex) -> Self {
        Self { pattern, regex }
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Find the first match along with its capture groups.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<PatternMatch> {
        let caps = self.regex.captures(haystack)?;
        let whole = caps.get(0)?;
        let captures = caps
            .iter()
            .skip(1) // Skip the full match
            .map(|m| m.map_or_else(String::new, |m| String::from_utf8_lossy(m.as_bytes()).into_owned()))
            .collect();

        Some(PatternMatch {
            start: whole.start(),
            end: whole.end(),
            captures,
        })
    }
}

/// Location of a pattern occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Start position.
    pub start: usize,
    /// End position (exclusive).
    pub end: usize,
    /// Capture groups (unmatched optional groups are empty strings).
    pub captures: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_finds_first_occurrence() {
        let pattern = Pattern::literal("cush> ");
        let m = pattern.find(b"boot\r\ncush> info\r\ncush> ").expect("match");
        assert_eq!((m.start, m.end), (6, 12));
        assert!(m.captures.is_empty());
    }

    #[test]
    fn literal_longer_than_haystack() {
        assert!(Pattern::literal("Hostname:").find(b"Host").is_none());
    }

    #[test]
    fn regex_reports_captures() {
        let pattern = Pattern::regex(r"(\d+): (\w+)").expect("valid regex");
        let m = pattern.find(b"history\r\n1: echo hello\r\n").expect("match");
        assert_eq!(&b"history\r\n1: echo hello\r\n"[m.start..m.end], b"1: echo");
        assert_eq!(m.captures, vec!["1".to_string(), "echo".to_string()]);
    }

    #[test]
    fn regex_matches_across_invalid_utf8() {
        let pattern = Pattern::regex("Hostname: [a-z]+").expect("valid regex");
        let m = pattern.find(b"\xff\xfeHostname: box").expect("match");
        assert_eq!(m.start, 2);
    }

    #[test]
    fn empty_matching_patterns_are_detected() {
        assert!(Pattern::literal("").matches_empty());
        assert!(Pattern::regex("a*").expect("valid regex").matches_empty());
        assert!(!Pattern::literal("cush> ").matches_empty());
        assert!(!Pattern::regex(r"\d+").expect("valid regex").matches_empty());
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(Pattern::regex("(unclosed").is_err());
    }

    #[test]
    fn display_and_conversions() {
        let from_str: Pattern = "hello".into();
        assert_eq!(from_str.to_string(), "hello");
        assert_eq!(format!("{from_str:?}"), "Literal(\"hello\")");

        let from_regex: Pattern = Regex::new(r"\d+").expect("valid regex").into();
        assert_eq!(from_regex.as_str(), r"\d+");
        assert_eq!(format!("{from_regex:?}"), "Regex(\"\\\\d+\")");
    }
}
