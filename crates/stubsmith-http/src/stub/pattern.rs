//! Literal-or-regex string patterns used for URLs, query values, headers and
//! request bodies.

use crate::matching::{RegexCache, RegexGroups};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Characters whose presence marks a configured value as a regular expression.
const REGEX_METACHARACTERS: &[char] = &[
    '^', '$', '(', ')', '[', ']', '*', '+', '?', '{', '}', '|', '\\',
];

/// A configured string pattern.
#[derive(Clone)]
pub enum Pattern {
    /// Exact string equality
    Literal(String),
    /// Full-match regular expression
    Regex { source: String, regex: Arc<Regex> },
}

impl Pattern {
    pub fn literal(value: impl Into<String>) -> Self {
        Pattern::Literal(value.into())
    }

    /// Classify `source`: values containing regex metacharacters become
    /// regexes, everything else is literal. A regex that fails to compile is
    /// downgraded to a literal, which in practice never matches.
    pub fn classify(source: &str, regexes: &RegexCache) -> Self {
        if source.contains(REGEX_METACHARACTERS) {
            Self::regex(source, regexes)
        } else {
            Pattern::literal(source)
        }
    }

    /// Always treat `source` as a regex, falling back to a literal if it
    /// does not compile.
    pub fn regex(source: &str, regexes: &RegexCache) -> Self {
        match regexes.get_or_compile(source) {
            Some(regex) => Pattern::Regex {
                source: source.to_string(),
                regex,
            },
            None => Pattern::literal(source),
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Pattern::Literal(value) => value,
            Pattern::Regex { source, .. } => source,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Pattern::Regex { .. })
    }

    /// Match `candidate`, recording capture groups under `prefix` on success.
    /// Nothing is recorded on failure, or when a regex pattern is satisfied
    /// by plain equality with its own source.
    pub fn capture(&self, candidate: &str, prefix: &str, groups: &mut RegexGroups) -> bool {
        match self {
            Pattern::Literal(value) => value == candidate,
            Pattern::Regex { source, .. } if source == candidate => true,
            Pattern::Regex { regex, .. } => match regex.captures(candidate) {
                Some(captures) => {
                    groups.record_captures(prefix, regex, &captures);
                    true
                }
                None => false,
            },
        }
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        match self {
            Pattern::Literal(value) => value == candidate,
            Pattern::Regex { source, regex } => source == candidate || regex.is_match(candidate),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.is_regex() == other.is_regex() && self.source() == other.source()
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Pattern::Regex { source, .. } => f.debug_tuple("Regex").field(source).finish(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}
