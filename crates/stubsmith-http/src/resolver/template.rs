//! `{{token}}` substitution from captured regex groups.
//!
//! # Supported tokens
//!
//! - `{{url.1}}`, `{{url.name}}` - URL capture groups (`url.0` is the whole match)
//! - `{{query.<param>}}`, `{{query.<param>.1}}` - query value and its groups
//! - `{{header.<name>}}`, `{{header.<name>.1}}` - header value and its groups
//! - `{{post.1}}` - request body regex groups
//!
//! Whitespace inside the braces is allowed. Tokens with no captured value
//! are left as they are.

use crate::matching::RegexGroups;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_token_regex() -> &'static Regex {
    TOKEN_REGEX.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("token pattern is valid")
    })
}

/// Replace every known `{{key}}` in `template` with its group value.
pub fn substitute<'a>(template: &'a str, groups: &RegexGroups) -> Cow<'a, str> {
    if groups.is_empty() {
        return Cow::Borrowed(template);
    }
    get_token_regex().replace_all(template, |caps: &regex::Captures| {
        match groups.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        }
    })
}

/// Check if a string contains tokens
pub fn has_tokens(s: &str) -> bool {
    get_token_regex().is_match(s)
}
