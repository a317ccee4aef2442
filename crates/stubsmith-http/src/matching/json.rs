//! Structural JSON pattern matching for request bodies.
//!
//! A pattern document is compared against a candidate document recursively:
//!
//! | pattern  | candidate must be                                             |
//! |----------|---------------------------------------------------------------|
//! | `null`   | `null` or absent                                              |
//! | string   | string, number or boolean whose text fully matches the regex  |
//! | number   | an equal number                                               |
//! | boolean  | an equal boolean                                              |
//! | array    | an array containing the pattern elements as a subsequence     |
//! | object   | an object where every pattern key matches; extra keys ignored |
//!
//! Malformed JSON or a type mismatch is simply a non-match.

use super::regex_cache::RegexCache;
use serde_json::Value;

/// Match a pattern document against a raw request body.
pub fn json_body_matches(pattern: &Value, body: &str, regexes: &RegexCache) -> bool {
    match serde_json::from_str::<Value>(body) {
        Ok(candidate) => json_matches(pattern, &candidate, regexes),
        Err(_) => false,
    }
}

/// Match a pattern document against a candidate document.
pub fn json_matches(pattern: &Value, candidate: &Value, regexes: &RegexCache) -> bool {
    matches_value(pattern, Some(candidate), regexes)
}

fn matches_value(pattern: &Value, candidate: Option<&Value>, regexes: &RegexCache) -> bool {
    match pattern {
        Value::Null => matches!(candidate, None | Some(Value::Null)),
        Value::String(expected) => {
            let text = match candidate {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                _ => return false,
            };
            string_matches(expected, &text, regexes)
        }
        Value::Number(expected) => match candidate {
            Some(Value::Number(actual)) => {
                actual == expected
                    || matches!((actual.as_f64(), expected.as_f64()), (Some(a), Some(e)) if a == e)
            }
            _ => false,
        },
        Value::Bool(expected) => matches!(candidate, Some(Value::Bool(actual)) if actual == expected),
        Value::Array(expected) => match candidate {
            Some(Value::Array(actual)) => subsequence_matches(expected, actual, regexes),
            _ => false,
        },
        Value::Object(expected) => match candidate {
            Some(Value::Object(actual)) => expected
                .iter()
                .all(|(key, value)| matches_value(value, actual.get(key), regexes)),
            _ => false,
        },
    }
}

fn string_matches(pattern: &str, text: &str, regexes: &RegexCache) -> bool {
    match regexes.get_or_compile(pattern) {
        Some(regex) => regex.is_match(text),
        None => pattern == text,
    }
}

/// Each pattern element must match a candidate element at or after the
/// cursor; the cursor never moves backwards.
fn subsequence_matches(pattern: &[Value], candidate: &[Value], regexes: &RegexCache) -> bool {
    let mut cursor = 0;
    for expected in pattern {
        loop {
            let Some(actual) = candidate.get(cursor) else {
                return false;
            };
            cursor += 1;
            if matches_value(expected, Some(actual), regexes) {
                break;
            }
        }
    }
    true
}
