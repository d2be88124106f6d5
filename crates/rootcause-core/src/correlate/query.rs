//! Natural-language query for similarity search, built from an alert's
//! error patterns and affected endpoints.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::stack::is_internal_location;
use crate::models::ErrorPattern;

pub const DEFAULT_MAX_QUERY_LENGTH: usize = 2000;

const MAX_ERRORS: usize = 3;
const MAX_FUNCTIONS_PER_ERROR: usize = 3;
const MAX_ENDPOINTS: usize = 5;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static LONG_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4,}").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)\bat\s+(?:async\s+)?(?:new\s+)?([A-Za-z_$][\w$.]*)(?:\s+\[as\s+[^\]]+\])?\s+\(([^()]*)\)|\bin\s+([A-Za-z_]\w*)\s*$",
    )
    .unwrap()
});

fn clean_message(message: &str) -> String {
    let without_placeholders = PLACEHOLDER_RE.replace_all(message, " ");
    let without_ids = LONG_DIGITS_RE.replace_all(&without_placeholders, " ");
    WHITESPACE_RE
        .replace_all(&without_ids, " ")
        .trim()
        .to_string()
}

fn function_names(stack_trace: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in FUNCTION_RE.captures_iter(stack_trace) {
        // Runtime and dependency frames name no user function.
        if caps.get(2).is_some_and(|loc| is_internal_location(loc.as_str())) {
            continue;
        }
        let Some(name) = caps.get(1).or_else(|| caps.get(3)) else {
            continue;
        };
        let name = name.as_str().trim_end_matches('.');
        if name.is_empty() || names.iter().any(|n| n == name) {
            continue;
        }
        names.push(name.to_string());
        if names.len() == MAX_FUNCTIONS_PER_ERROR {
            break;
        }
    }
    names
}

fn endpoint_tokens(endpoint: &str) -> impl Iterator<Item = &str> {
    endpoint
        .split(['/', '-', '_', '.'])
        .filter(|token| token.chars().count() > 2)
}

/// Build the text that is embedded to find code related to an alert.
///
/// Takes the three most frequent errors (cleaned of bracketed
/// placeholders and digit runs of four or more), up to three function
/// names from each error's stack trace, and path tokens longer than two
/// characters from the first five endpoints. Repeated terms are kept
/// once. The result is cut to `max_length` characters.
pub fn build_search_query(
    error_patterns: &[ErrorPattern],
    endpoints: &[String],
    max_length: usize,
) -> String {
    let mut top: Vec<&ErrorPattern> = error_patterns.iter().collect();
    top.sort_by(|a, b| b.count.cmp(&a.count));
    top.truncate(MAX_ERRORS);

    let mut parts: Vec<String> = Vec::new();
    for error in top {
        let message = clean_message(&error.message);
        if !message.is_empty() {
            parts.push(message);
        }
        if let Some(trace) = &error.stack_trace {
            parts.extend(function_names(trace));
        }
    }
    for endpoint in endpoints.iter().take(MAX_ENDPOINTS) {
        parts.extend(endpoint_tokens(endpoint).map(String::from));
    }

    let mut seen = HashSet::new();
    let query = parts
        .into_iter()
        .filter(|part| seen.insert(part.clone()))
        .collect::<Vec<_>>()
        .join(" ");

    match query.char_indices().nth(max_length) {
        Some((cut, _)) => query[..cut].trim_end().to_string(),
        None => query,
    }
}
