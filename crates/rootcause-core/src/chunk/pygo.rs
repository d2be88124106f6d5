//! Python and Go construct detection.
//!
//! Both languages are formatted predictably enough that top-level
//! constructs can be found from keywords at column 0. Python bodies are
//! delimited by indentation; gofmt'd Go bodies (including `var (` and
//! `const (` groups) close with `}` or `)` at column 0.

use regex::Regex;
use std::sync::LazyLock;

use super::{ChunkError, SourceLines, Span};
use crate::models::ChunkType;

static PY_FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:async\s+)?def\s+\w+").unwrap());
static PY_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^class\s+\w+").unwrap());

static GO_FUNC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^func\b").unwrap());
static GO_SHAPED_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^type\s+\w+(?:\[[^\]]*\])?\s+(?:struct|interface)\b").unwrap()
});
static GO_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^type\b").unwrap());
static GO_DECL_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:var|const)\s*\(").unwrap());

/// Open triple-quote delimiter after processing `line`, if any.
fn triple_quote_state(line: &str, mut open: Option<&'static str>) -> Option<&'static str> {
    let mut rest = line;
    loop {
        match open {
            Some(delim) => match rest.find(delim) {
                Some(pos) => {
                    rest = &rest[pos + 3..];
                    open = None;
                }
                None => return open,
            },
            None => {
                let dq = rest.find("\"\"\"");
                let sq = rest.find("'''");
                let (pos, delim) = match (dq, sq) {
                    (Some(d), Some(s)) if s < d => (s, "'''"),
                    (Some(d), _) => (d, "\"\"\""),
                    (None, Some(s)) => (s, "'''"),
                    (None, None) => return None,
                };
                rest = &rest[pos + 3..];
                open = Some(delim);
            }
        }
    }
}

fn py_leading_trivia(lines: &SourceLines<'_>, start: usize, floor: usize) -> usize {
    let mut idx = start;
    while idx > floor {
        let prev = lines.get(idx - 1);
        if !(prev.starts_with('@') || prev.starts_with('#')) {
            break;
        }
        idx -= 1;
    }
    idx
}

/// Whether a column-0 line continues the current definition, such as the
/// `) -> int:` closing a multi-line signature.
fn py_continues(line: &str) -> bool {
    line.starts_with([')', ']', '}'])
}

pub(crate) fn find_python_constructs(lines: &SourceLines<'_>) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut triple: Option<&'static str> = None;
    let mut floor = 0;
    let mut i = 0;

    while i < lines.len() {
        let line = lines.get(i);
        let kind = if triple.is_some() {
            None
        } else if PY_FUNCTION_RE.is_match(line) {
            Some(ChunkType::Function)
        } else if PY_CLASS_RE.is_match(line) {
            Some(ChunkType::Class)
        } else {
            None
        };
        triple = triple_quote_state(line, triple);

        let Some(kind) = kind else {
            i += 1;
            continue;
        };

        let mut end = i;
        let mut j = i + 1;
        while j < lines.len() {
            let body = lines.get(j);
            let in_string = triple.is_some();
            triple = triple_quote_state(body, triple);
            // Column-0 comments inside a body do not end it.
            if body.trim().is_empty() || (!in_string && body.starts_with('#')) {
                j += 1;
                continue;
            }
            let dedented = !body.starts_with([' ', '\t']);
            if !in_string && dedented && !py_continues(body) {
                break;
            }
            end = j;
            j += 1;
        }

        spans.push(Span::new(py_leading_trivia(lines, i, floor), end, kind));
        floor = end + 1;
        i = j;
    }

    spans
}

/// Net count of unclosed `{` and `(` on a line, ignoring string and rune
/// literals and trailing `//` comments.
fn go_net_open(line: &str) -> i64 {
    let mut net = 0i64;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' && q != '`' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' | '`' => quote = Some(c),
                '/' if chars.peek() == Some(&'/') => break,
                '{' | '(' => net += 1,
                '}' | ')' => net -= 1,
                _ => {}
            },
        }
    }
    net
}

fn go_leading_trivia(lines: &SourceLines<'_>, start: usize, floor: usize) -> usize {
    let mut idx = start;
    while idx > floor && lines.get(idx - 1).starts_with("//") {
        idx -= 1;
    }
    idx
}

pub(crate) fn find_go_constructs(lines: &SourceLines<'_>) -> Result<Vec<Span>, ChunkError> {
    let mut spans = Vec::new();
    let mut floor = 0;
    let mut i = 0;

    while i < lines.len() {
        let line = lines.get(i);
        let kind = if GO_FUNC_RE.is_match(line) {
            ChunkType::Function
        } else if GO_SHAPED_TYPE_RE.is_match(line) {
            ChunkType::Class
        } else if GO_TYPE_RE.is_match(line) || GO_DECL_GROUP_RE.is_match(line) {
            ChunkType::Block
        } else {
            i += 1;
            continue;
        };

        let mut end = i;
        if go_net_open(line) > 0 {
            let closer = (i + 1..lines.len()).find(|&j| {
                let body = lines.get(j);
                body.starts_with(['}', ')']) && !body.trim_end().ends_with('{')
            });
            end = closer.ok_or(ChunkError::UnbalancedBraces { line: i + 1 })?;
        }

        spans.push(Span::new(go_leading_trivia(lines, i, floor), end, kind));
        floor = end + 1;
        i = end + 1;
    }

    Ok(spans)
}
