//! TypeScript / JavaScript construct detection.

use regex::Regex;
use std::sync::LazyLock;

use super::scanner::{BraceScanner, Stop};
use super::{ChunkError, SourceLines, Span};
use crate::models::ChunkType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construct {
    Function,
    Class,
    /// `type X = ...`: a class when it has an object shape, else a block.
    TypeAlias,
}

static PATTERNS: LazyLock<Vec<(Regex, Construct)>> = LazyLock::new(|| {
    [
        (
            r"^(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:async\s+)?function\b",
            Construct::Function,
        ),
        (
            r"^(?:export\s+)?(?:const|let|var)\s+[A-Za-z_$][\w$]*\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|\(\s*$|[A-Za-z_$][\w$]*\s*=>)",
            Construct::Function,
        ),
        (
            r"^(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?class\b",
            Construct::Class,
        ),
        (
            r"^(?:export\s+)?(?:declare\s+)?interface\s+[A-Za-z_$]",
            Construct::Class,
        ),
        (
            r"^(?:export\s+)?(?:declare\s+)?(?:const\s+)?enum\s+[A-Za-z_$]",
            Construct::Class,
        ),
        (
            r"^(?:export\s+)?(?:declare\s+)?type\s+[A-Za-z_$][\w$]*\s*(?:<[^=]*>\s*)?=",
            Construct::TypeAlias,
        ),
    ]
    .into_iter()
    .map(|(src, construct)| (Regex::new(src).unwrap(), construct))
    .collect()
});

fn match_construct(line: &str) -> Option<Construct> {
    PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(line))
        .map(|(_, construct)| *construct)
}

fn next_construct_start(lines: &SourceLines<'_>, from: usize) -> Option<usize> {
    (from..lines.len()).find(|&i| match_construct(lines.get(i)).is_some())
}

/// Comment and decorator lines directly above a construct belong to it.
fn leading_trivia_start(lines: &SourceLines<'_>, start: usize, floor: usize) -> usize {
    let mut idx = start;
    while idx > floor {
        let prev = lines.get(idx - 1).trim_start();
        let trivia = prev.starts_with("//")
            || prev.starts_with("/*")
            || prev.starts_with('*')
            || prev.starts_with('@');
        if !trivia {
            break;
        }
        idx -= 1;
    }
    idx
}

/// Last line of the construct starting at `start` and whether it had a
/// braced body.
fn find_construct_end(
    lines: &SourceLines<'_>,
    start: usize,
    next_start: Option<usize>,
) -> Result<(usize, bool), ChunkError> {
    let mut scanner = BraceScanner::default();

    for idx in start..lines.len() {
        if Some(idx) == next_start && !scanner.opened() {
            return Ok((idx - 1, false));
        }
        match scanner.scan_line(lines.get(idx)) {
            Some(Stop::Closed) => return Ok((idx, true)),
            Some(Stop::Terminated) => return Ok((idx, false)),
            None => {}
        }
    }

    if scanner.opened() {
        Err(ChunkError::UnbalancedBraces { line: start + 1 })
    } else {
        Ok((lines.last_index(), false))
    }
}

/// Find top-level constructs. Lines inside a construct are never tested
/// for a new start, so a template literal line that happens to begin
/// with `function` does not split its enclosing construct.
pub(crate) fn find_constructs(lines: &SourceLines<'_>) -> Result<Vec<Span>, ChunkError> {
    let mut spans = Vec::new();
    let mut floor = 0;
    let mut i = 0;

    while i < lines.len() {
        let Some(construct) = match_construct(lines.get(i)) else {
            i += 1;
            continue;
        };

        let next = next_construct_start(lines, i + 1);
        let (end, braced) = find_construct_end(lines, i, next)?;
        let kind = match construct {
            Construct::Function => ChunkType::Function,
            Construct::Class => ChunkType::Class,
            Construct::TypeAlias if braced => ChunkType::Class,
            Construct::TypeAlias => ChunkType::Block,
        };

        spans.push(Span::new(leading_trivia_start(lines, i, floor), end, kind));
        i = end + 1;
        floor = i;
    }

    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans_of(src: &str) -> Vec<Span> {
        find_constructs(&SourceLines::new(src)).unwrap()
    }

    #[test]
    fn test_patterns() {
        let functions = [
            "function a() {",
            "export function a() {",
            "export default function () {",
            "export async function load() {",
            "function* gen() {",
            "const f = () => {",
            "export const handler = async (req, res) => {",
            "const typed: Handler = (req) => {",
            "let g = x => x * 2;",
            "const h = function () {",
            "const multi = async (",
        ];
        for line in functions {
            assert_eq!(match_construct(line), Some(Construct::Function), "{}", line);
        }

        let classes = [
            "class A {",
            "export default class App extends Component {",
            "export abstract class Base {",
            "export interface Props {",
            "interface State {",
            "enum Color {",
            "export const enum Flags {",
        ];
        for line in classes {
            assert_eq!(match_construct(line), Some(Construct::Class), "{}", line);
        }

        assert_eq!(match_construct("export type Id = string;"), Some(Construct::TypeAlias));
        assert_eq!(match_construct("type Box<T> = {"), Some(Construct::TypeAlias));

        let none = [
            "  function nested() {",
            "const x = 5;",
            "import { a } from 'b';",
            "export { a, b };",
            "if (x) {",
        ];
        for line in none {
            assert_eq!(match_construct(line), None, "{}", line);
        }
    }

    #[test]
    fn test_type_alias_without_brace_ends_at_semicolon() {
        let spans = spans_of("type A = string;\nexport type B =\n  | 'x'\n  | 'y';\n");
        assert_eq!(
            spans,
            vec![
                Span::new(0, 0, ChunkType::Block),
                Span::new(1, 3, ChunkType::Block),
            ]
        );
    }

    #[test]
    fn test_type_alias_without_semicolon_ends_before_next_construct() {
        let spans = spans_of("type A = string\n\nfunction f() {\n  return 1\n}\n");
        assert_eq!(
            spans,
            vec![
                Span::new(0, 1, ChunkType::Block),
                Span::new(2, 4, ChunkType::Function),
            ]
        );
    }

    #[test]
    fn test_object_type_is_class() {
        let spans = spans_of("export type Props = {\n  a: string;\n  b: number;\n};\n");
        assert_eq!(spans, vec![Span::new(0, 3, ChunkType::Class)]);
    }

    #[test]
    fn test_arrow_expression_body() {
        let spans = spans_of("export const add = (a, b) => a + b;\nconst x = 1;\n");
        assert_eq!(spans, vec![Span::new(0, 0, ChunkType::Function)]);
    }

    #[test]
    fn test_leading_comments_and_decorators_attach() {
        let src = "import x from 'x';\n/**\n * Docs.\n */\n@Injectable()\nexport class Svc {\n}\n";
        let spans = spans_of(src);
        assert_eq!(spans, vec![Span::new(1, 6, ChunkType::Class)]);
    }

    #[test]
    fn test_template_line_starting_with_keyword_is_not_a_boundary() {
        let src = "const tpl = () => {\n  return `\nfunction fake() {\n`;\n}\nfunction real() {\n}\n";
        let spans = spans_of(src);
        assert_eq!(
            spans,
            vec![
                Span::new(0, 4, ChunkType::Function),
                Span::new(5, 6, ChunkType::Function),
            ]
        );
    }

    #[test]
    fn test_destructured_and_object_typed_headers() {
        let src = "export const Button = ({ label, onClick }) => {\n  return label;\n};\n\nexport function opts({ a, b }: Opts) {\n  return a + b;\n}\n\nfunction shape(): { a: string } {\n  return { a: '' };\n}\n";
        let spans = spans_of(src);
        assert_eq!(
            spans,
            vec![
                Span::new(0, 2, ChunkType::Function),
                Span::new(4, 6, ChunkType::Function),
                Span::new(8, 10, ChunkType::Function),
            ]
        );
    }

    #[test]
    fn test_unbalanced_is_error() {
        let lines = SourceLines::new("function a() {\n  if (b) {\n}\n");
        assert!(matches!(
            find_constructs(&lines),
            Err(ChunkError::UnbalancedBraces { line: 1 })
        ));
    }
}
