//! Heuristic code chunker.
//!
//! Splits a source file into [`CodeChunk`]s along semantic boundaries
//! (functions, classes, type declarations) found by per-language
//! heuristics rather than a full parser:
//!
//! | Strategy | Languages | Boundaries |
//! |----------|-----------|------------|
//! | [`ChunkStrategy::TsJsHeuristic`] | typescript, javascript | anchored regexes + string-aware brace matching |
//! | [`ChunkStrategy::PyGoHeuristic`] | python, go | keywords + indentation / column-0 closers |
//! | [`ChunkStrategy::Fallback`] | everything else | line and byte accounting |
//!
//! Every strategy feeds the same post-processing: gaps between
//! constructs become `block` chunks, oversized chunks are split, and
//! undersized chunks are merged into a neighbour. Content hashes are
//! computed last, from the final text.
//!
//! The chunker never fails. Unbalanced braces, inconsistent spans, or
//! a file with no recognizable constructs all fall back to the
//! line-based strategy.

mod fallback;
mod pygo;
mod scanner;
mod tsjs;

use thiserror::Error;

use crate::hash::generate_content_hash;
use crate::language::detect_language;
use crate::models::{ChunkType, CodeChunk};

/// Size bounds applied to every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub max_lines: usize,
    pub max_bytes: usize,
    pub min_lines: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_lines: 500,
            max_bytes: 10 * 1024,
            min_lines: 10,
        }
    }
}

/// Internal failures of a heuristic strategy. Never surfaced to callers.
#[derive(Debug, Error)]
pub(crate) enum ChunkError {
    #[error("unbalanced braces in construct starting at line {line}")]
    UnbalancedBraces { line: usize },
    #[error("construct spans overlap or fall outside the file")]
    InvalidSpans,
}

/// Boundary detection strategy, chosen from the detected language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    TsJsHeuristic,
    PyGoHeuristic,
    Fallback,
}

impl ChunkStrategy {
    pub fn for_language(language: Option<&str>) -> Self {
        match language {
            Some("typescript") | Some("javascript") => ChunkStrategy::TsJsHeuristic,
            Some("python") | Some("go") => ChunkStrategy::PyGoHeuristic,
            _ => ChunkStrategy::Fallback,
        }
    }

    /// Find construct spans. An empty result means no boundaries were
    /// recognized.
    fn constructs(
        &self,
        lines: &SourceLines<'_>,
        language: Option<&str>,
        limits: &ChunkLimits,
    ) -> Result<Vec<Span>, ChunkError> {
        match self {
            ChunkStrategy::TsJsHeuristic => tsjs::find_constructs(lines),
            ChunkStrategy::PyGoHeuristic if language == Some("go") => pygo::find_go_constructs(lines),
            ChunkStrategy::PyGoHeuristic => Ok(pygo::find_python_constructs(lines)),
            ChunkStrategy::Fallback => Ok(fallback::split_range(lines, 0, lines.last_index(), limits)),
        }
    }
}

/// 0-based, inclusive line range with its chunk type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: ChunkType,
}

impl Span {
    pub(crate) fn new(start: usize, end: usize, kind: ChunkType) -> Self {
        Self { start, end, kind }
    }

    fn line_count(&self) -> usize {
        self.end + 1 - self.start
    }
}

/// A file split into lines, without their `\n` terminators.
pub(crate) struct SourceLines<'a> {
    lines: Vec<&'a str>,
}

impl<'a> SourceLines<'a> {
    pub(crate) fn new(content: &'a str) -> Self {
        let mut lines: Vec<&str> = content.split('\n').collect();
        if content.ends_with('\n') && lines.len() > 1 {
            lines.pop();
        }
        Self { lines }
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn last_index(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    pub(crate) fn get(&self, idx: usize) -> &'a str {
        self.lines[idx]
    }

    pub(crate) fn is_blank(&self, idx: usize) -> bool {
        self.lines[idx].trim().is_empty()
    }

    /// Byte length of lines `start..=end` joined with `\n`.
    pub(crate) fn byte_len(&self, start: usize, end: usize) -> usize {
        self.lines[start..=end].iter().map(|l| l.len()).sum::<usize>() + (end - start)
    }

    pub(crate) fn text(&self, start: usize, end: usize) -> String {
        self.lines[start..=end].join("\n")
    }

    pub(crate) fn fits(&self, start: usize, end: usize, limits: &ChunkLimits) -> bool {
        end + 1 - start <= limits.max_lines && self.byte_len(start, end) <= limits.max_bytes
    }
}

/// Chunk a file with the default [`ChunkLimits`].
///
/// `language` overrides extension-based detection when given.
///
/// ```rust
/// use rootcause_core::chunk::chunk_code;
/// use rootcause_core::models::ChunkType;
///
/// let chunks = chunk_code("export const x = 1;\n", "src/x.ts", None);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].chunk_type, ChunkType::Module);
/// ```
pub fn chunk_code(content: &str, file_path: &str, language: Option<&str>) -> Vec<CodeChunk> {
    chunk_code_with_limits(content, file_path, language, &ChunkLimits::default())
}

/// Chunk a file with explicit size limits.
pub fn chunk_code_with_limits(
    content: &str,
    file_path: &str,
    language: Option<&str>,
    limits: &ChunkLimits,
) -> Vec<CodeChunk> {
    let language = language.or_else(|| detect_language(file_path));
    let lines = SourceLines::new(content);

    if lines.len() <= limits.max_lines && content.len() <= limits.max_bytes {
        return vec![CodeChunk {
            file_path: file_path.to_string(),
            start_line: 1,
            end_line: lines.len(),
            content: content.to_string(),
            content_hash: generate_content_hash(content),
            language: language.map(str::to_string),
            chunk_type: ChunkType::Module,
        }];
    }

    let strategy = ChunkStrategy::for_language(language);
    let spans = match strategy
        .constructs(&lines, language, limits)
        .and_then(|constructs| validate_spans(constructs, lines.len()))
    {
        Ok(constructs) if !constructs.is_empty() => fill_gaps(&lines, constructs),
        Ok(_) => {
            tracing::debug!(file = file_path, "no construct boundaries found, using line-based chunking");
            fallback::split_range(&lines, 0, lines.last_index(), limits)
        }
        Err(e) => {
            tracing::debug!(file = file_path, error = %e, "heuristic chunking failed, using line-based chunking");
            fallback::split_range(&lines, 0, lines.last_index(), limits)
        }
    };

    let spans = merge_small(&lines, split_oversized(&lines, spans, limits), limits);

    spans
        .into_iter()
        .map(|span| {
            let text = lines.text(span.start, span.end);
            CodeChunk {
                file_path: file_path.to_string(),
                start_line: span.start + 1,
                end_line: span.end + 1,
                content_hash: generate_content_hash(&text),
                content: text,
                language: language.map(str::to_string),
                chunk_type: span.kind,
            }
        })
        .collect()
}

fn validate_spans(spans: Vec<Span>, total: usize) -> Result<Vec<Span>, ChunkError> {
    let mut next_free = 0;
    for span in &spans {
        if span.start < next_free || span.start > span.end || span.end >= total {
            return Err(ChunkError::InvalidSpans);
        }
        next_free = span.end + 1;
    }
    Ok(spans)
}

/// Make construct spans cover the whole file. Non-blank gaps become
/// `block` spans; blank gaps join the preceding span (or the first
/// construct, for leading blank lines).
fn fill_gaps(lines: &SourceLines<'_>, constructs: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(constructs.len() * 2);
    let mut cursor = 0;

    for mut span in constructs {
        if span.start > cursor {
            let gap_blank = (cursor..span.start).all(|i| lines.is_blank(i));
            if !gap_blank {
                out.push(Span::new(cursor, span.start - 1, ChunkType::Block));
            } else if let Some(prev) = out.last_mut() {
                prev.end = span.start - 1;
            } else {
                span.start = cursor;
            }
        }
        cursor = span.end + 1;
        out.push(span);
    }

    if cursor < lines.len() {
        let tail_blank = (cursor..lines.len()).all(|i| lines.is_blank(i));
        match out.last_mut() {
            Some(prev) if tail_blank => prev.end = lines.last_index(),
            _ => out.push(Span::new(cursor, lines.last_index(), ChunkType::Block)),
        }
    }

    out
}

fn split_oversized(lines: &SourceLines<'_>, spans: Vec<Span>, limits: &ChunkLimits) -> Vec<Span> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        if lines.fits(span.start, span.end, limits) {
            out.push(span);
        } else {
            out.extend(fallback::split_range(lines, span.start, span.end, limits));
        }
    }
    out
}

/// Merge spans below `min_lines` into their predecessor when the result
/// stays within limits. The type survives only if both sides agree.
fn merge_small(lines: &SourceLines<'_>, spans: Vec<Span>, limits: &ChunkLimits) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(prev) = out.last_mut() {
            let small = span.line_count() < limits.min_lines || prev.line_count() < limits.min_lines;
            if small && lines.fits(prev.start, span.end, limits) {
                if prev.kind != span.kind {
                    prev.kind = ChunkType::Block;
                }
                prev.end = span.end;
                continue;
            }
        }
        out.push(span);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_limits() -> ChunkLimits {
        ChunkLimits {
            max_lines: 50,
            max_bytes: 10 * 1024,
            min_lines: 3,
        }
    }

    fn assert_contiguous(chunks: &[CodeChunk], total: usize) {
        assert_eq!(chunks.first().map(|c| c.start_line), Some(1));
        assert_eq!(chunks.last().map(|c| c.end_line), Some(total));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_line + 1, pair[1].start_line, "gap or overlap: {:?}", pair);
        }
    }

    #[test]
    fn test_small_file_single_module_chunk() {
        let content = "import x from 'y';\n\nfunction a() {\n  return 1;\n}\n";
        let chunks = chunk_code(content, "src/a.ts", None);
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.chunk_type, ChunkType::Module);
        assert_eq!(chunk.start_line, 1);
        assert_eq!(chunk.end_line, 5);
        assert_eq!(chunk.content, content);
        assert_eq!(chunk.language.as_deref(), Some("typescript"));
        assert_eq!(chunk.content_hash, generate_content_hash(content));
    }

    #[test]
    fn test_empty_file() {
        let chunks = chunk_code("", "src/empty.py", None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Module);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 1);
    }

    #[test]
    fn test_language_override() {
        let chunks = chunk_code("x = 1\n", "script", Some("python"));
        assert_eq!(chunks[0].language.as_deref(), Some("python"));
        let chunks = chunk_code("x = 1\n", "notes.unknown", None);
        assert_eq!(chunks[0].language, None);
    }

    #[test]
    fn test_construct_free_file_is_line_split() {
        let content: String = (0..600).map(|i| format!("console.log({});\n", i)).collect();
        let chunks = chunk_code_with_limits(&content, "src/log.ts", None, &small_limits());
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.line_count() <= 50, "chunk too long: {}", c.line_count());
            assert_eq!(c.chunk_type, ChunkType::Block);
        }
        assert_contiguous(&chunks, 600);
    }

    #[test]
    fn test_byte_limit_split() {
        let content: String = (0..40).map(|i| format!("{} {}\n", i, "x".repeat(100))).collect();
        let limits = ChunkLimits {
            max_lines: 500,
            max_bytes: 1024,
            min_lines: 2,
        };
        let chunks = chunk_code_with_limits(&content, "data.txt", None, &limits);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.content.len() <= 1024);
        }
        assert_contiguous(&chunks, 40);
    }

    #[test]
    fn test_ts_constructs() {
        let mut content = String::from("import { a } from './a';\nimport { b } from './b';\n\n");
        content.push_str("export interface User {\n  id: string;\n  name: string;\n  email: string;\n}\n\n");
        content.push_str("export function greet(user: User): string {\n");
        for i in 0..6 {
            content.push_str(&format!("  const part{} = user.name + \"{{\";\n", i));
        }
        content.push_str("  return `hi ${user.name}`;\n}\n\n");
        content.push_str("export class Greeter {\n");
        for i in 0..6 {
            content.push_str(&format!("  method{}() {{ return '}}'; }}\n", i));
        }
        content.push_str("}\n");
        let total = content.lines().count();

        let limits = ChunkLimits {
            max_lines: 10,
            max_bytes: 10 * 1024,
            min_lines: 3,
        };
        let chunks = chunk_code_with_limits(&content, "src/greet.ts", None, &limits);
        assert_contiguous(&chunks, total);

        let function = chunks
            .iter()
            .find(|c| c.content.starts_with("export function greet"))
            .expect("function chunk");
        assert_eq!(function.chunk_type, ChunkType::Function);
        assert!(function.content.trim_end().ends_with('}'));
        assert!(function.content.contains("return `hi"));

        let class = chunks
            .iter()
            .find(|c| c.content.starts_with("export class Greeter"))
            .expect("class chunk");
        assert_eq!(class.chunk_type, ChunkType::Class);
        assert_eq!(class.line_count(), 8);
    }

    fn ten_line_limits() -> ChunkLimits {
        ChunkLimits {
            max_lines: 10,
            max_bytes: 10 * 1024,
            min_lines: 3,
        }
    }

    fn starting_with<'a>(chunks: &'a [CodeChunk], prefix: &str) -> &'a CodeChunk {
        chunks
            .iter()
            .find(|c| c.content.starts_with(prefix))
            .unwrap_or_else(|| panic!("no chunk starts with {:?}: {:#?}", prefix, chunks))
    }

    #[test]
    fn test_python_split_and_merge() {
        let mut content = String::from("def first(x):\n");
        for i in 0..5 {
            content.push_str(&format!("    y{} = x + {}\n", i, i));
        }
        content.push_str("    return x\n\n");
        content.push_str("class Service:\n    def a(self):\n        return 1\n    def b(self):\n        return 2\n\n");
        content.push_str("def big():\n");
        for i in 0..14 {
            content.push_str(&format!("    v{} = {}\n", i, i));
        }
        content.push_str("    return v0\n\n");
        content.push_str("def tiny():\n    pass\n");
        let total = content.lines().count();
        assert_eq!(total, 33);

        let limits = ten_line_limits();
        let chunks = chunk_code_with_limits(&content, "app/service.py", None, &limits);
        assert_contiguous(&chunks, total);
        assert!(chunks.iter().all(|c| c.line_count() <= limits.max_lines));
        assert!(chunks.iter().all(|c| c.language.as_deref() == Some("python")));

        let first = starting_with(&chunks, "def first");
        assert_eq!(first.chunk_type, ChunkType::Function);
        assert_eq!((first.start_line, first.end_line), (1, 8));

        let class = starting_with(&chunks, "class Service");
        assert_eq!(class.chunk_type, ChunkType::Class);
        assert_eq!((class.start_line, class.end_line), (9, 14));

        // The oversized function is split into line-based blocks.
        let big = starting_with(&chunks, "def big");
        assert_eq!(big.chunk_type, ChunkType::Block);
        assert_eq!(big.line_count(), 10);

        // The two-line function is merged into the block before it.
        assert!(!chunks.iter().any(|c| c.content.starts_with("def tiny")));
        let last = chunks.last().unwrap();
        assert_eq!(last.chunk_type, ChunkType::Block);
        assert!(last.content.contains("    return v0"));
        assert!(last.content.ends_with("def tiny():\n    pass"));
    }

    #[test]
    fn test_go_split_and_merge() {
        let mut content = String::from("package svc\n\nimport \"fmt\"\n\n");
        content.push_str("var (\n\tretries = 3\n\ttimeout = 30\n)\n\n");
        content.push_str("// Server runs jobs.\ntype Server struct {\n\tname string\n\tport int\n}\n\n");
        content.push_str("func (s *Server) Run() error {\n");
        for i in 0..14 {
            content.push_str(&format!("\tfmt.Println(s.name, {})\n", i));
        }
        content.push_str("\treturn nil\n}\n\nfunc helper() {}\n");
        let total = content.lines().count();
        assert_eq!(total, 34);

        let limits = ten_line_limits();
        let chunks = chunk_code_with_limits(&content, "svc/server.go", None, &limits);
        assert_contiguous(&chunks, total);
        assert!(chunks.iter().all(|c| c.line_count() <= limits.max_lines));

        let header = starting_with(&chunks, "package svc");
        assert_eq!(header.chunk_type, ChunkType::Block);
        assert_eq!(header.end_line, 4);

        let vars = starting_with(&chunks, "var (");
        assert_eq!(vars.chunk_type, ChunkType::Block);
        assert_eq!((vars.start_line, vars.end_line), (5, 9));

        let server = starting_with(&chunks, "// Server runs jobs.");
        assert_eq!(server.chunk_type, ChunkType::Class);
        assert_eq!((server.start_line, server.end_line), (10, 15));

        let run = starting_with(&chunks, "func (s *Server) Run");
        assert_eq!(run.chunk_type, ChunkType::Block);
        assert_eq!(run.line_count(), 10);

        assert!(!chunks.iter().any(|c| c.content.starts_with("func helper")));
        let last = chunks.last().unwrap();
        assert!(last.content.contains("\treturn nil"));
        assert!(last.content.ends_with("func helper() {}"));
    }

    #[test]
    fn test_tsx_destructured_components_keep_function_type() {
        let mut content = String::from("export const Button = ({ label, onClick }) => {\n");
        for i in 0..10 {
            content.push_str(&format!("  const style{} = {{ margin: {} }};\n", i, i));
        }
        content.push_str("  return <button onClick={onClick}>{label}</button>;\n};\n\n");
        content.push_str("export function opts({ a, b }: Opts): { sum: number } {\n");
        for i in 0..12 {
            content.push_str(&format!("  const v{} = a + b + {};\n", i, i));
        }
        content.push_str("  return { sum: a + b };\n}\n");
        let total = content.lines().count();

        let limits = ChunkLimits {
            max_lines: 20,
            max_bytes: 10 * 1024,
            min_lines: 3,
        };
        let chunks = chunk_code_with_limits(&content, "src/button.tsx", None, &limits);
        assert_contiguous(&chunks, total);

        let button = chunks
            .iter()
            .find(|c| c.content.contains("export const Button"))
            .expect("button chunk");
        assert_eq!(button.chunk_type, ChunkType::Function);
        assert!(button.content.trim_end().ends_with("};"));

        let opts = chunks
            .iter()
            .find(|c| c.content.contains("export function opts"))
            .expect("opts chunk");
        assert_eq!(opts.chunk_type, ChunkType::Function);
        assert!(opts.content.starts_with("export function opts"));
        assert!(opts.content.contains("return { sum: a + b };"));
    }

    #[test]
    fn test_unbalanced_string_braces_do_not_end_function_early() {
        let mut content = String::from("export function render(): string {\n");
        content.push_str("  const open = \"{{{\";\n");
        content.push_str("  const close = '}}}}';\n");
        content.push_str("  const tpl = `}${open}}`;\n");
        for i in 0..10 {
            content.push_str(&format!("  const v{} = {};\n", i, i));
        }
        content.push_str("  return open + close + tpl;\n}\n\n");
        for i in 0..12 {
            content.push_str(&format!("console.log({});\n", i));
        }

        let limits = ChunkLimits {
            max_lines: 20,
            max_bytes: 10 * 1024,
            min_lines: 3,
        };
        let chunks = chunk_code_with_limits(&content, "src/render.ts", None, &limits);
        let first = &chunks[0];
        assert_eq!(first.chunk_type, ChunkType::Function);
        assert_eq!(first.start_line, 1);
        assert!(first.content.contains("return open + close + tpl;"));
        assert!(first.content.trim_end().ends_with('}'));
    }

    #[test]
    fn test_unbalanced_file_falls_back() {
        let mut content = String::from("function broken() {\n");
        for i in 0..60 {
            content.push_str(&format!("  if (x{}) {{\n", i));
        }
        let chunks = chunk_code_with_limits(&content, "src/broken.js", None, &small_limits());
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkType::Block));
        assert_contiguous(&chunks, 61);
    }

    #[test]
    fn test_hash_matches_content_for_every_chunk() {
        let content: String = (0..120).map(|i| format!("line {}\n", i)).collect();
        let chunks = chunk_code_with_limits(&content, "a.txt", None, &small_limits());
        for c in &chunks {
            assert_eq!(c.content_hash, generate_content_hash(&c.content));
        }
    }

    #[test]
    fn test_merge_downgrades_mixed_types() {
        let lines_src = "a\nb\nc\nd\ne\nf";
        let lines = SourceLines::new(lines_src);
        let limits = ChunkLimits {
            max_lines: 10,
            max_bytes: 1024,
            min_lines: 3,
        };
        let spans = vec![
            Span::new(0, 3, ChunkType::Function),
            Span::new(4, 5, ChunkType::Class),
        ];
        let merged = merge_small(&lines, spans, &limits);
        assert_eq!(merged, vec![Span::new(0, 5, ChunkType::Block)]);

        let spans = vec![
            Span::new(0, 3, ChunkType::Function),
            Span::new(4, 5, ChunkType::Function),
        ];
        let merged = merge_small(&lines, spans, &limits);
        assert_eq!(merged, vec![Span::new(0, 5, ChunkType::Function)]);
    }

    #[test]
    fn test_merge_respects_limits() {
        let lines = SourceLines::new("a\nb\nc\nd\ne\nf");
        let limits = ChunkLimits {
            max_lines: 4,
            max_bytes: 1024,
            min_lines: 3,
        };
        let spans = vec![
            Span::new(0, 3, ChunkType::Block),
            Span::new(4, 5, ChunkType::Block),
        ];
        assert_eq!(merge_small(&lines, spans.clone(), &limits), spans);
    }

    #[test]
    fn test_fill_gaps() {
        let lines = SourceLines::new("\nfn\nfn\n\n// note\nfn\n\n");
        let constructs = vec![Span::new(1, 2, ChunkType::Function), Span::new(5, 5, ChunkType::Function)];
        let filled = fill_gaps(&lines, constructs);
        assert_eq!(
            filled,
            vec![
                Span::new(0, 2, ChunkType::Function),
                Span::new(3, 4, ChunkType::Block),
                Span::new(5, 6, ChunkType::Function),
            ]
        );
    }

    #[test]
    fn test_strategy_dispatch() {
        assert_eq!(ChunkStrategy::for_language(Some("typescript")), ChunkStrategy::TsJsHeuristic);
        assert_eq!(ChunkStrategy::for_language(Some("javascript")), ChunkStrategy::TsJsHeuristic);
        assert_eq!(ChunkStrategy::for_language(Some("python")), ChunkStrategy::PyGoHeuristic);
        assert_eq!(ChunkStrategy::for_language(Some("go")), ChunkStrategy::PyGoHeuristic);
        assert_eq!(ChunkStrategy::for_language(Some("rust")), ChunkStrategy::Fallback);
        assert_eq!(ChunkStrategy::for_language(None), ChunkStrategy::Fallback);
    }
}
