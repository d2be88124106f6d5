//! Line-based splitting, used when no construct boundaries apply and to
//! break up chunks that exceed the size limits.

use super::{ChunkLimits, SourceLines, Span};
use crate::models::ChunkType;

/// Split lines `start..=end` into `block` spans within `limits`.
///
/// A window is closed at the last blank line inside it when that leaves
/// at least `min_lines` lines, otherwise it is cut hard at the limit. A
/// single line longer than `max_bytes` becomes its own span.
pub(crate) fn split_range(
    lines: &SourceLines<'_>,
    start: usize,
    end: usize,
    limits: &ChunkLimits,
) -> Vec<Span> {
    let mut spans = Vec::new();
    let max_lines = limits.max_lines.max(1);
    let mut chunk_start = start;
    let mut last_blank: Option<usize> = None;
    let mut i = start;

    while i <= end {
        let overflows = i > chunk_start
            && (i + 1 - chunk_start > max_lines || lines.byte_len(chunk_start, i) > limits.max_bytes);

        if overflows {
            let cut = match last_blank {
                Some(b) if b + 1 - chunk_start >= limits.min_lines.max(1) => b,
                _ => i - 1,
            };
            spans.push(Span::new(chunk_start, cut, ChunkType::Block));
            chunk_start = cut + 1;
            last_blank = (chunk_start..i).rev().find(|&j| lines.is_blank(j));
            continue;
        }

        if lines.is_blank(i) {
            last_blank = Some(i);
        }
        i += 1;
    }

    if chunk_start <= end {
        spans.push(Span::new(chunk_start, end, ChunkType::Block));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_lines: usize, max_bytes: usize, min_lines: usize) -> ChunkLimits {
        ChunkLimits {
            max_lines,
            max_bytes,
            min_lines,
        }
    }

    #[test]
    fn test_hard_cut_at_max_lines() {
        let content = (0..25).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let lines = SourceLines::new(&content);
        let spans = split_range(&lines, 0, 24, &limits(10, 10_000, 1));
        assert_eq!(
            spans,
            vec![
                Span::new(0, 9, ChunkType::Block),
                Span::new(10, 19, ChunkType::Block),
                Span::new(20, 24, ChunkType::Block),
            ]
        );
    }

    #[test]
    fn test_prefers_blank_line_boundary() {
        let mut src: Vec<String> = (0..6).map(|i| format!("a{}", i)).collect();
        src.push(String::new());
        src.extend((0..6).map(|i| format!("b{}", i)));
        let content = src.join("\n");
        let lines = SourceLines::new(&content);
        let spans = split_range(&lines, 0, 12, &limits(10, 10_000, 3));
        assert_eq!(spans[0], Span::new(0, 6, ChunkType::Block));
        assert_eq!(spans[1], Span::new(7, 12, ChunkType::Block));
    }

    #[test]
    fn test_ignores_blank_too_close_to_start() {
        let mut src = vec!["a".to_string(), String::new()];
        src.extend((0..10).map(|i| format!("b{}", i)));
        let content = src.join("\n");
        let lines = SourceLines::new(&content);
        let spans = split_range(&lines, 0, 11, &limits(8, 10_000, 4));
        assert_eq!(spans[0], Span::new(0, 7, ChunkType::Block));
    }

    #[test]
    fn test_byte_cut() {
        let content = ["aaaa", "bbbb", "cccc", "dddd"].join("\n");
        let lines = SourceLines::new(&content);
        // "aaaa\nbbbb" is 9 bytes; a third line would be 14
        let spans = split_range(&lines, 0, 3, &limits(100, 10, 1));
        assert_eq!(
            spans,
            vec![Span::new(0, 1, ChunkType::Block), Span::new(2, 3, ChunkType::Block)]
        );
    }

    #[test]
    fn test_oversized_single_line() {
        let long = "x".repeat(50);
        let content = format!("a\n{}\nb", long);
        let lines = SourceLines::new(&content);
        let spans = split_range(&lines, 0, 2, &limits(100, 10, 1));
        assert_eq!(
            spans,
            vec![
                Span::new(0, 0, ChunkType::Block),
                Span::new(1, 1, ChunkType::Block),
                Span::new(2, 2, ChunkType::Block),
            ]
        );
    }

    #[test]
    fn test_sub_range() {
        let content = (0..30).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let lines = SourceLines::new(&content);
        let spans = split_range(&lines, 5, 19, &limits(10, 10_000, 1));
        assert_eq!(
            spans,
            vec![Span::new(5, 14, ChunkType::Block), Span::new(15, 19, ChunkType::Block)]
        );
    }
}
