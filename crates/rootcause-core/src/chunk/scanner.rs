//! String-aware brace matching for C-family sources.
//!
//! [`BraceScanner`] is fed one line at a time and tracks brace depth
//! while skipping anything inside quotes, template literals, and
//! comments. Template interpolations (`${ ... }`) are tracked on a
//! stack so braces inside them are balanced separately and the
//! closing `}` returns the scanner to the enclosing template.
//!
//! Until the body opens, the scanner is in the construct's header.
//! Braces there belong to the header when they sit inside parentheses
//! or angle brackets, or follow a `:`, `|` or `&` (destructured
//! parameters, object-typed parameters, inline return types). Only a
//! brace outside all of those opens the body.

/// Why the scanner stopped inside a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    /// The body `{` was opened and its matching `}` has been seen.
    Closed,
    /// A `;` was seen at code level before the body was opened.
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    SingleQuote,
    DoubleQuote,
    Template,
    BlockComment,
}

#[derive(Debug)]
pub(crate) struct BraceScanner {
    mode: Mode,
    /// Brace depth inside each open `${`, innermost last.
    interpolations: Vec<usize>,
    depth: usize,
    opened: bool,
    /// Header nesting, only tracked before the body opens.
    parens: usize,
    angles: usize,
    header_braces: usize,
    /// Last non-whitespace code character seen in the header.
    last_sig: Option<char>,
}

impl Default for BraceScanner {
    fn default() -> Self {
        Self {
            mode: Mode::Code,
            interpolations: Vec::new(),
            depth: 0,
            opened: false,
            parens: 0,
            angles: 0,
            header_braces: 0,
            last_sig: None,
        }
    }
}

impl BraceScanner {
    /// Whether a top-level `{` has been seen yet.
    pub(crate) fn opened(&self) -> bool {
        self.opened
    }

    fn in_header_nesting(&self) -> bool {
        self.parens > 0 || self.angles > 0 || self.header_braces > 0
    }

    /// Track header punctuation. Returns true when `c` was consumed as
    /// part of the header.
    fn scan_header(&mut self, c: char, prev: Option<char>) -> bool {
        match c {
            '(' => self.parens += 1,
            ')' => self.parens = self.parens.saturating_sub(1),
            // Generics outside parentheses. `=>` is an arrow, not a closer.
            '<' if self.parens == 0 => self.angles += 1,
            '>' if self.parens == 0 && prev != Some('=') => {
                self.angles = self.angles.saturating_sub(1)
            }
            '{' if self.in_header_nesting() || matches!(self.last_sig, Some(':' | '|' | '&')) => {
                self.header_braces += 1
            }
            '}' if self.header_braces > 0 => self.header_braces -= 1,
            _ => return false,
        }
        true
    }

    /// Feed one line (without its newline). Returns early with a
    /// [`Stop`] as soon as the construct is decided.
    pub(crate) fn scan_line(&mut self, line: &str) -> Option<Stop> {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let mode = self.mode;

            match mode {
                Mode::BlockComment => {
                    if c == '*' && next == Some('/') {
                        self.mode = Mode::Code;
                        i += 1;
                    }
                }
                Mode::SingleQuote | Mode::DoubleQuote => {
                    let quote = if self.mode == Mode::SingleQuote { '\'' } else { '"' };
                    if c == '\\' {
                        i += 1;
                    } else if c == quote {
                        self.mode = Mode::Code;
                    }
                }
                Mode::Template => {
                    if c == '\\' {
                        i += 1;
                    } else if c == '`' {
                        self.mode = Mode::Code;
                    } else if c == '$' && next == Some('{') {
                        self.interpolations.push(0);
                        self.mode = Mode::Code;
                        i += 1;
                    }
                }
                Mode::Code if !self.opened
                    && self.interpolations.is_empty()
                    && self.scan_header(c, prev) => {}
                Mode::Code => match c {
                    '/' if next == Some('/') => break,
                    '/' if next == Some('*') => {
                        self.mode = Mode::BlockComment;
                        i += 1;
                    }
                    '\'' => self.mode = Mode::SingleQuote,
                    '"' => self.mode = Mode::DoubleQuote,
                    '`' => self.mode = Mode::Template,
                    '{' => match self.interpolations.last_mut() {
                        Some(inner) => *inner += 1,
                        None => {
                            self.depth += 1;
                            self.opened = true;
                        }
                    },
                    '}' => {
                        if let Some(inner) = self.interpolations.last_mut() {
                            if *inner == 0 {
                                self.interpolations.pop();
                                self.mode = Mode::Template;
                            } else {
                                *inner -= 1;
                            }
                        } else if self.depth > 0 {
                            self.depth -= 1;
                            if self.opened && self.depth == 0 {
                                return Some(Stop::Closed);
                            }
                        }
                    }
                    ';' if !self.opened
                        && self.interpolations.is_empty()
                        && self.parens == 0
                        && self.header_braces == 0 =>
                    {
                        return Some(Stop::Terminated);
                    }
                    _ => {}
                },
            }
            if !self.opened && mode == Mode::Code && !c.is_whitespace() {
                self.last_sig = Some(c);
            }
            i += 1;
        }

        // Plain quotes cannot span lines unless the newline is escaped.
        if matches!(self.mode, Mode::SingleQuote | Mode::DoubleQuote) && !line.ends_with('\\') {
            self.mode = Mode::Code;
        }
        None
    }
}
