//! Character-level reader backing the [`super::Lexer`].
//!
//! Owns line-continuation absorption (`\` immediately followed by a
//! newline disappears, along with the continuation line's leading
//! whitespace) so the token-level code above never has to think about it,
//! except while capturing a here-document body verbatim (`raw_mode`).

use crate::error::EarthgraphError;

pub(super) struct Reader {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    raw_mode: bool,
}

type Snapshot = (usize, usize, usize, bool);

impl Reader {
    pub(super) fn new(text: String) -> Self {
        Self { chars: text.chars().collect(), pos: 0, line: 1, col: 1, raw_mode: false }
    }

    pub(super) fn line(&self) -> usize {
        self.line
    }

    pub(super) fn column(&self) -> usize {
        self.col
    }

    fn snapshot(&self) -> Snapshot {
        (self.pos, self.line, self.col, self.raw_mode)
    }

    fn restore(&mut self, snap: Snapshot) {
        self.pos = snap.0;
        self.line = snap.1;
        self.col = snap.2;
        self.raw_mode = snap.3;
    }

    /// Advance one logical character, absorbing `\`-newline continuation
    /// (and the blank-line-preserves-a-space exception) unless `raw_mode`.
    fn step(&mut self) -> Option<char> {
        loop {
            let c = *self.chars.get(self.pos)?;
            if !self.raw_mode && c == '\\' && self.chars.get(self.pos + 1) == Some(&'\n') {
                self.pos += 2;
                self.line += 1;
                self.col = 1;
                if self.chars.get(self.pos) == Some(&'\n') {
                    self.pos += 1;
                    self.line += 1;
                    self.col = 1;
                    while matches!(self.chars.get(self.pos), Some(' ') | Some('\t')) {
                        self.pos += 1;
                    }
                    return Some(' ');
                }
                while matches!(self.chars.get(self.pos), Some(' ') | Some('\t')) {
                    self.pos += 1;
                }
                continue;
            }
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            return Some(c);
        }
    }

    pub(super) fn peek(&mut self) -> Option<char> {
        let snap = self.snapshot();
        let c = self.step();
        self.restore(snap);
        c
    }

    pub(super) fn bump(&mut self) -> Option<char> {
        self.step()
    }

    pub(super) fn at_eof(&mut self) -> bool {
        self.peek().is_none()
    }

    /// Consume the leading indentation run of a line, expanding tabs to
    /// the next multiple of 8. Returns `(columns, had_tab, had_space, raw_text)`.
    pub(super) fn measure_indent(&mut self) -> (usize, bool, bool, String) {
        let mut cols = 0usize;
        let mut had_tab = false;
        let mut had_space = false;
        let mut text = String::new();
        loop {
            match self.peek() {
                Some(' ') => {
                    cols += 1;
                    had_space = true;
                    text.push(' ');
                    self.bump();
                }
                Some('\t') => {
                    cols = (cols / 8 + 1) * 8;
                    had_tab = true;
                    text.push('\t');
                    self.bump();
                }
                _ => break,
            }
        }
        (cols, had_tab, had_space, text)
    }

    pub(super) fn skip_inline_ws(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }
    }

    pub(super) fn consume_to_eol(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.bump();
        }
    }

    /// A whitespace-delimited word, used only for the bare `name:` header
    /// line's coarse tokenizing.
    pub(super) fn read_word(&mut self) -> (usize, String) {
        let col = self.col;
        let mut s = String::new();
        while !matches!(self.peek(), None | Some(' ') | Some('\t') | Some('\n')) {
            s.push(self.bump().unwrap());
        }
        (col, s)
    }

    /// A fine-mode atom: a run of non-whitespace characters, stopping
    /// before an unescaped quote, and before a bare `=` when the atom read
    /// so far looks like a `--flag` (so `--flag=value` lexes as three
    /// tokens: `--flag`, `=`, `value`).
    pub(super) fn read_atom(&mut self) -> String {
        let mut s = String::new();
        loop {
            match self.peek() {
                None | Some(' ') | Some('\t') | Some('\n') => break,
                Some('=') if s.starts_with("--") => break,
                Some('"') | Some('\'') if !s.is_empty() => break,
                Some(c) => {
                    s.push(c);
                    self.bump();
                }
            }
        }
        s
    }

    pub(super) fn read_double_quoted(
        &mut self,
        line_no: usize,
    ) -> Result<(usize, String), EarthgraphError> {
        let col = self.col;
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(EarthgraphError::Lex {
                        message: format!("line {line_no}: unterminated double-quoted string"),
                    });
                }
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('\\') => s.push('\\'),
                    Some('"') => s.push('"'),
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(other) => {
                        s.push('\\');
                        s.push(other);
                    }
                    None => {
                        return Err(EarthgraphError::Lex {
                            message: format!("line {line_no}: unterminated double-quoted string"),
                        });
                    }
                },
                Some(c) => s.push(c),
            }
        }
        Ok((col, s))
    }

    pub(super) fn read_single_quoted(
        &mut self,
        line_no: usize,
    ) -> Result<(usize, String), EarthgraphError> {
        let col = self.col;
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(EarthgraphError::Lex {
                        message: format!("line {line_no}: unterminated single-quoted string"),
                    });
                }
                Some('\'') => break,
                Some(c) => s.push(c),
            }
        }
        Ok((col, s))
    }

    /// Capture raw lines (continuation absorption suspended) up to, but
    /// not including, a line that is exactly `tag` (trailing whitespace
    /// ignored). The closing line is consumed but not included.
    pub(super) fn read_heredoc_body(&mut self, tag: &str) -> Result<String, EarthgraphError> {
        self.raw_mode = true;
        let mut body = String::new();
        loop {
            if self.chars.get(self.pos).is_none() {
                self.raw_mode = false;
                return Err(EarthgraphError::Lex {
                    message: format!("unterminated here-doc, expected closing '{tag}'"),
                });
            }
            let mut line = String::new();
            loop {
                match self.peek() {
                    None | Some('\n') => break,
                    Some(c) => {
                        line.push(c);
                        self.bump();
                    }
                }
            }
            let had_nl = self.peek() == Some('\n');
            if had_nl {
                self.bump();
            }
            if line.trim_end() == tag {
                self.raw_mode = false;
                return Ok(body);
            }
            body.push_str(&line);
            if had_nl {
                body.push('\n');
            }
        }
    }

    /// Non-consuming lookahead: does the rest of this logical line match a
    /// bare `name:` target header (an identifier, a colon, then only
    /// trailing whitespace or a comment)?
    pub(super) fn peek_is_bare_header(&mut self) -> bool {
        let snap = self.snapshot();
        let (_, word) = self.read_word();
        let is_ident_colon = word.len() > 1
            && word.ends_with(':')
            && word[..word.len() - 1]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        let rest_ok = if is_ident_colon {
            self.skip_inline_ws();
            matches!(self.peek(), None | Some('\n') | Some('#'))
        } else {
            false
        };
        self.restore(snap);
        is_ident_colon && rest_ok
    }
}
