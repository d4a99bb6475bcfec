//! Mode-aware, indentation-producing lexer (component C).
//!
//! The recipe format is indentation-sensitive: a target's body is whatever
//! follows its header line at a strictly greater column. The lexer turns a
//! raw character stream into a flat token list the parser can walk with one
//! token of lookahead, synthesizing `Indent`/`Dedent` tokens the way a
//! Python-style tokenizer does, plus here-doc capture and explicit
//! line-continuation.
//!
//! Two lexical regimes are in play. At column zero the lexer only has to
//! recognize a bare `name:` target header (coarse, whitespace-delimited
//! words) versus a base-block command; once inside a target's body (or for
//! a base-block command line), tokenizing switches to the fine-grained
//! regime that splits out `--flags`, `=`, and quoted strings.

mod reader;

use std::collections::VecDeque;

use crate::error::EarthgraphError;
use reader::Reader;

/// Which non-whitespace-significant channel a token belongs to.
///
/// The parser only ever consumes [`Channel::Main`]; [`Channel::Whitespace`]
/// tokens exist solely so indentation bookkeeping has something to point at
/// when re-deriving source positions, and are filtered out before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Main,
    Whitespace,
}

/// The kind of a single [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Any non-whitespace lexeme in the current mode.
    Atom,
    /// A run of leading indentation whitespace.
    Ws,
    /// A logical end-of-line.
    Nl,
    /// Synthetic: the indent level increased.
    Indent,
    /// Synthetic: the indent level decreased.
    Dedent,
    /// The verbatim body of a here-document.
    HeredocBody,
    Eof,
}

/// A single lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub channel: Channel,
}

impl Token {
    fn main(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Self { kind, text: text.into(), line, column, channel: Channel::Main }
    }
}

/// The lexical regime currently in effect (spec §4.C "mode-driven").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Column zero, looking only for a `name:` header or a base-block command.
    Header,
    /// Inside a target body (or a base-block command line): fine-grained.
    Command,
}

/// Which indentation character a target body has committed to, so a later
/// line using the other character (even at a visually identical column
/// after tab expansion) can be rejected (spec §4.C: "mixed indentation in
/// the same target is rejected").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndentChar {
    Space,
    Tab,
}

/// Tokenizes a recipe source text.
///
/// Construct with [`Lexer::new`] and call [`Lexer::tokenize`] once; lex
/// errors (unterminated here-doc/string, mixed-indent, an unexpected
/// character outside any mode) are fatal for the whole file, matching spec
/// §7.
pub struct Lexer {
    reader: Reader,
    mode_stack: Vec<Mode>,
    indent_stack: Vec<usize>,
    queued: VecDeque<Token>,
    /// The indent character the currently-open target body has committed
    /// to, if any; reset to `None` whenever indentation returns to column 0.
    body_indent_style: Option<IndentChar>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
        Self {
            reader: Reader::new(normalized),
            mode_stack: vec![Mode::Header],
            indent_stack: vec![0],
            queued: VecDeque::new(),
            body_indent_style: None,
        }
    }

    /// Tokenize the whole source, returning a flat, `Eof`-terminated token
    /// list with `Ws` tokens (channel [`Channel::Whitespace`]) included.
    pub fn tokenize(mut self) -> Result<Vec<Token>, EarthgraphError> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            out.push(tok);
            if done {
                break;
            }
        }
        Ok(out)
    }

    /// Tokenize and drop everything on [`Channel::Whitespace`], the form
    /// the parser actually consumes.
    pub fn tokenize_main(source: &str) -> Result<Vec<Token>, EarthgraphError> {
        Ok(Lexer::new(source)
            .tokenize()?
            .into_iter()
            .filter(|t| t.channel == Channel::Main)
            .collect())
    }

    fn next_token(&mut self) -> Result<Token, EarthgraphError> {
        if let Some(tok) = self.queued.pop_front() {
            return Ok(tok);
        }
        if self.reader.at_eof() {
            return self.finish_at_eof();
        }
        self.start_of_line()
    }

    /// Called when the reader sits at the first character of a new logical
    /// line (or at the very start of the file). Skips blank/comment-only
    /// lines entirely, measures indentation, queues Indent/Dedent, then
    /// lexes the line's content in the mode now in effect.
    fn start_of_line(&mut self) -> Result<Token, EarthgraphError> {
        loop {
            if self.reader.at_eof() {
                return self.finish_at_eof();
            }
            let line_no = self.reader.line();
            let (indent_cols, had_tab, had_space, ws_text) = self.reader.measure_indent();
            if had_tab && had_space {
                return Err(EarthgraphError::Lex {
                    message: format!("line {line_no}: mixed tabs and spaces in indentation"),
                });
            }
            if self.reader.at_eof() {
                return self.finish_at_eof();
            }
            if self.reader.peek() == Some('\n') {
                self.reader.bump();
                continue;
            }
            if self.reader.peek() == Some('#') {
                self.reader.consume_to_eol();
                if self.reader.peek() == Some('\n') {
                    self.reader.bump();
                }
                continue;
            }

            // Content-bearing line: emit indentation transitions, then the
            // Ws token for the prefix we just consumed, then the line body.
            self.check_indent_style(indent_cols, had_tab, line_no)?;
            self.apply_indent(indent_cols, line_no)?;
            if !ws_text.is_empty() {
                self.queued.push_back(Token {
                    kind: TokenKind::Ws,
                    text: ws_text,
                    line: line_no,
                    column: 1,
                    channel: Channel::Whitespace,
                });
            }
            self.lex_line_body(line_no)?;
            return Ok(self.queued.pop_front().expect("line body always queues at least NL"));
        }
    }

    /// Reject a line whose indentation character (tabs vs. spaces) differs
    /// from the one the currently-open target body already committed to,
    /// even when the two lines land on the same visible column after tab
    /// expansion (spec §4.C: "mixed indentation in the same target is
    /// rejected" — a same-line tab/space mix is already caught by the
    /// caller before this runs, so at most one of `had_tab`/`!had_tab` is
    /// true for any line that reaches here with `cols > 0`).
    fn check_indent_style(
        &mut self,
        cols: usize,
        had_tab: bool,
        line_no: usize,
    ) -> Result<(), EarthgraphError> {
        if cols == 0 {
            return Ok(());
        }
        let style = if had_tab { IndentChar::Tab } else { IndentChar::Space };
        match self.body_indent_style {
            None => self.body_indent_style = Some(style),
            Some(existing) if existing != style => {
                return Err(EarthgraphError::Lex {
                    message: format!(
                        "line {line_no}: indentation switched from {existing:?}s to {style:?}s within the same target"
                    ),
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_indent(&mut self, cols: usize, line_no: usize) -> Result<(), EarthgraphError> {
        let top = *self.indent_stack.last().unwrap();
        if cols > top {
            self.indent_stack.push(cols);
            self.queued.push_back(Token::main(TokenKind::Indent, "", line_no, 1));
            if self.indent_stack.len() == 2 {
                self.mode_stack.push(Mode::Command);
            }
        } else if cols < top {
            while *self.indent_stack.last().unwrap() > cols {
                self.indent_stack.pop();
                self.queued.push_back(Token::main(TokenKind::Dedent, "", line_no, 1));
            }
            if *self.indent_stack.last().unwrap() != cols {
                return Err(EarthgraphError::Lex {
                    message: format!(
                        "line {line_no}: unindent does not match any outer indentation level"
                    ),
                });
            }
            if self.indent_stack.len() == 1 {
                self.body_indent_style = None;
                if self.mode_stack.len() > 1 {
                    self.mode_stack.truncate(1);
                }
            }
        }
        Ok(())
    }

    fn current_mode(&self) -> Mode {
        *self.mode_stack.last().unwrap()
    }

    /// Is this level-0 line a bare `name:` target header, as opposed to a
    /// base-block command? Checked without consuming, by scanning ahead to
    /// the first unescaped newline/`#`.
    fn is_header_line(&self) -> bool {
        if self.current_mode() != Mode::Header {
            return false;
        }
        self.reader.peek_is_bare_header()
    }

    fn lex_line_body(&mut self, line_no: usize) -> Result<(), EarthgraphError> {
        if self.is_header_line() {
            self.lex_header_line(line_no)
        } else {
            self.lex_command_line(line_no)
        }
    }

    /// Coarse mode: `name` then `:` as two atoms, nothing else expected.
    fn lex_header_line(&mut self, line_no: usize) -> Result<(), EarthgraphError> {
        let (col, word) = self.reader.read_word();
        let name = word.trim_end_matches(':');
        self.queued.push_back(Token::main(TokenKind::Atom, name, line_no, col));
        self.queued.push_back(Token::main(TokenKind::Atom, ":", line_no, col + name.len()));
        self.reader.consume_to_eol();
        self.end_of_line(line_no)
    }

    /// Fine mode: flags, `=`, quoted strings, here-doc openers.
    fn lex_command_line(&mut self, line_no: usize) -> Result<(), EarthgraphError> {
        let mut heredoc_tags: Vec<(String, usize)> = Vec::new();
        loop {
            self.reader.skip_inline_ws();
            match self.reader.peek() {
                None | Some('\n') => break,
                Some('#') => {
                    self.reader.consume_to_eol();
                    break;
                }
                Some('"') => {
                    let (col, text) = self.reader.read_double_quoted(line_no)?;
                    self.queued.push_back(Token::main(TokenKind::Atom, text, line_no, col));
                }
                Some('\'') => {
                    let (col, text) = self.reader.read_single_quoted(line_no)?;
                    self.queued.push_back(Token::main(TokenKind::Atom, text, line_no, col));
                }
                Some('=') => {
                    let col = self.reader.column();
                    self.reader.bump();
                    self.queued.push_back(Token::main(TokenKind::Atom, "=", line_no, col));
                }
                Some(_) => {
                    let col = self.reader.column();
                    let atom = self.reader.read_atom();
                    if let Some(tag) = atom.strip_prefix("<<") {
                        if tag.is_empty() {
                            return Err(EarthgraphError::Lex {
                                message: format!(
                                    "line {line_no}: here-doc opener '<<' missing a delimiter tag"
                                ),
                            });
                        }
                        heredoc_tags.push((tag.to_string(), self.queued.len()));
                    }
                    self.queued.push_back(Token::main(TokenKind::Atom, atom, line_no, col));
                }
            }
        }
        if self.reader.peek() == Some('\n') {
            self.reader.bump();
        }
        for (tag, _) in heredoc_tags {
            let body = self.reader.read_heredoc_body(&tag)?;
            self.queued.push_back(Token::main(TokenKind::HeredocBody, body, line_no, 1));
        }
        self.end_of_line(line_no)?;
        Ok(())
    }

    fn end_of_line(&mut self, line_no: usize) -> Result<(), EarthgraphError> {
        self.queued.push_back(Token::main(TokenKind::Nl, "\n", line_no, 1));
        Ok(())
    }

    fn finish_at_eof(&mut self) -> Result<Token, EarthgraphError> {
        let line_no = self.reader.line();
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.queued.push_back(Token::main(TokenKind::Dedent, "", line_no, 1));
        }
        self.queued.push_back(Token::main(TokenKind::Eof, "", line_no, 1));
        Ok(self.queued.pop_front().unwrap())
    }
}
