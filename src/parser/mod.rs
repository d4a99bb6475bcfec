//! Recipe parser (component D): tokens → [`ast::Recipe`].
//!
//! A hand-written LL(1) recursive-descent parser over the lexer's token
//! stream. Errors are recoverable at command boundaries: on a malformed
//! command the parser records a [`Diagnostic`] and resynchronizes at the
//! next `Nl`/`Dedent`/`Eof`, so a single typo doesn't abort the whole file
//! (spec §4.D, §7).

pub mod ast;
mod opcodes;

use ast::{Command, FlagValue, Recipe, TargetDef};
use opcodes::{Arity, OpcodeSpec};

use crate::error::{Diagnostic, EarthgraphError, Position};
use crate::lexer::{Channel, Lexer, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    path: Option<std::path::PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

/// Parse `source` into a [`Recipe`], plus any recoverable diagnostics.
///
/// Returns `Err` only for a fatal lex error; parse errors are batched into
/// the returned diagnostics vector instead of aborting.
pub fn parse(source: &str) -> Result<(Recipe, Vec<Diagnostic>), EarthgraphError> {
    parse_with_path(source, None)
}

pub fn parse_with_path(
    source: &str,
    path: Option<std::path::PathBuf>,
) -> Result<(Recipe, Vec<Diagnostic>), EarthgraphError> {
    let tokens: Vec<Token> = Lexer::new(source)
        .tokenize()?
        .into_iter()
        .filter(|t| t.channel == Channel::Main)
        .collect();
    let mut parser = Parser { tokens, pos: 0, path, diagnostics: Vec::new() };
    let recipe = parser.parse_recipe();
    Ok((recipe, parser.diagnostics))
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_n(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn error(&mut self, message: String, expected: Vec<String>) {
        let tok = self.peek();
        let position = Position::new(self.path.clone(), tok.line, tok.column);
        self.diagnostics
            .push(Diagnostic::new(position, EarthgraphError::Parse { message, expected }));
    }

    /// Skip tokens until the next `Nl`, `Dedent`, or `Eof` (command
    /// boundary), matching spec §4.D's recovery rule.
    fn resync(&mut self) {
        while !matches!(self.peek().kind, TokenKind::Nl | TokenKind::Dedent | TokenKind::Eof) {
            self.advance();
        }
        if self.peek().kind == TokenKind::Nl {
            self.advance();
        }
    }

    fn parse_recipe(&mut self) -> Recipe {
        let mut recipe = Recipe::default();
        while !self.at_eof() && !self.at_target_header() {
            if let Some(cmd) = self.parse_command() {
                recipe.base_block.push(cmd);
            }
        }
        while !self.at_eof() {
            if self.at_target_header() {
                recipe.targets.push(self.parse_target());
            } else {
                self.error(
                    format!("expected a target header, found '{}'", self.peek().text),
                    vec!["ATOM ':'".to_string()],
                );
                self.resync();
            }
        }
        recipe
    }

    /// A target header is exactly `ATOM ':' Nl`.
    fn at_target_header(&self) -> bool {
        self.peek().kind == TokenKind::Atom
            && self.peek_n(1).kind == TokenKind::Atom
            && self.peek_n(1).text == ":"
            && self.peek_n(2).kind == TokenKind::Nl
    }

    fn parse_target(&mut self) -> TargetDef {
        let name_tok = self.advance();
        self.advance(); // ':'
        self.advance(); // Nl
        let line = name_tok.line;
        let mut body = Vec::new();
        if self.peek().kind == TokenKind::Indent {
            self.advance();
            while self.peek().kind != TokenKind::Dedent && !self.at_eof() {
                if let Some(cmd) = self.parse_command() {
                    body.push(cmd);
                }
            }
            if self.peek().kind == TokenKind::Dedent {
                self.advance();
            }
        }
        TargetDef { name: name_tok.text, body, line }
    }

    fn parse_command(&mut self) -> Option<Command> {
        if matches!(self.peek().kind, TokenKind::Nl) {
            // Stray blank logical line inside a body; shouldn't normally
            // occur (the lexer drops blank lines) but skip defensively.
            self.advance();
            return None;
        }
        if self.peek().kind != TokenKind::Atom {
            self.error(
                format!("expected a command, found {:?}", self.peek().kind),
                vec!["ATOM".to_string()],
            );
            self.resync();
            return None;
        }
        let opcode_tok = self.advance();
        let mut command = Command::new(opcode_tok.text.clone(), opcode_tok.line, opcode_tok.column);
        self.resolve_sub_opcode(&mut command);
        let spec = opcodes::lookup(&command.full_opcode());

        loop {
            match self.peek().kind {
                TokenKind::Nl | TokenKind::Eof | TokenKind::Dedent => break,
                TokenKind::HeredocBody => {
                    command.heredoc_body = Some(self.advance().text);
                }
                TokenKind::Atom if self.peek().text.starts_with("--") => {
                    self.parse_flag(&mut command, spec.as_ref());
                }
                TokenKind::Atom => {
                    if let Some(spec) = &spec {
                        if let Arity::Fixed(n) = spec.arity {
                            if command.args.len() >= n {
                                self.error(
                                    format!(
                                        "'{}' takes at most {n} positional argument(s)",
                                        command.full_opcode()
                                    ),
                                    vec![],
                                );
                            }
                        }
                    }
                    command.args.push(self.advance().text);
                }
                _ => {
                    self.error(
                        format!("unexpected token {:?} in command", self.peek().kind),
                        vec!["ATOM".to_string(), "Nl".to_string()],
                    );
                    self.resync();
                    return Some(command);
                }
            }
        }
        if self.peek().kind == TokenKind::Nl {
            self.advance();
        }
        Some(command)
    }

    /// `FROM DOCKERFILE`, `SAVE ARTIFACT`/`SAVE IMAGE`, `GIT CLONE`: the
    /// first positional atom, when it matches a known sub-opcode word for
    /// this opcode, is folded into `sub_opcode` rather than `args`.
    fn resolve_sub_opcode(&mut self, command: &mut Command) {
        let candidates: &[&str] = match command.opcode.as_str() {
            "FROM" => &["DOCKERFILE"],
            "SAVE" => &["ARTIFACT", "IMAGE"],
            "GIT" => &["CLONE"],
            _ => &[],
        };
        if candidates.is_empty() {
            return;
        }
        if self.peek().kind == TokenKind::Atom && candidates.contains(&self.peek().text.as_str()) {
            command.sub_opcode = Some(self.advance().text);
        }
    }

    fn parse_flag(&mut self, command: &mut Command, spec: Option<&OpcodeSpec>) {
        let flag_tok = self.advance();
        let name = flag_tok.text.trim_start_matches("--").to_string();
        if let Some(spec) = spec {
            if !spec.known_flags.is_empty() && !spec.known_flags.contains(&name.as_str()) {
                self.error(
                    format!("unknown flag '--{name}' for '{}'", command.full_opcode()),
                    spec.known_flags.iter().map(|f| format!("--{f}")).collect(),
                );
            }
        }
        let value = if self.peek().kind == TokenKind::Atom && self.peek().text == "=" {
            self.advance();
            let value_tok = self.advance();
            FlagValue::Str(value_tok.text)
        } else {
            FlagValue::Bool(true)
        };
        command.set_flag(name, value);
    }
}

#[cfg(test)]
mod tests;
