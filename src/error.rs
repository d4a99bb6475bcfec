//! Error taxonomy and diagnostic rendering.
//!
//! `earthgraph` separates two concerns: a strongly-typed [`EarthgraphError`]
//! enum for precise matching in code, and [`Diagnostic`], a user-facing
//! wrapper that carries a source position and renders the one-line
//! `path:line:column: kind: message` form callers print to a terminal.

use std::fmt;
use std::path::PathBuf;

use colored::Colorize;

/// The typed error classes a recipe file can produce.
///
/// Lex and reference errors are fatal for the file they occur in; parse
/// errors are recoverable and batched by the parser; lowering errors
/// surface as soon as one target fails.
#[derive(Debug, Clone)]
pub enum EarthgraphError {
    /// Indentation, here-doc, or unterminated-string failure in the lexer.
    Lex { message: String },
    /// A token did not match what the grammar expected at this position.
    Parse { message: String, expected: Vec<String> },
    /// A target reference could not be parsed or resolved.
    Ref { message: String },
    /// A sub-target, artifact, or `ARG` could not be resolved during lowering.
    Resolve { message: String },
    /// A dependency cycle was discovered while lowering the build graph.
    Cycle { path: Vec<String> },
    /// Recipe loading failed (file not found, git fetch failure).
    Io { message: String },
    /// An internal invariant was violated. Never expected on valid input.
    Contract { message: String },
}

impl EarthgraphError {
    /// Short tag used in the rendered diagnostic line, e.g. `ParseError`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lex { .. } => "LexError",
            Self::Parse { .. } => "ParseError",
            Self::Ref { .. } => "RefError",
            Self::Resolve { .. } => "ResolveError",
            Self::Cycle { .. } => "CycleError",
            Self::Io { .. } => "IOError",
            Self::Contract { .. } => "ContractError",
        }
    }
}

impl fmt::Display for EarthgraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex { message }
            | Self::Ref { message }
            | Self::Resolve { message }
            | Self::Io { message }
            | Self::Contract { message } => write!(f, "{message}"),
            Self::Parse { message, expected } => {
                if expected.is_empty() {
                    write!(f, "{message}")
                } else {
                    write!(f, "{message} (expected one of: {})", expected.join(", "))
                }
            }
            Self::Cycle { path } => write!(f, "dependency cycle: {}", path.join(" -> ")),
        }
    }
}

impl std::error::Error for EarthgraphError {}

/// A source position a [`Diagnostic`] is anchored to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub path: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(path: Option<PathBuf>, line: usize, column: usize) -> Self {
        Self { path, line, column }
    }
}

/// A single user-facing error, carrying the position it occurred at.
///
/// This is the unit the parser batches (spec §4.D / §7: errors are
/// recoverable at command boundaries and collected into a non-empty list).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub position: Position,
    pub error: EarthgraphError,
}

impl Diagnostic {
    pub fn new(position: Position, error: EarthgraphError) -> Self {
        Self { position, error }
    }

    /// Render as `path:line:column: kind: message`, matching spec §7.
    ///
    /// Colors the `kind` tag unless `NO_COLOR` is set or `FORCE_COLOR` is
    /// unset and stdout is not a terminal, mirroring the teacher's
    /// `ErrorContext::display()` behavior.
    pub fn render(&self) -> String {
        let path = self
            .position
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<recipe>".to_string());
        let kind = self.error.kind();
        let kind = if should_colorize() {
            kind.red().bold().to_string()
        } else {
            kind.to_string()
        };
        format!("{path}:{}:{}: {kind}: {}", self.position.line, self.position.column, self.error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

fn should_colorize() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::env::var_os("FORCE_COLOR").is_some()
}

/// Render a batch of diagnostics as newline-separated lines, the form the
/// parser's aggregated errors (spec §7) are surfaced to a user.
pub fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics.iter().map(Diagnostic::render).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_line_per_diagnostic() {
        let d = Diagnostic::new(
            Position::new(Some(PathBuf::from("Earthfile")), 3, 5),
            EarthgraphError::Parse {
                message: "unexpected token".into(),
                expected: vec!["ATOM".into()],
            },
        );
        let rendered = d.render();
        assert!(rendered.starts_with("Earthfile:3:5:"));
        assert!(rendered.contains("unexpected token"));
        assert!(rendered.contains("expected one of: ATOM"));
    }

    #[test]
    fn batch_joins_with_newlines() {
        let a = Diagnostic::new(
            Position::new(None, 1, 1),
            EarthgraphError::Lex { message: "bad indent".into() },
        );
        let b = Diagnostic::new(
            Position::new(None, 2, 1),
            EarthgraphError::Lex { message: "bad indent again".into() },
        );
        let rendered = render_diagnostics(&[a, b]);
        assert_eq!(rendered.lines().count(), 2);
    }

    #[test]
    fn cycle_error_displays_path() {
        let e = EarthgraphError::Cycle { path: vec!["a".into(), "b".into(), "a".into()] };
        assert_eq!(e.to_string(), "dependency cycle: a -> b -> a");
    }
}
