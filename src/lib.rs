//! earthgraph — recipe parsing and target-to-build-graph lowering for a
//! container-native build automation tool.
//!
//! A recipe is a declarative file describing named build targets, each a
//! sequence of container-oriented commands (`FROM`, `RUN`, `COPY`, `BUILD`,
//! `SAVE ARTIFACT`, ...). This crate owns everything up to, but not
//! including, actually executing those commands:
//!
//! - [`reference`] — the target-reference algebra (component A): parsing,
//!   rendering, and joining `+target`/`./dir+target`/`github.com/org/repo+target`
//!   references against a caller's own origin.
//! - [`matcher`] — the git-origin matcher registry (component B) that maps a
//!   remote reference's host to a clone URL and auth protocol.
//! - [`lexer`] — the indentation- and mode-sensitive recipe lexer (component
//!   C), producing a token stream with synthesized `INDENT`/`DEDENT` and
//!   here-doc bodies.
//! - [`parser`] — the recursive-descent parser and AST (component D), with
//!   command-boundary error recovery so one bad command doesn't abort an
//!   entire recipe.
//! - [`lowering`] — the target-to-build-graph lowering interface (component
//!   E): walking a target's commands into a [`lowering::BuildNode`],
//!   resolving dependencies through an injected recipe loader, and a
//!   bounded-concurrency driver (component "Concurrency & resource model")
//!   that lowers a whole dependency graph with single-flight dedup and
//!   cooperative cancellation.
//! - [`error`] — the crate-wide error and diagnostic types shared by every
//!   other module.
//!
//! This crate never executes a command, manages a container's lifecycle,
//! caches anything on disk, or authenticates a user — it hands a
//! [`lowering::BuildNode`] graph to an external build-graph executor and
//! stops there.

pub mod error;
pub mod lexer;
pub mod lowering;
pub mod matcher;
pub mod parser;
pub mod reference;
