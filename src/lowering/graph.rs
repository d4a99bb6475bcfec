//! Build-graph node shapes the lowering engine produces (spec §4.E, §6).
//!
//! These types are the external wire contract: a [`BuildNode`] is the
//! record a downstream build-graph executor consumes, and derives
//! `Serialize`/`Deserialize` the same way the teacher's lockfile records do
//! (`lockfile::LockFile`, `serde_json`-backed) so the same type can be
//! logged, diffed, or replayed without a bespoke encoding.

use serde::{Deserialize, Serialize};

/// Which execution class an [`Effect`] falls into, per spec §4.E.
///
/// `Local` effects (inside a `LOCALLY` target) must not be containerized by
/// the downstream executor; the other three classes are informative for
/// caching/scheduling decisions the executor makes, not this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheClass {
    Pure,
    FilesystemWrite,
    Network,
    Local,
}

/// One command lowered to its resolved, substituted argument vector.
///
/// `flags` carries every `--flag` the command was written with (name,
/// rendered value), in the same sorted-by-name order `Command::flags`
/// (a `BTreeMap`) iterates in, so two lowerings of an identical command
/// serialize identically. A flag-only change (e.g. `RUN --privileged` vs.
/// plain `RUN`) is semantically material to the command — spec §4.E's
/// closed flag sets (`--privileged`, `--platform`, `--chmod`, `--no-cache`,
/// `--cache-hint`, ...) are part of what the downstream executor runs, not
/// cosmetic — so it must both serialize onto the §6 wire record and be
/// fingerprint-visible, which it is here since `flags` hashes along with
/// the rest of `Effect` in `fingerprint::compute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub opcode: String,
    pub args: Vec<String>,
    pub flags: Vec<(String, String)>,
    pub cache_class: CacheClass,
}

impl Effect {
    pub fn new(
        opcode: impl Into<String>,
        args: Vec<String>,
        flags: Vec<(String, String)>,
        cache_class: CacheClass,
    ) -> Self {
        Self { opcode: opcode.into(), args, flags, cache_class }
    }
}

/// An output artifact a target produces, per spec §4.E "outputs".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Artifact {
    /// A `SAVE ARTIFACT` output, keyed by its declared remote path (the
    /// in-target artifact path other targets reference via
    /// `+target/artifact-path`). `local_path` carries the destination of an
    /// `AS LOCAL <path>` clause, when present.
    File { remote_path: String, local_path: Option<String> },
    /// A `SAVE IMAGE` output, keyed by its image tag.
    Image { tag: String },
}

/// The lowered form of one target: identity, cache key, dependency edges,
/// effects, and outputs, ready for a downstream build-graph executor.
///
/// Stable across invocations for identical inputs (spec §6): two
/// lowerings of the same recipe against the same base digest serialize to
/// byte-identical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildNode {
    /// Canonical-rendered target reference (spec §4.A, §4.E).
    pub node_id: String,
    /// Stable content hash over the canonical reference, resolved base, and
    /// non-push effects. Does not include `push_effects`.
    pub fingerprint_hex: String,
    /// Canonical node ids of every target/artifact this node depends on.
    /// A set in spec terms; kept sorted and deduplicated here so two
    /// lowerings of the same inputs serialize identically.
    pub deps: Vec<String>,
    pub effects: Vec<Effect>,
    /// Effects gated on `--push`; excluded from `fingerprint_hex`.
    pub push_effects: Vec<Effect>,
    pub outputs: Vec<Artifact>,
}
