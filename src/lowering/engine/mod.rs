//! Per-target lowering: walks one [`TargetDef`]'s commands into a
//! [`TargetPlan`] the driver can finish into a [`BuildNode`] once its
//! dependencies' fingerprints are known (spec §4.E).
//!
//! Deliberately synchronous and free of any dependency on other targets'
//! lowering results: discovering *that* a dependency exists is this
//! module's job; actually lowering it (possibly from another recipe,
//! possibly concurrently with a sibling) is [`super::driver`]'s, which
//! matches spec §5's "gated only on its deps" bottom-up evaluation order —
//! a target can't know its own fingerprint until its deps' fingerprints
//! are in hand.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::EarthgraphError;
use crate::lowering::graph::{Artifact, CacheClass, Effect};
use crate::matcher::GitOriginMatcher;
use crate::parser::ast::{Command, FlagValue, TargetDef};
use crate::reference::Reference;

/// Build-arg / `.env` values a caller supplies for ARG resolution (spec
/// §4.E "ARG without a default... unless the caller supplies the value
/// (CLI build-arg overrides, then `.env`, then undefined)"), plus the one
/// ambient host variable spec §6 calls out by name.
#[derive(Debug, Clone, Default)]
pub struct LoweringEnv {
    pub build_args: HashMap<String, String>,
    pub dotenv: HashMap<String, String>,
    /// The host's `TERM`, echoed into any effect whose args reference
    /// `$TERM` (spec §6: "`TERM` (echoed into lowered effects)"). Unlike
    /// `ARG`, this needs no in-recipe declaration to be substitutable.
    pub term: Option<String>,
}

impl LoweringEnv {
    /// Read the ambient variables spec §6 names from the process
    /// environment. Callers embedding this crate in a CLI use this; tests
    /// and library callers that want determinism construct `LoweringEnv`
    /// fields directly instead.
    pub fn from_host_env() -> Self {
        Self { term: std::env::var("TERM").ok(), ..Self::default() }
    }
}

/// Where a target's `FROM` base comes from, pending resolution by the
/// driver (which alone knows other targets' computed fingerprints).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseRef {
    /// A base image name (optionally `FROM DOCKERFILE <context>`, encoded
    /// with a `dockerfile:` prefix), taken as-is: no registry digest
    /// lookup happens in this crate (spec §1: core doesn't execute or
    /// manage container lifecycle).
    Image(String),
    /// The canonical node id of a local target producing this base; the
    /// driver substitutes that target's fingerprint in its place.
    LocalTarget(String),
    /// No `FROM`/`FROM DOCKERFILE` command appeared in the target body.
    None,
}

/// The result of walking one target's commands, before fingerprinting.
#[derive(Debug, Clone)]
pub struct TargetPlan {
    pub node_id: String,
    pub base: BaseRef,
    pub deps: Vec<String>,
    pub effects: Vec<Effect>,
    pub push_effects: Vec<Effect>,
    pub outputs: Vec<Artifact>,
    /// `--build-arg` overrides captured from `BUILD` commands, scoped to
    /// the named dependency only (spec §4.E: "they do not leak back").
    pub nested_build_args: HashMap<String, HashMap<String, String>>,
    /// The persistent `ENTRYPOINT` in effect at the end of the target body
    /// (a `RUN --entrypoint` invocation does not update this).
    pub entrypoint: Option<Vec<String>>,
}

static VAR_PATTERN: OnceLock<Regex> = OnceLock::new();

fn var_pattern() -> &'static Regex {
    VAR_PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap()
    })
}

/// Substitute `$NAME`/`${NAME}` occurrences against `scope`, leaving
/// unresolved names untouched (spec §4.E "resolved arguments (after
/// variable substitution against an environment supplied by the caller)").
fn substitute_vars(text: &str, scope: &HashMap<String, String>) -> String {
    var_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).unwrap().as_str();
            scope.get(name).cloned().unwrap_or_else(|| caps.get(0).unwrap().as_str().to_string())
        })
        .into_owned()
}

/// Resolve a command's `--flag` values (name, rendered value) for carrying
/// into its [`Effect`], substituting `$VAR`s the same way positional args
/// are (spec §4.E: flags like `--privileged`/`--platform`/`--chmod`/
/// `--no-cache`/`--cache-hint` are part of a command's semantics, not
/// cosmetic, so they must be both fingerprint-visible and present on the
/// wire record). `--push` is excluded: it's already represented
/// structurally by which of `effects`/`push_effects` the command lands in.
fn resolve_flags(cmd: &Command, scope: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (name, value) in &cmd.flags {
        if name == "push" {
            continue;
        }
        match value {
            FlagValue::Bool(b) => out.push((name.clone(), b.to_string())),
            FlagValue::Str(s) => out.push((name.clone(), substitute_vars(s, scope))),
            FlagValue::List(items) => {
                for item in items {
                    out.push((name.clone(), substitute_vars(item, scope)));
                }
            }
        }
    }
    out
}

/// Split a `SAVE ARTIFACT`'s positional args into `(src, artifact_dest,
/// local_dest)`, handling the `AS LOCAL <path>` clause
/// (`save_artifact_sub_opcode_is_resolved` in `parser/tests.rs` already
/// exercises this form: `SAVE ARTIFACT ./out AS LOCAL out.bin`). Positional
/// args before `AS` are `(src, [artifact_dest])`; `artifact_dest` defaults
/// to `src` when omitted, matching "an Artifact entry keyed by the declared
/// remote path" for the common `SAVE ARTIFACT ./out` bare form (spec §4.E).
fn split_save_artifact_args(args: &[String]) -> (Option<String>, Option<String>) {
    let as_pos = args.iter().position(|a| a == "AS");
    let before_as = as_pos.map(|i| &args[..i]).unwrap_or(args);
    let src = before_as.first().cloned();
    let artifact_dest = before_as.get(1).cloned().or_else(|| src.clone());

    let local_dest = as_pos.and_then(|i| {
        let after = &args[i + 1..];
        match after.first().map(String::as_str) {
            Some("LOCAL") => after.get(1).cloned(),
            _ => None,
        }
    });

    (artifact_dest, local_dest)
}

fn opcode_cache_class(full_opcode: &str, locally: bool) -> CacheClass {
    if locally {
        return CacheClass::Local;
    }
    match full_opcode {
        "FROM" | "FROM DOCKERFILE" | "ARG" | "WORKDIR" | "ENTRYPOINT" | "CMD" | "ENV"
        | "EXPOSE" | "VOLUME" | "LABEL" => CacheClass::Pure,
        "COPY" | "SAVE ARTIFACT" | "SAVE IMAGE" => CacheClass::FilesystemWrite,
        "RUN" | "BUILD" | "GIT CLONE" => CacheClass::Network,
        _ => CacheClass::Pure,
    }
}

/// Resolve an `ARG` value: caller build-arg override, then `.env`, then the
/// in-recipe default, then `MissingArg` (spec §4.E tie-break).
fn resolve_arg(
    name: &str,
    default: Option<&str>,
    env: &LoweringEnv,
) -> Result<String, EarthgraphError> {
    if let Some(v) = env.build_args.get(name) {
        return Ok(v.clone());
    }
    if let Some(v) = env.dotenv.get(name) {
        return Ok(v.clone());
    }
    if let Some(d) = default {
        return Ok(d.to_string());
    }
    Err(EarthgraphError::Resolve { message: format!("ARG '{name}' has no default and was not supplied") })
}

/// The canonical node id of the *target* underlying a reference, dropping
/// any trailing `/artifact-path` component of its `name` (spec §3: `name`
/// is "the target (or, for an artifact reference, `target/artifact-path`)
/// within the recipe").
fn target_node_id(reference: &Reference) -> String {
    let target_name = reference.name.split('/').next().unwrap_or(&reference.name);
    let mut r = reference.clone();
    r.name = target_name.to_string();
    r.canonical()
}

/// Parse and join a raw argument that may be a target/artifact reference.
/// Returns `None` when `raw` has no `+` (a plain local filesystem path).
fn join_ref_arg(
    raw: &str,
    caller: &Reference,
    matcher: &GitOriginMatcher,
) -> Result<Option<Reference>, EarthgraphError> {
    if !raw.contains('+') {
        return Ok(None);
    }
    let parsed = Reference::parse(raw, matcher)?;
    Ok(Some(parsed.join(caller)?))
}

/// Walk `target`'s body into a [`TargetPlan`], per spec §4.E.
pub fn plan_target(
    caller: &Reference,
    target: &TargetDef,
    env: &LoweringEnv,
    matcher: &GitOriginMatcher,
) -> Result<TargetPlan, EarthgraphError> {
    let node_id = {
        let mut r = caller.clone();
        r.name = target.name.clone();
        r.canonical()
    };

    let mut plan = TargetPlan {
        node_id,
        base: BaseRef::None,
        deps: Vec::new(),
        effects: Vec::new(),
        push_effects: Vec::new(),
        outputs: Vec::new(),
        nested_build_args: HashMap::new(),
        entrypoint: None,
    };

    let mut locally = false;
    let mut arg_scope: HashMap<String, String> = HashMap::new();
    if let Some(term) = &env.term {
        arg_scope.insert("TERM".to_string(), term.clone());
    }

    for cmd in &target.body {
        let full_opcode = cmd.full_opcode();

        if full_opcode == "LOCALLY" {
            locally = true;
            continue;
        }

        if full_opcode == "ARG" {
            let raw = cmd.args.first().cloned().unwrap_or_default();
            let (name, default) = match raw.split_once('=') {
                Some((n, d)) => (n.to_string(), Some(d.to_string())),
                None => (raw.clone(), None),
            };
            let value = resolve_arg(&name, default.as_deref(), env)?;
            arg_scope.insert(name, value);
            continue;
        }

        let substituted_args: Vec<String> =
            cmd.args.iter().map(|a| substitute_vars(a, &arg_scope)).collect();

        // `ENTRYPOINT` sets the persistent entrypoint; `RUN --entrypoint`
        // overrides it for this one invocation only and must not write
        // through to `plan.entrypoint` (spec §4.E tie-break).
        if full_opcode == "ENTRYPOINT" {
            plan.entrypoint = Some(substituted_args.clone());
        }

        match full_opcode.as_str() {
            "FROM" => {
                if let Some(raw) = substituted_args.first() {
                    if let Some(reference) = join_ref_arg(raw, caller, matcher)? {
                        let id = target_node_id(&reference);
                        BaseRefDeps::add(&mut plan.deps, id.clone());
                        if let Some(overrides) = build_arg_overrides(cmd) {
                            plan.nested_build_args.insert(id.clone(), overrides);
                        }
                        plan.base = BaseRef::LocalTarget(id);
                    } else {
                        plan.base = BaseRef::Image(raw.clone());
                    }
                }
            }
            "FROM DOCKERFILE" => {
                if let Some(raw) = substituted_args.first() {
                    if let Some(reference) = join_ref_arg(raw, caller, matcher)? {
                        let id = target_node_id(&reference);
                        BaseRefDeps::add(&mut plan.deps, id.clone());
                        plan.base = BaseRef::Image(format!("dockerfile:{}", reference.render()));
                    } else {
                        plan.base = BaseRef::Image(format!("dockerfile:{raw}"));
                    }
                }
            }
            "COPY" => {
                if cmd.has_flag("dir") {
                    if let Some(first) = substituted_args.first() {
                        let is_dir = first.ends_with('/')
                            || join_ref_arg(first, caller, matcher)?
                                .map(|r| r.name.ends_with('/'))
                                .unwrap_or(false);
                        if !is_dir {
                            return Err(EarthgraphError::Resolve {
                                message: format!(
                                    "COPY --dir source '{first}' must be a directory, not a single file"
                                ),
                            });
                        }
                    }
                }
                for raw in &substituted_args {
                    if let Some(reference) = join_ref_arg(raw, caller, matcher)? {
                        BaseRefDeps::add(&mut plan.deps, target_node_id(&reference));
                    }
                }
            }
            "BUILD" => {
                if let Some(raw) = substituted_args.first() {
                    if let Some(reference) = join_ref_arg(raw, caller, matcher)? {
                        let id = target_node_id(&reference);
                        BaseRefDeps::add(&mut plan.deps, id.clone());
                        if let Some(overrides) = build_arg_overrides(cmd) {
                            plan.nested_build_args.insert(id, overrides);
                        }
                    }
                }
            }
            "SAVE ARTIFACT" => {
                let (remote_path, local_path) = split_save_artifact_args(&substituted_args);
                if let Some(remote_path) = remote_path {
                    plan.outputs.push(Artifact::File { remote_path, local_path });
                }
            }
            "SAVE IMAGE" => {
                if let Some(tag) = substituted_args.first() {
                    plan.outputs.push(Artifact::Image { tag: tag.clone() });
                }
            }
            _ => {}
        }

        let cache_class = opcode_cache_class(&full_opcode, locally);
        let flags = resolve_flags(cmd, &arg_scope);
        let effect = Effect::new(full_opcode.clone(), substituted_args, flags, cache_class);
        if cmd.has_flag("push") {
            plan.push_effects.push(effect);
        } else {
            plan.effects.push(effect);
        }
    }

    Ok(plan)
}

fn build_arg_overrides(cmd: &Command) -> Option<HashMap<String, String>> {
    let values = cmd.flag("build-arg")?.as_list();
    if values.is_empty() {
        return None;
    }
    let mut map = HashMap::new();
    for v in values {
        if let Some((k, val)) = v.split_once('=') {
            map.insert(k.to_string(), val.to_string());
        }
    }
    Some(map)
}

/// Thin helper so `plan_target` can push into `deps` with the same
/// dedup/sort behavior [`crate::lowering::graph::BuildNode`] uses.
struct BaseRefDeps;
impl BaseRefDeps {
    fn add(deps: &mut Vec<String>, id: String) {
        if !deps.contains(&id) {
            deps.push(id);
            deps.sort();
        }
    }
}
