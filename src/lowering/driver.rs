//! Bounded-concurrency worker-pool driver over [`engine::plan_target`],
//! gated on each target's dependencies and the single-flight barrier (spec
//! §5, §9 "prefer a work-stealing pool keyed by fingerprint with a
//! per-fingerprint barrier").
//!
//! Grounded on the teacher's `installer` module, which fans out parallel
//! per-resource work with `futures::stream::iter(..).buffer_unordered(n)`
//! rather than a hand-rolled thread pool.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::EarthgraphError;
use crate::lowering::context::LoweringContext;
use crate::lowering::engine::{self, BaseRef, LoweringEnv};
use crate::lowering::graph::BuildNode;
use crate::reference::Reference;

/// How many targets may be lowered (or have their recipe loaded) at once.
const DEFAULT_CONCURRENCY: usize = 8;

/// Lower `reference`'s target into a [`BuildNode`], recursively lowering
/// (and single-flighting) every dependency it discovers along the way.
///
/// `path` is the chain of node ids on the current recursion branch, local
/// to this call tree rather than shared mutable state (spec §9: "DFS with
/// gray/black marking"). Carrying it by value per branch, instead of a
/// context-wide "on stack" set, is what keeps cycle detection correct
/// under concurrency: two sibling branches that both depend on the same
/// node (a diamond, not a cycle) never see each other's path, so a
/// concurrent single-flight hit on a shared dependency is never mistaken
/// for a cycle. A true cycle always revisits a node id already in *its
/// own* path.
pub fn lower_node<'a>(
    ctx: &'a LoweringContext,
    reference: Reference,
    env: LoweringEnv,
    path: Vec<String>,
) -> BoxFuture<'a, Result<Arc<BuildNode>, EarthgraphError>> {
    Box::pin(async move {
        let target_name = reference.name.split('/').next().unwrap_or(&reference.name).to_string();
        let node_id = {
            let mut r = reference.clone();
            r.name = target_name.clone();
            r.canonical()
        };

        if path.contains(&node_id) {
            let mut cycle = path;
            cycle.push(node_id);
            return Err(EarthgraphError::Cycle { path: cycle });
        }

        lower_node_inner(ctx, &reference, &target_name, &node_id, env, &path).await
    })
}

async fn lower_node_inner(
    ctx: &LoweringContext,
    reference: &Reference,
    target_name: &str,
    node_id: &str,
    env: LoweringEnv,
    path: &[String],
) -> Result<Arc<BuildNode>, EarthgraphError> {
    ctx.single_flight(node_id, async move {
        if ctx.cancellation.is_cancelled() {
            return Err(EarthgraphError::Io { message: "lowering cancelled".to_string() });
        }

        let project_canonical = reference.project_canonical();
        debug!(project = %project_canonical, target = %target_name, "loading recipe");
        let recipe = ctx.load_recipe(&project_canonical).await?;
        let target = recipe.target(target_name).ok_or_else(|| EarthgraphError::Resolve {
            message: format!("target '{target_name}' not found in project '{project_canonical}'"),
        })?;
        // The base block is a file-level preamble shared by every target in
        // the recipe (spec §3/§4.D), so its commands run ahead of the
        // target's own body.
        let effective_target = crate::parser::ast::TargetDef {
            name: target.name.clone(),
            body: recipe.effective_commands(target),
            line: target.line,
        };

        let plan = engine::plan_target(reference, &effective_target, &env, &ctx.matcher)?;

        let mut child_path = path.to_vec();
        child_path.push(node_id.to_string());

        let dep_results: Vec<Result<(String, Arc<BuildNode>), EarthgraphError>> =
            stream::iter(plan.deps.iter().cloned())
                .map(|dep_id| {
                    let child_path = child_path.clone();
                    let dep_env = LoweringEnv {
                        build_args: plan.nested_build_args.get(&dep_id).cloned().unwrap_or_default(),
                        dotenv: env.dotenv.clone(),
                        term: env.term.clone(),
                    };
                    async move {
                        let dep_ref = Reference::parse(&dep_id, &ctx.matcher)?;
                        let node = lower_node(ctx, dep_ref, dep_env, child_path).await?;
                        Ok((dep_id, node))
                    }
                })
                .buffer_unordered(DEFAULT_CONCURRENCY)
                .collect()
                .await;

        let mut dep_nodes = HashMap::with_capacity(dep_results.len());
        for r in dep_results {
            let (id, node) = r?;
            dep_nodes.insert(id, node);
        }

        let base_descriptor = match &plan.base {
            BaseRef::Image(s) => s.clone(),
            BaseRef::LocalTarget(id) => dep_nodes
                .get(id)
                .map(|n| n.fingerprint_hex.clone())
                .ok_or_else(|| EarthgraphError::Contract {
                    message: format!("base dependency '{id}' missing from lowered deps"),
                })?,
            BaseRef::None => String::new(),
        };

        let fingerprint_hex =
            crate::lowering::fingerprint::compute(&plan.node_id, &base_descriptor, &plan.effects);

        let node = Arc::new(BuildNode {
            node_id: plan.node_id.clone(),
            fingerprint_hex,
            deps: plan.deps,
            effects: plan.effects,
            push_effects: plan.push_effects,
            outputs: plan.outputs,
        });
        ctx.record_result(&plan.node_id, node.clone());
        info!(node_id = %plan.node_id, "lowered target");
        Ok(node)
    })
    .await
}

/// Lower every target in `roots` (and everything they transitively depend
/// on), returning every node produced. Siblings among `roots` run
/// concurrently; a failure in one cancels the others' not-yet-started work
/// (spec §5) but nodes already completed remain in the returned map.
pub async fn lower_graph(
    ctx: &LoweringContext,
    roots: Vec<Reference>,
    env: LoweringEnv,
) -> Result<HashMap<String, Arc<BuildNode>>, EarthgraphError> {
    let mut in_flight = stream::iter(roots.into_iter())
        .map(|r| {
            let env = env.clone();
            async move { lower_node(ctx, r, env, Vec::new()).await }
        })
        .buffer_unordered(DEFAULT_CONCURRENCY);

    // Poll as results arrive rather than collecting the whole stream first:
    // cancelling only after every root (and all its transitive children) has
    // already finished would make "not-yet-started children stop" (spec §5)
    // unreachable. Cancelling as soon as the first failure is observed still
    // lets not-yet-polled siblings see `is_cancelled()` and exit early.
    let mut first_err = None;
    while let Some(outcome) = in_flight.next().await {
        if let Err(e) = outcome {
            warn!(error = %e, "lowering failed, cancelling outstanding siblings");
            ctx.cancellation.cancel();
            first_err.get_or_insert(e);
        }
    }
    if let Some(err) = first_err {
        return Err(err);
    }
    Ok(ctx.results_snapshot())
}
