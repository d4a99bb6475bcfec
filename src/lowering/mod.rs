//! Target-to-build-graph lowering (component E): the contract a target
//! presents to the downstream build-graph executor (spec §1, §4.E).
//!
//! [`engine`] walks one target's AST into a [`engine::TargetPlan`];
//! [`driver`] turns a set of root references into a fully lowered
//! dependency graph, gated on deps and a per-node single-flight barrier
//! (spec §5); [`context`] owns the invocation-scoped matcher registry,
//! recipe loader, and cancellation state so lowering carries no global
//! mutable state (spec §9).

pub mod context;
pub mod engine;
pub mod fingerprint;
pub mod graph;

mod driver;

pub use context::{CancellationToken, LoweringContext, RecipeLoader, StaticRecipeLoader};
pub use driver::{lower_graph, lower_node};
pub use engine::{BaseRef, LoweringEnv, TargetPlan};
pub use graph::{Artifact, BuildNode, CacheClass, Effect};
