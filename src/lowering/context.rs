//! Invocation-scoped owner of the resources lowering needs but spec §9
//! forbids keeping as global mutable state: the git-origin matcher
//! registry, the recipe-loader collaborator, the single-flight map, and a
//! cancellation token (spec §5, §9 "no global mutable state").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::{Notify, OnceCell};

use crate::error::EarthgraphError;
use crate::matcher::GitOriginMatcher;
use crate::parser::ast::Recipe;

/// The collaborator that loads a recipe file given its project-canonical
/// form (spec §4.E: "the lowering component demands it from an external
/// recipe loader collaborator"). Spec never names this as a concrete type;
/// it's defined here so the lowering engine stays host-agnostic and
/// testable with an in-memory fake instead of real disk/git I/O.
///
/// Returns a boxed future rather than using an `async fn` in a trait so the
/// trait object stays dyn-safe without pulling in an async-trait macro
/// crate the rest of the dependency stack doesn't otherwise need.
pub trait RecipeLoader: Send + Sync {
    fn load(&self, project_canonical: &str) -> BoxFuture<'_, Result<Arc<Recipe>, EarthgraphError>>;
}

/// A trivial in-memory [`RecipeLoader`] used by tests and by callers
/// lowering a single self-contained recipe with no cross-recipe `BUILD`s.
pub struct StaticRecipeLoader {
    recipes: std::collections::HashMap<String, Arc<Recipe>>,
}

impl StaticRecipeLoader {
    pub fn new() -> Self {
        Self { recipes: std::collections::HashMap::new() }
    }

    pub fn with(mut self, project_canonical: impl Into<String>, recipe: Recipe) -> Self {
        self.recipes.insert(project_canonical.into(), Arc::new(recipe));
        self
    }
}

impl Default for StaticRecipeLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeLoader for StaticRecipeLoader {
    fn load(&self, project_canonical: &str) -> BoxFuture<'_, Result<Arc<Recipe>, EarthgraphError>> {
        let key = project_canonical.to_string();
        Box::pin(async move {
            self.recipes.get(&key).cloned().ok_or_else(|| EarthgraphError::Io {
                message: format!("no recipe registered for project '{key}'"),
            })
        })
    }
}

/// Cooperative cancellation: checked at the two suspension points spec §5
/// names (recipe loading, the single-flight wait). Cancelling notifies
/// every waiter immediately; in-progress lowerings are expected to check
/// [`CancellationToken::is_cancelled`] between awaits and exit early.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)), notify: Arc::new(Notify::new()) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

type NodeResult = Result<Arc<crate::lowering::graph::BuildNode>, EarthgraphError>;

/// Owns the read-mostly matcher registry plus the write-heavy single-flight
/// map for one lowering invocation. Cheap to clone: every field is
/// reference-counted, matching the teacher's `Cache` (`Arc<DashMap<..>>`
/// fetch locks) resource-sharing pattern.
#[derive(Clone)]
pub struct LoweringContext {
    pub matcher: GitOriginMatcher,
    loader: Arc<dyn RecipeLoader>,
    /// Per-canonical-reference single-flight barrier (spec §5): the first
    /// caller to reach a given node id computes it; later callers await
    /// that `OnceCell` instead of re-lowering.
    in_flight: Arc<DashMap<String, Arc<OnceCell<NodeResult>>>>,
    pub cancellation: CancellationToken,
    /// Every successfully lowered node this invocation has produced so
    /// far, keyed by node id. Completed children are retained even after
    /// a sibling is cancelled (spec §5).
    results: Arc<DashMap<String, Arc<crate::lowering::graph::BuildNode>>>,
}

impl LoweringContext {
    pub fn new(matcher: GitOriginMatcher, loader: Arc<dyn RecipeLoader>) -> Self {
        Self {
            matcher,
            loader,
            in_flight: Arc::new(DashMap::new()),
            cancellation: CancellationToken::new(),
            results: Arc::new(DashMap::new()),
        }
    }

    pub(super) fn record_result(&self, node_id: &str, node: Arc<crate::lowering::graph::BuildNode>) {
        self.results.insert(node_id.to_string(), node);
    }

    /// A snapshot of every node lowered so far in this invocation.
    pub fn results_snapshot(&self) -> std::collections::HashMap<String, Arc<crate::lowering::graph::BuildNode>> {
        self.results.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }

    pub async fn load_recipe(&self, project_canonical: &str) -> Result<Arc<Recipe>, EarthgraphError> {
        self.loader.load(project_canonical).await
    }

    /// Run `compute` for `node_id` at most once per context; concurrent
    /// callers for the same `node_id` await the first call's result.
    pub async fn single_flight<F>(&self, node_id: &str, compute: F) -> NodeResult
    where
        F: std::future::Future<Output = NodeResult>,
    {
        let cell = self
            .in_flight
            .entry(node_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_init(|| compute).await.clone()
    }
}
