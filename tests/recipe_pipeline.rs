//! End-to-end coverage: lex → parse → lower a realistic multi-target
//! recipe, exercising reference joining across a remote caller and
//! dependency fan-out through the driver's worker pool.

use std::sync::Arc;

use earthgraph::lowering::{
    lower_graph, LoweringContext, LoweringEnv, StaticRecipeLoader,
};
use earthgraph::matcher::GitOriginMatcher;
use earthgraph::parser::parse;
use earthgraph::reference::Reference;

const APP_RECIPE: &str = "\
base:
    FROM alpine:3.19
    RUN apk add --no-cache ca-certificates

build:
    FROM +base
    COPY --dir ./src/ ./src
    ARG VERSION=dev
    RUN echo building $VERSION
    SAVE ARTIFACT ./out/app /app

deploy:
    FROM +base
    COPY +build/app /usr/local/bin/app
    ENTRYPOINT /usr/local/bin/app
    SAVE IMAGE myapp:latest
";

#[tokio::test]
async fn lowers_a_multi_target_recipe_with_shared_base() {
    let (recipe, diagnostics) = parse(APP_RECIPE).unwrap();
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    assert_eq!(recipe.targets.len(), 3);

    let loader = StaticRecipeLoader::new().with("", recipe);
    let ctx = LoweringContext::new(GitOriginMatcher::with_defaults(), Arc::new(loader));

    let graph = lower_graph(
        &ctx,
        vec![Reference::local_internal("deploy")],
        LoweringEnv::default(),
    )
    .await
    .unwrap();

    let deploy = graph.get("+deploy").expect("deploy node present");
    assert_eq!(deploy.deps, vec!["+base".to_string(), "+build".to_string()]);
    assert_eq!(deploy.outputs.len(), 1);

    let build = graph.get("+build").expect("build node present");
    assert_eq!(build.deps, vec!["+base".to_string()]);
    assert_eq!(build.outputs.len(), 1);

    // "base" is a shared dependency of both "build" and "deploy" (which
    // also FROMs it directly); single-flight means it is lowered once and
    // every dependent observes the same fingerprint.
    let base = graph.get("+base").expect("base node present");
    assert!(base.deps.is_empty());
    assert_eq!(base.fingerprint_hex.len(), 64);
}

#[tokio::test]
async fn parse_errors_in_one_target_do_not_abort_the_whole_recipe() {
    let source = "\
broken:
    RUN --unknown-flag echo hi

healthy:
    FROM alpine
    RUN echo fine
";
    let (recipe, diagnostics) = parse(source).unwrap();
    assert!(!diagnostics.is_empty());
    assert_eq!(recipe.targets.len(), 2);
    assert_eq!(recipe.target("healthy").unwrap().body.len(), 2);
}

#[test]
fn diagnostics_render_as_path_line_column_kind_message() {
    let source = "broken:\n    RUN --unknown-flag echo hi\n";
    let (_, diagnostics) = parse(source).unwrap();
    assert_eq!(diagnostics.len(), 1);
    let rendered = earthgraph::error::render_diagnostics(&diagnostics);
    assert!(rendered.contains("ParseError"), "rendered diagnostic missing kind tag: {rendered}");
    assert!(rendered.contains(':'), "rendered diagnostic missing position separators: {rendered}");
}

#[test]
fn diagnostic_carries_the_real_file_path_of_an_on_disk_recipe() {
    use earthgraph::parser::parse_with_path;
    use std::fs;

    let dir = tempfile::tempdir().unwrap();
    let recipe_path = dir.path().join("Earthfile");
    fs::write(&recipe_path, "broken:\n    RUN --unknown-flag echo hi\n").unwrap();

    let source = fs::read_to_string(&recipe_path).unwrap();
    let (_, diagnostics) = parse_with_path(&source, Some(recipe_path.clone())).unwrap();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].position.path.as_deref(), Some(recipe_path.as_path()));
    let rendered = diagnostics[0].render();
    assert!(rendered.starts_with(&recipe_path.display().to_string()));
}
