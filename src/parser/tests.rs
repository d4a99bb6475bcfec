use super::*;
use crate::parser::ast::FlagValue;

#[test]
fn empty_source_yields_no_nodes() {
    let (recipe, diags) = parse("").unwrap();
    assert!(diags.is_empty());
    assert!(recipe.base_block.is_empty());
    assert!(recipe.targets.is_empty());
}

#[test]
fn comment_only_source_yields_no_nodes() {
    let (recipe, diags) = parse("# just a comment\n").unwrap();
    assert!(diags.is_empty());
    assert!(recipe.targets.is_empty());
}

#[test]
fn single_target_with_plain_commands() {
    let src = "build:\n    FROM alpine:3.19\n    RUN echo hi\n";
    let (recipe, diags) = parse(src).unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(recipe.targets.len(), 1);
    let t = &recipe.targets[0];
    assert_eq!(t.name, "build");
    assert_eq!(t.body.len(), 2);
    assert_eq!(t.body[0].opcode, "FROM");
    assert_eq!(t.body[0].args, vec!["alpine:3.19"]);
    assert_eq!(t.body[1].opcode, "RUN");
    assert_eq!(t.body[1].args, vec!["echo", "hi"]);
}

#[test]
fn base_block_before_first_target() {
    let src = "ARG name\nbuild:\n    RUN echo hi\n";
    let (recipe, diags) = parse(src).unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(recipe.base_block.len(), 1);
    assert_eq!(recipe.base_block[0].opcode, "ARG");
    assert_eq!(recipe.targets.len(), 1);
}

#[test]
fn multiple_targets_parse_in_order() {
    let src = "a:\n    RUN echo a\nb:\n    RUN echo b\n";
    let (recipe, diags) = parse(src).unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(recipe.targets.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
}

#[test]
fn from_dockerfile_sub_opcode_is_resolved() {
    let src = "build:\n    FROM DOCKERFILE +ctx/\n";
    let (recipe, diags) = parse(src).unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    let cmd = &recipe.targets[0].body[0];
    assert_eq!(cmd.opcode, "FROM");
    assert_eq!(cmd.sub_opcode.as_deref(), Some("DOCKERFILE"));
    assert_eq!(cmd.args, vec!["+ctx/"]);
}

#[test]
fn save_artifact_sub_opcode_is_resolved() {
    let src = "build:\n    SAVE ARTIFACT ./out AS LOCAL out.bin\n";
    let (recipe, _) = parse(src).unwrap();
    let cmd = &recipe.targets[0].body[0];
    assert_eq!(cmd.full_opcode(), "SAVE ARTIFACT");
}

#[test]
fn bare_flag_defaults_to_bool_true() {
    let src = "build:\n    RUN --push echo hi\n";
    let (recipe, _) = parse(src).unwrap();
    let cmd = &recipe.targets[0].body[0];
    assert_eq!(cmd.flag("push"), Some(&FlagValue::Bool(true)));
}

#[test]
fn flag_with_value_is_captured() {
    let src = "build:\n    COPY --platform=linux/amd64 src dst\n";
    let (recipe, diags) = parse(src).unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    let cmd = &recipe.targets[0].body[0];
    assert_eq!(cmd.flag("platform"), Some(&FlagValue::Str("linux/amd64".to_string())));
    assert_eq!(cmd.args, vec!["src", "dst"]);
}

#[test]
fn repeated_flag_promotes_to_list() {
    let src = "build:\n    BUILD --build-arg=A=1 --build-arg=B=2 +dep\n";
    let (recipe, diags) = parse(src).unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    let cmd = &recipe.targets[0].body[0];
    match cmd.flag("build-arg").unwrap() {
        FlagValue::List(items) => assert_eq!(items, &["A=1".to_string(), "B=2".to_string()]),
        other => panic!("expected list, got {other:?}"),
    }
}

#[test]
fn unknown_flag_on_closed_opcode_is_diagnosed_and_recovers() {
    let src = "build:\n    ARG --bogus name\n    RUN echo hi\n";
    let (recipe, diags) = parse(src).unwrap();
    assert_eq!(diags.len(), 1);
    assert!(diags[0].render().contains("unknown flag"));
    // Parsing continues past the bad command.
    assert_eq!(recipe.targets[0].body.len(), 2);
}

#[test]
fn heredoc_body_attaches_to_its_command() {
    let src = "build:\n    RUN <<EOF\n    echo hi\nEOF\n";
    let (recipe, diags) = parse(src).unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    let cmd = &recipe.targets[0].body[0];
    assert_eq!(cmd.heredoc_body.as_deref(), Some("    echo hi\n"));
}

#[test]
fn passthrough_opcode_is_accepted_opaquely() {
    let src = "build:\n    HEALTHCHECK --interval=5s CMD true\n";
    let (recipe, diags) = parse(src).unwrap();
    assert!(diags.is_empty(), "{diags:?}");
    let cmd = &recipe.targets[0].body[0];
    assert_eq!(cmd.opcode, "HEALTHCHECK");
    assert_eq!(cmd.flag("interval"), Some(&FlagValue::Str("5s".to_string())));
}
