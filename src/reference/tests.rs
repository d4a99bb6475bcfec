//! Reference parse/render/join scenarios from spec §8 (S1-S4) plus the
//! round-trip and idempotency invariants.

use super::*;

fn matcher() -> GitOriginMatcher {
    GitOriginMatcher::with_defaults()
}

#[test]
fn s1_local_internal() {
    let m = matcher();
    let r = Reference::parse("+build", &m).unwrap();
    assert_eq!(r.origin, Origin::LocalInternal);
    assert_eq!(r.name, "build");
    assert_eq!(r.render(), "+build");
}

#[test]
fn s2_local_external() {
    let m = matcher();
    let r = Reference::parse("./sub/dir+test", &m).unwrap();
    assert_eq!(r.origin, Origin::LocalExternal { local_path: "./sub/dir".to_string() });
    assert_eq!(r.name, "test");
    assert_eq!(r.render(), "./sub/dir+test");
}

#[test]
fn s3_remote() {
    let m = matcher();
    let input = "github.com/acme/widgets:v1.2+release";
    let r = Reference::parse(input, &m).unwrap();
    assert_eq!(
        r.origin,
        Origin::Remote {
            git_url: "github.com/acme/widgets".to_string(),
            git_sub_path: String::new(),
            tag: "v1.2".to_string(),
        }
    );
    assert_eq!(r.name, "release");
    assert_eq!(r.canonical(), input);
}

#[test]
fn s4_join_remote_caller_with_local_external_ref() {
    let caller = Reference {
        origin: Origin::Remote {
            git_url: "github.com/acme/widgets".to_string(),
            git_sub_path: "examples/go".to_string(),
            tag: "main".to_string(),
        },
        name: "caller-target".to_string(),
    };
    let r#ref = Reference { origin: Origin::LocalExternal { local_path: "./sub".to_string() }, name: "t".to_string() };
    let joined = r#ref.join(&caller).unwrap();
    assert_eq!(
        joined.origin,
        Origin::Remote {
            git_url: "github.com/acme/widgets".to_string(),
            git_sub_path: "examples/go/sub".to_string(),
            tag: "main".to_string(),
        }
    );
    assert_eq!(joined.name, "t");
}

#[test]
fn s4_join_remote_caller_with_absolute_ref_is_context_error() {
    let caller = Reference {
        origin: Origin::Remote {
            git_url: "github.com/acme/widgets".to_string(),
            git_sub_path: "examples/go".to_string(),
            tag: "main".to_string(),
        },
        name: "caller-target".to_string(),
    };
    let r#ref =
        Reference { origin: Origin::LocalExternal { local_path: "/abs/sub".to_string() }, name: "t".to_string() };
    assert!(matches!(r#ref.join(&caller), Err(EarthgraphError::Ref { .. })));
}

#[test]
fn join_remote_caller_with_local_internal_inherits_sub_path() {
    let caller = Reference {
        origin: Origin::Remote {
            git_url: "github.com/acme/widgets".to_string(),
            git_sub_path: "examples/go".to_string(),
            tag: "main".to_string(),
        },
        name: "caller-target".to_string(),
    };
    let r#ref = Reference::local_internal("sibling");
    let joined = r#ref.join(&caller).unwrap();
    assert_eq!(
        joined.origin,
        Origin::Remote {
            git_url: "github.com/acme/widgets".to_string(),
            git_sub_path: "examples/go".to_string(),
            tag: "main".to_string(),
        }
    );
}

#[test]
fn join_local_caller_with_local_internal_inherits_path() {
    let m = matcher();
    let caller = Reference::parse("./sub/dir+caller", &m).unwrap();
    let r#ref = Reference::local_internal("sibling");
    let joined = r#ref.join(&caller).unwrap();
    assert_eq!(joined.origin, Origin::LocalExternal { local_path: "./sub/dir".to_string() });
}

#[test]
fn join_local_caller_with_remote_ref_is_unchanged() {
    let m = matcher();
    let caller = Reference::parse("./sub/dir+caller", &m).unwrap();
    let r#ref = Reference::parse("github.com/acme/widgets+release", &m).unwrap();
    let joined = r#ref.join(&caller).unwrap();
    assert_eq!(joined, r#ref);
}

#[test]
fn join_local_caller_with_absolute_external_ref_keeps_it() {
    let m = matcher();
    let caller = Reference::parse("./sub/dir+caller", &m).unwrap();
    let r#ref = Reference { origin: Origin::LocalExternal { local_path: "/abs/x".to_string() }, name: "t".to_string() };
    let joined = r#ref.join(&caller).unwrap();
    assert_eq!(joined.origin, Origin::LocalExternal { local_path: "/abs/x".to_string() });
}

#[test]
fn missing_plus_is_syntax_error() {
    let m = matcher();
    assert!(Reference::parse("no-plus-here", &m).is_err());
}

#[test]
fn unresolved_remote_is_ref_error() {
    let m = matcher();
    assert!(Reference::parse("example.org/acme/widgets+build", &m).is_err());
}

#[test]
fn invariant_round_trip_local_internal() {
    let m = matcher();
    for s in ["+build", "+release-candidate"] {
        let r = Reference::parse(s, &m).unwrap();
        assert_eq!(r.render(), s);
    }
}

#[test]
fn invariant_round_trip_local_external() {
    let m = matcher();
    for s in ["./a+x", "../a/b+y", "/abs/a+z"] {
        let r = Reference::parse(s, &m).unwrap();
        assert_eq!(r.render(), s);
    }
}

#[test]
fn invariant_round_trip_remote() {
    let m = matcher();
    for s in ["github.com/acme/widgets+release", "github.com/acme/widgets:v1.2+release", "github.com/acme/widgets/examples/go:main+build"] {
        let r = Reference::parse(s, &m).unwrap();
        assert_eq!(r.render(), s);
    }
}

#[test]
fn invariant_canonical_idempotent() {
    let m = matcher();
    for s in ["+build", "./a+x", "github.com/acme/widgets:v1.2+release"] {
        let r = Reference::parse(s, &m).unwrap();
        assert_eq!(r.canonical(), Reference::parse(&r.canonical(), &m).unwrap().canonical());
    }
}

#[test]
fn project_canonical_forms() {
    let m = matcher();
    assert_eq!(Reference::parse("+build", &m).unwrap().project_canonical(), "");
    assert_eq!(Reference::parse("./sub/dir+build", &m).unwrap().project_canonical(), "dir");
    assert_eq!(
        Reference::parse("github.com/acme/widgets:v1.2+release", &m).unwrap().project_canonical(),
        "github.com/acme/widgets:v1.2"
    );
}
