//! POSIX-semantics path cleaning for reference local paths.
//!
//! Reference joining always uses forward-slash, POSIX-style path math (spec
//! §4.A "tie-breaks") regardless of the host platform's native separator, so
//! this intentionally does not use [`std::path::Path`] (which resolves
//! separators per-platform and would make the crate's output diverge between
//! Windows and Unix builds of the same recipe).

/// Collapse `.` and `..` components the way `path.Clean` does, treating a
/// leading `/` as marking an absolute path. Does not add a leading `./`;
/// callers that need that (local_path rendering) apply it separately.
pub(crate) fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ => {
                    if !absolute {
                        out.push("..");
                    }
                }
            },
            segment => out.push(segment),
        }
    }
    let joined = out.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Strip a single leading `./` so two relative forms can be concatenated
/// without doubling it, e.g. joining `.` with `./sub` should yield `sub`
/// (before the `./` prefix rule is re-applied by the caller).
pub(crate) fn strip_leading_dot_slash(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

/// Re-apply the "relative forms begin with `./` or `../`" invariant
/// (spec §3) to an already-cleaned, non-absolute path.
pub(crate) fn with_dot_slash_prefix(cleaned: &str) -> String {
    if cleaned.starts_with('/') || cleaned.starts_with('.') {
        cleaned.to_string()
    } else {
        format!("./{cleaned}")
    }
}

/// Join a caller's local path with a relative reference's local path,
/// applying the `./` prefix invariant to the result. Used by [`crate::reference::Reference::join`].
pub(crate) fn join_local(base: &str, rel: &str) -> String {
    let base = strip_leading_dot_slash(base);
    let rel = strip_leading_dot_slash(rel);
    let joined = if base.is_empty() || base == "." {
        rel.to_string()
    } else {
        format!("{base}/{rel}")
    };
    let cleaned = clean(&joined);
    with_dot_slash_prefix(&cleaned)
}

/// Join a caller's `git_sub_path` (always relative, never `./`-prefixed)
/// with a relative reference's local path.
pub(crate) fn join_sub_path(base: &str, rel: &str) -> String {
    let rel = strip_leading_dot_slash(rel);
    let joined = if base.is_empty() { rel.to_string() } else { format!("{base}/{rel}") };
    clean(&joined)
}

/// The final path segment, used by [`crate::reference::Reference::project_canonical`].
pub(crate) fn last_segment(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_dot_components() {
        assert_eq!(clean("./sub/./dir"), "sub/dir");
        assert_eq!(clean("a/b/../c"), "a/c");
        assert_eq!(clean(""), ".");
    }

    #[test]
    fn clean_preserves_absolute() {
        assert_eq!(clean("/a/b/../c"), "/a/c");
        assert_eq!(clean("/../a"), "/a");
    }

    #[test]
    fn clean_preserves_leading_dotdot_when_relative() {
        assert_eq!(clean("../a/../../b"), "../../b");
    }

    #[test]
    fn join_local_from_root() {
        assert_eq!(join_local(".", "./sub"), "./sub");
    }

    #[test]
    fn join_local_nested() {
        assert_eq!(join_local("./sub/dir", "./more"), "./sub/dir/more");
    }

    #[test]
    fn join_local_onto_absolute_base() {
        assert_eq!(join_local("/abs/dir", "./sub"), "/abs/dir/sub");
    }

    #[test]
    fn join_sub_path_examples() {
        assert_eq!(join_sub_path("examples/go", "./sub"), "examples/go/sub");
        assert_eq!(join_sub_path("", "./sub"), "sub");
    }

    #[test]
    fn last_segment_examples() {
        assert_eq!(last_segment("./sub/dir"), "dir");
        assert_eq!(last_segment("/abs/dir/"), "dir");
    }
}
