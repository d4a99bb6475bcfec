//! Target/artifact reference algebra (component A).
//!
//! A [`Reference`] identifies a target (or, via its `name`, an artifact
//! within a target) across three origin classes: local to the calling
//! recipe, local to a sibling directory, or remote in a git-hosted repo at a
//! revision. Origin is modeled as a tagged variant rather than three
//! optional fields (spec §9 design note) so the invariants in spec §3 are
//! checkable at construction instead of by convention.

mod path;

use std::fmt;

use crate::error::EarthgraphError;
use crate::matcher::GitOriginMatcher;

/// Which kind of project a [`Reference`] points into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The same recipe file the reference appears in.
    LocalInternal,
    /// A sibling directory's recipe, identified by filesystem path.
    LocalExternal { local_path: String },
    /// A recipe in a git-hosted repository at an optional revision.
    Remote { git_url: String, git_sub_path: String, tag: String },
}

/// A fully parsed target or artifact reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub origin: Origin,
    /// The target name, or `target/artifact-path` for an artifact reference.
    pub name: String,
}

impl Reference {
    /// Construct a `LocalInternal` reference directly, e.g. for synthetic
    /// references the lowering engine builds internally.
    pub fn local_internal(name: impl Into<String>) -> Self {
        Self { origin: Origin::LocalInternal, name: name.into() }
    }

    /// Parse `text` into a [`Reference`], resolving any remote prefix
    /// through `matcher` (spec §4.A).
    pub fn parse(text: &str, matcher: &GitOriginMatcher) -> Result<Self, EarthgraphError> {
        let Some(plus_pos) = text.find('+') else {
            return Err(EarthgraphError::Ref {
                message: format!("reference '{text}' is missing the required '+'"),
            });
        };
        let prefix = &text[..plus_pos];
        let name = &text[plus_pos + 1..];
        if name.is_empty() {
            return Err(EarthgraphError::Ref { message: format!("reference '{text}' has an empty name") });
        }

        if prefix.is_empty() {
            return Ok(Self { origin: Origin::LocalInternal, name: name.to_string() });
        }

        if prefix.starts_with('.') || prefix.starts_with('/') {
            let cleaned = path::clean(prefix);
            let local_path = if cleaned.starts_with('/') { cleaned } else { path::with_dot_slash_prefix(&cleaned) };
            return Ok(Self { origin: Origin::LocalExternal { local_path }, name: name.to_string() });
        }

        let (path_part, tag) = match prefix.find(':') {
            Some(colon) => (&prefix[..colon], prefix[colon + 1..].to_string()),
            None => (prefix, String::new()),
        };
        let Some((git_url, git_sub_path)) = matcher.lookup(path_part) else {
            return Err(EarthgraphError::Ref {
                message: format!("no git-origin matcher accepts remote reference prefix '{path_part}'"),
            });
        };
        Ok(Self { origin: Origin::Remote { git_url, git_sub_path, tag }, name: name.to_string() })
    }

    /// Render in the form the reference was written, per spec §4.A.
    pub fn render(&self) -> String {
        match &self.origin {
            Origin::LocalInternal => format!("+{}", self.name),
            Origin::LocalExternal { local_path } => format!("{local_path}+{}", self.name),
            Origin::Remote { git_url, git_sub_path, tag } => {
                let mut s = git_url.clone();
                if !git_sub_path.is_empty() {
                    s.push('/');
                    s.push_str(git_sub_path);
                }
                if !tag.is_empty() {
                    s.push(':');
                    s.push_str(tag);
                }
                s.push('+');
                s.push_str(&self.name);
                s
            }
        }
    }

    /// Render always in `Remote` form when a `git_url` is present,
    /// regardless of origin class. Used for fingerprinting (spec §4.A).
    ///
    /// For non-remote references this is identical to [`Reference::render`].
    pub fn canonical(&self) -> String {
        self.render()
    }

    /// Render only the project part (drop `+name`), per spec §4.A.
    pub fn project_canonical(&self) -> String {
        match &self.origin {
            Origin::LocalInternal => String::new(),
            Origin::LocalExternal { local_path } => path::last_segment(local_path).to_string(),
            Origin::Remote { git_url, git_sub_path, tag } => {
                let mut s = git_url.clone();
                if !git_sub_path.is_empty() {
                    s.push('/');
                    s.push_str(git_sub_path);
                }
                if !tag.is_empty() {
                    s.push(':');
                    s.push_str(tag);
                }
                s
            }
        }
    }

    /// Re-root `self` relative to `caller` (spec §4.A "Join").
    pub fn join(&self, caller: &Reference) -> Result<Reference, EarthgraphError> {
        // A remote reference is already absolute and never needs rerooting.
        if matches!(self.origin, Origin::Remote { .. }) {
            return Ok(self.clone());
        }

        match &caller.origin {
            Origin::Remote { git_url, git_sub_path, tag } => match &self.origin {
                Origin::LocalExternal { local_path } => {
                    if local_path.starts_with('/') {
                        return Err(EarthgraphError::Ref {
                            message: format!(
                                "absolute local path '{local_path}' cannot be used from a remote caller"
                            ),
                        });
                    }
                    let new_sub_path = path::join_sub_path(git_sub_path, local_path);
                    Ok(Reference {
                        origin: Origin::Remote {
                            git_url: git_url.clone(),
                            git_sub_path: new_sub_path,
                            tag: tag.clone(),
                        },
                        name: self.name.clone(),
                    })
                }
                Origin::LocalInternal => Ok(Reference {
                    origin: Origin::Remote {
                        git_url: git_url.clone(),
                        git_sub_path: git_sub_path.clone(),
                        tag: tag.clone(),
                    },
                    name: self.name.clone(),
                }),
                Origin::Remote { .. } => unreachable!("handled above"),
            },
            // Caller is local (Internal or External).
            caller_local => {
                let caller_local_path = match caller_local {
                    Origin::LocalInternal => ".",
                    Origin::LocalExternal { local_path } => local_path.as_str(),
                    Origin::Remote { .. } => unreachable!("handled above"),
                };
                match &self.origin {
                    Origin::LocalExternal { local_path } if local_path.starts_with('/') => {
                        Ok(Reference {
                            origin: Origin::LocalExternal { local_path: path::clean(local_path) },
                            name: self.name.clone(),
                        })
                    }
                    Origin::LocalExternal { local_path } => Ok(Reference {
                        origin: Origin::LocalExternal {
                            local_path: path::join_local(caller_local_path, local_path),
                        },
                        name: self.name.clone(),
                    }),
                    Origin::LocalInternal => Ok(Reference {
                        origin: caller_local.clone(),
                        name: self.name.clone(),
                    }),
                    Origin::Remote { .. } => unreachable!("handled above"),
                }
            }
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests;
