//! Git-origin matcher (component B).
//!
//! An ordered list of patterns that map a remote reference's path prefix to
//! `(git_url, git_sub_path)`, plus the auth/clone-URL metadata the downstream
//! executor needs to actually fetch the repository. Lookup mirrors the
//! registry pattern the teacher uses for its fetch locks
//! (`cache::Cache`'s `Arc<DashMap<..>>`): reads take a shared view, a single
//! exclusive path handles configuration writes (spec §5).

use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EarthgraphError;

/// How a clone URL should be constructed for a matched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProtocol {
    Ssh,
    Https,
    Auto,
}

/// One configured pattern, as described by spec §3 and §4.B.
#[derive(Debug, Clone)]
pub struct MatcherEntry {
    pub name: String,
    pattern: Regex,
    pub git_user: String,
    /// The replacement applied to a matched `git_url` before the clone URL
    /// is assembled (spec §3 `url_substitution`), e.g. rewriting a matched
    /// host onto an internal mirror. `None` leaves the matched text as-is.
    pub url_substitution: Option<String>,
    pub auth_protocol: AuthProtocol,
    pub suffix: String,
    pub keyscan_host: Option<String>,
}

/// Declarative form of a [`MatcherEntry`], as loaded from `earthgraph.toml`.
///
/// `pattern`/`suffix` may be left empty to request the §4.B default
/// synthesis (`"<host>.com/[^/]+/[^/]+"` and `".git"` respectively).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherEntryConfig {
    pub name: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub url_substitution: Option<String>,
    #[serde(default)]
    pub git_user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub auth: Option<AuthProtocol>,
    #[serde(default)]
    pub keyscan_host: Option<String>,
}

/// A `base -> instead_of` URL rewrite pair contributed by the distinguished
/// `"global"` entry (spec §4.B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRewrite {
    pub base: String,
    pub instead_of: String,
}

/// The whole configuration document, e.g. `earthgraph.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default)]
    pub disable_ssh: bool,
    #[serde(default, rename = "matcher")]
    pub matchers: Vec<MatcherEntryConfig>,
    #[serde(default)]
    pub global_rewrites: Vec<UrlRewrite>,
}

impl MatcherConfig {
    /// Parse a `MatcherConfig` from a TOML document (grounded on the
    /// teacher's `toml`-backed manifest loading).
    pub fn from_toml(text: &str) -> Result<Self, EarthgraphError> {
        toml::from_str(text).map_err(|e| EarthgraphError::Io { message: format!("invalid matcher config: {e}") })
    }
}

/// Well-known short names that get a synthesized default pattern when no
/// explicit configuration overrides them (spec §4.B: the default pattern is
/// always `<name>.com`, so this is just the set of names, not host strings).
const BUILTIN_HOSTS: &[&str] = &["github", "gitlab", "bitbucket"];

/// The ordered registry of [`MatcherEntry`] plus the global rewrite rules.
///
/// Cloning a `GitOriginMatcher` is cheap: the registry is reference-counted
/// and interior-mutable, matching the "read-mostly... write operations take
/// an exclusive lock" resource model of spec §5.
#[derive(Clone)]
pub struct GitOriginMatcher {
    entries: Arc<DashMap<usize, MatcherEntry>>,
    order: Arc<std::sync::RwLock<Vec<usize>>>,
    next_id: Arc<std::sync::atomic::AtomicUsize>,
    rewrites: Arc<std::sync::RwLock<Vec<UrlRewrite>>>,
    disable_ssh: Arc<std::sync::atomic::AtomicBool>,
}

impl Default for GitOriginMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GitOriginMatcher {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            order: Arc::new(std::sync::RwLock::new(Vec::new())),
            next_id: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            rewrites: Arc::new(std::sync::RwLock::new(Vec::new())),
            disable_ssh: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// A registry preloaded with the common short-name defaults.
    pub fn with_defaults() -> Self {
        let matcher = Self::new();
        for name in BUILTIN_HOSTS {
            matcher
                .add(name, "", None, None, None, "", AuthProtocol::Auto, None)
                .expect("builtin host patterns are always valid regex");
        }
        matcher
    }

    /// Load a registry from a parsed [`MatcherConfig`], applied on top of
    /// the builtin defaults (explicit entries with the same name override).
    pub fn from_config(config: &MatcherConfig) -> Result<Self, EarthgraphError> {
        let matcher = Self::with_defaults();
        for entry in &config.matchers {
            if entry.name == "global" {
                *matcher.rewrites.write().unwrap() = config.global_rewrites.clone();
                continue;
            }
            matcher.add(
                &entry.name,
                &entry.pattern,
                entry.url_substitution.clone(),
                entry.git_user.clone(),
                entry.password.clone(),
                &entry.suffix,
                entry.auth.unwrap_or(AuthProtocol::Auto),
                entry.keyscan_host.clone(),
            )?;
        }
        matcher.rewrites.write().unwrap().extend(config.global_rewrites.clone());
        if config.disable_ssh {
            matcher.set_disable_ssh(true);
        }
        Ok(matcher)
    }

    /// Force `auth = https` across all entries, e.g. when no ssh-agent is
    /// available (spec §4.B).
    pub fn set_disable_ssh(&self, disable: bool) {
        self.disable_ssh.store(disable, std::sync::atomic::Ordering::SeqCst);
    }

    /// Register (or replace) a matcher entry.
    ///
    /// An empty `pattern` synthesizes `"<host>.com/[^/]+/[^/]+"` anchored at
    /// the start of the prefix; an empty `suffix` defaults to `.git`.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &self,
        name: &str,
        pattern: &str,
        substitute: Option<String>,
        git_user: Option<String>,
        _password: Option<String>,
        suffix: &str,
        auth: AuthProtocol,
        keyscan_host: Option<String>,
    ) -> Result<(), EarthgraphError> {
        let pattern_text = if pattern.is_empty() {
            format!(r"^{}\.com/[^/]+/[^/]+", regex::escape(name))
        } else if pattern.starts_with('^') {
            pattern.to_string()
        } else {
            format!("^{pattern}")
        };
        let compiled = Regex::new(&pattern_text)
            .map_err(|e| EarthgraphError::Contract { message: format!("invalid matcher pattern for '{name}': {e}") })?;
        let suffix = if suffix.is_empty() { ".git".to_string() } else { suffix.to_string() };
        let entry = MatcherEntry {
            name: name.to_string(),
            pattern: compiled,
            git_user: git_user.unwrap_or_else(|| "git".to_string()),
            url_substitution: substitute,
            auth_protocol: auth,
            suffix,
            keyscan_host,
        };

        // Replace an existing entry with the same name in place so
        // re-registration doesn't change declaration order.
        let existing_id = {
            let order = self.order.read().unwrap();
            order.iter().copied().find(|id| self.entries.get(id).map(|e| e.name == name).unwrap_or(false))
        };
        if let Some(id) = existing_id {
            self.entries.insert(id, entry);
        } else {
            let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.entries.insert(id, entry);
            self.order.write().unwrap().push(id);
        }
        Ok(())
    }

    /// Resolve a remote reference's path prefix to `(git_url, sub_path)`.
    /// The matcher is consulted in declaration order; the first match wins.
    pub fn lookup(&self, prefix: &str) -> Option<(String, String)> {
        let order = self.order.read().unwrap();
        for id in order.iter() {
            let entry = self.entries.get(id)?;
            if let Some(m) = entry.pattern.find(prefix) {
                if m.start() == 0 {
                    let git_url = m.as_str().to_string();
                    let sub_path = prefix[m.end()..].trim_start_matches('/').to_string();
                    return Some((git_url, sub_path));
                }
            }
        }
        None
    }

    /// The effective auth protocol for a resolved `git_url`, honoring the
    /// `disable_ssh` toggle.
    pub fn auth_protocol_for(&self, git_url: &str) -> AuthProtocol {
        if self.disable_ssh.load(std::sync::atomic::Ordering::SeqCst) {
            return AuthProtocol::Https;
        }
        let order = self.order.read().unwrap();
        for id in order.iter() {
            if let Some(entry) = self.entries.get(id) {
                if entry.pattern.is_match(git_url) {
                    return entry.auth_protocol;
                }
            }
        }
        AuthProtocol::Auto
    }

    /// Build the actual clone URL for a resolved `git_url`, applying the
    /// matched entry's protocol/user/suffix and any global rewrite rules.
    pub fn clone_url(&self, git_url: &str) -> String {
        let order = self.order.read().unwrap();
        let mut url = git_url.to_string();
        let mut matched_user = "git".to_string();
        let mut matched_suffix = ".git".to_string();
        for id in order.iter() {
            if let Some(entry) = self.entries.get(id) {
                if entry.pattern.is_match(git_url) {
                    matched_user = entry.git_user.clone();
                    matched_suffix = entry.suffix.clone();
                    if let Some(sub) = &entry.url_substitution {
                        url = sub.clone();
                    }
                    break;
                }
            }
        }
        for rewrite in self.rewrites.read().unwrap().iter() {
            if let Ok(re) = Regex::new(&regex::escape(&rewrite.base)) {
                if re.is_match(&url) {
                    url = re.replace(&url, rewrite.instead_of.as_str()).to_string();
                }
            }
        }
        let protocol = self.auth_protocol_for(git_url);
        match protocol {
            AuthProtocol::Https => format!("https://{url}{matched_suffix}"),
            _ => format!("{matched_user}@{}{matched_suffix}", url.replacen('/', ":", 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_github_pattern_matches_org_repo() {
        let matcher = GitOriginMatcher::with_defaults();
        let (url, sub) = matcher.lookup("github.com/acme/widgets").unwrap();
        assert_eq!(url, "github.com/acme/widgets");
        assert_eq!(sub, "");
    }

    #[test]
    fn default_pattern_leaves_remainder_as_sub_path() {
        let matcher = GitOriginMatcher::with_defaults();
        let (url, sub) = matcher.lookup("github.com/acme/widgets/examples/go").unwrap();
        assert_eq!(url, "github.com/acme/widgets");
        assert_eq!(sub, "examples/go");
    }

    #[test]
    fn unmatched_prefix_returns_none() {
        let matcher = GitOriginMatcher::with_defaults();
        assert!(matcher.lookup("example.org/acme/widgets").is_none());
    }

    #[test]
    fn first_match_wins_in_declaration_order() {
        let matcher = GitOriginMatcher::new();
        matcher
            .add("specific", r"myhost\.example\.com/special/[^/]+", None, None, None, "", AuthProtocol::Https, None)
            .unwrap();
        matcher
            .add("generic", r"myhost\.example\.com/[^/]+/[^/]+", None, None, None, "", AuthProtocol::Https, None)
            .unwrap();
        let (url, _) = matcher.lookup("myhost.example.com/special/repo").unwrap();
        assert_eq!(url, "myhost.example.com/special/repo");
    }

    #[test]
    fn disable_ssh_forces_https() {
        let matcher = GitOriginMatcher::with_defaults();
        matcher.set_disable_ssh(true);
        assert_eq!(matcher.auth_protocol_for("github.com/acme/widgets"), AuthProtocol::Https);
    }

    #[test]
    fn per_entry_url_substitution_applies_before_clone_url_is_assembled() {
        let matcher = GitOriginMatcher::new();
        matcher
            .add(
                "internal",
                r"git\.internal\.corp/[^/]+/[^/]+",
                Some("git.mirror.internal/team/repo".to_string()),
                None,
                None,
                "",
                AuthProtocol::Https,
                None,
            )
            .unwrap();
        let url = matcher.clone_url("git.internal.corp/team/repo");
        assert_eq!(url, "https://git.mirror.internal/team/repo.git");
    }

    #[test]
    fn config_round_trips_from_toml() {
        let text = r#"
            disable_ssh = false

            [[matcher]]
            name = "internal"
            pattern = "git.internal\\.corp/[^/]+/[^/]+"
            suffix = ".git"
            auth = "ssh"
        "#;
        let config = MatcherConfig::from_toml(text).unwrap();
        let matcher = GitOriginMatcher::from_config(&config).unwrap();
        let (url, _) = matcher.lookup("git.internal.corp/team/repo").unwrap();
        assert_eq!(url, "git.internal.corp/team/repo");
    }
}
