//! AST node shapes produced by [`super::Parser`] (spec §3).

use std::collections::BTreeMap;

/// A whole recipe file: an optional file-level preamble, then targets in
/// source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipe {
    /// Commands at indent 0 before any target header.
    pub base_block: Vec<Command>,
    pub targets: Vec<TargetDef>,
}

impl Recipe {
    pub fn target(&self, name: &str) -> Option<&TargetDef> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// A target's commands with the file-level `base_block` prepended
    /// (spec §3/§4.D: base-block `ARG`/`FROM`/etc. apply to every target).
    pub fn effective_commands(&self, target: &TargetDef) -> Vec<Command> {
        self.base_block.iter().cloned().chain(target.body.iter().cloned()).collect()
    }
}

/// A single named target and its command body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDef {
    pub name: String,
    pub body: Vec<Command>,
    pub line: usize,
}

/// The value of a parsed `--flag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
    List(Vec<String>),
}

impl FlagValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn as_list(&self) -> Vec<&str> {
        match self {
            FlagValue::Str(s) => vec![s.as_str()],
            FlagValue::List(items) => items.iter().map(String::as_str).collect(),
            FlagValue::Bool(_) => Vec::new(),
        }
    }

    /// Merge a newly parsed occurrence of the same flag name into `self`,
    /// promoting to [`FlagValue::List`] on repetition (spec §3: a flag
    /// value may be "list-of-string").
    fn merge(self, new: FlagValue) -> FlagValue {
        match (self, new) {
            (FlagValue::List(mut items), FlagValue::Str(s)) => {
                items.push(s);
                FlagValue::List(items)
            }
            (FlagValue::List(mut items), FlagValue::List(more)) => {
                items.extend(more);
                FlagValue::List(items)
            }
            (FlagValue::Str(prev), FlagValue::Str(s)) => FlagValue::List(vec![prev, s]),
            (_, new) => new,
        }
    }
}

/// A single command within a target body or the base block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub opcode: String,
    /// The resolved sub-opcode, e.g. `DOCKERFILE` for `FROM DOCKERFILE`,
    /// `ARTIFACT`/`IMAGE` for `SAVE ARTIFACT`/`SAVE IMAGE`, `CLONE` for `GIT CLONE`.
    pub sub_opcode: Option<String>,
    pub flags: BTreeMap<String, FlagValue>,
    pub args: Vec<String>,
    pub heredoc_body: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl Command {
    pub(super) fn new(opcode: String, line: usize, column: usize) -> Self {
        Self {
            opcode,
            sub_opcode: None,
            flags: BTreeMap::new(),
            args: Vec::new(),
            heredoc_body: None,
            line,
            column,
        }
    }

    pub(super) fn set_flag(&mut self, name: String, value: FlagValue) {
        self.flags
            .entry(name)
            .and_modify(|existing| {
                let taken = std::mem::replace(existing, FlagValue::Bool(false));
                *existing = taken.merge(value.clone());
            })
            .or_insert(value);
    }

    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Opcode name including the resolved sub-opcode, e.g. `"FROM DOCKERFILE"`.
    pub fn full_opcode(&self) -> String {
        match &self.sub_opcode {
            Some(sub) => format!("{} {sub}", self.opcode),
            None => self.opcode.clone(),
        }
    }
}
