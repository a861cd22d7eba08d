//! Execution kinds and output kinds declared by tasks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a task executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// One-shot read and write.
    #[default]
    Batch,
    /// Continuous, checkpointed query.
    Streaming,
}

impl ExecutionKind {
    /// Parses an execution kind token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "batch" => Some(Self::Batch),
            "streaming" => Some(Self::Streaming),
            _ => None,
        }
    }

    /// Returns the configuration token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Streaming => "streaming",
        }
    }

    /// Returns true for streaming execution.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sink kind a task can write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Durable, engine-managed named table.
    Table,
    /// Durable, path-addressed file target.
    File,
    /// Ephemeral registration in the view registry.
    View,
}

impl OutputKind {
    /// All output kinds in write order.
    pub const ALL: [Self; 3] = [Self::Table, Self::File, Self::View];

    /// Parses an output token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "table" => Some(Self::Table),
            "file" => Some(Self::File),
            "view" => Some(Self::View),
            _ => None,
        }
    }

    /// Returns the configuration token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::File => "file",
            Self::View => "view",
        }
    }

    /// Whether writes to this kind persist across runs.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        !matches!(self, Self::View)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of output kinds declared by a task.
///
/// Iteration always yields kinds in write order (table, file, view),
/// regardless of declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutputSet {
    table: bool,
    file: bool,
    view: bool,
}

impl OutputSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: false,
            file: false,
            view: false,
        }
    }

    /// Builds a set from configuration tokens.
    ///
    /// Returns the set and the tokens that were not recognized.
    #[must_use]
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> (Self, Vec<String>) {
        let mut set = Self::new();
        let mut ignored = Vec::new();
        for token in tokens {
            match OutputKind::parse(token.as_ref()) {
                Some(kind) => set.insert(kind),
                None => ignored.push(token.as_ref().to_string()),
            }
        }
        (set, ignored)
    }

    /// Adds a kind to the set.
    pub fn insert(&mut self, kind: OutputKind) {
        match kind {
            OutputKind::Table => self.table = true,
            OutputKind::File => self.file = true,
            OutputKind::View => self.view = true,
        }
    }

    /// Adds a kind, builder style.
    #[must_use]
    pub fn with(mut self, kind: OutputKind) -> Self {
        self.insert(kind);
        self
    }

    /// Returns true if the set contains the kind.
    #[must_use]
    pub const fn contains(&self, kind: OutputKind) -> bool {
        match kind {
            OutputKind::Table => self.table,
            OutputKind::File => self.file,
            OutputKind::View => self.view,
        }
    }

    /// Returns true if no kind is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.table || self.file || self.view)
    }

    /// Returns true if any durable kind is present.
    #[must_use]
    pub const fn has_durable(&self) -> bool {
        self.table || self.file
    }

    /// Iterates the present kinds in write order.
    pub fn iter(&self) -> impl Iterator<Item = OutputKind> + '_ {
        OutputKind::ALL.into_iter().filter(|kind| self.contains(*kind))
    }
}

impl FromIterator<OutputKind> for OutputSet {
    fn from_iter<I: IntoIterator<Item = OutputKind>>(iter: I) -> Self {
        let mut set = Self::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl fmt::Display for OutputSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|kind| kind.as_str()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
