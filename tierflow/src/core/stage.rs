//! The three medallion stages.

use crate::errors::NotFoundError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three ordered pipeline phases.
///
/// The derived ordering is the execution order: staging runs before standard,
/// which runs before serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Raw landing data, schema applied, accumulated append-only.
    Staging,
    /// Cleansed/joined data derived from staging, accumulated append-only.
    Standard,
    /// Query-ready snapshots recomputed on every write.
    Serving,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 3] = [Self::Staging, Self::Standard, Self::Serving];

    /// Returns the stage name as used in configuration and on disk.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Standard => "standard",
            Self::Serving => "serving",
        }
    }

    /// Looks up a stage by exact name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == name)
    }

    /// Stages whose views must be rebuilt before a transformation in this stage runs.
    #[must_use]
    pub const fn upstream(&self) -> &'static [Self] {
        match self {
            Self::Staging => &[],
            Self::Standard => &[Self::Staging],
            Self::Serving => &[Self::Staging, Self::Standard],
        }
    }

    /// Whether durable writes in this stage replace previous content.
    #[must_use]
    pub const fn is_snapshot(&self) -> bool {
        matches!(self, Self::Serving)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = NotFoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| NotFoundError::stage(s))
    }
}
