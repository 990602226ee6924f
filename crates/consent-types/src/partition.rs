//! Request partition scope.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Partition scope of a lookup.
///
/// `Default` is a sentinel that must be normalised to the configured
/// concrete partition before it reaches storage; `All` passes through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPartition {
    /// Every partition.
    All,
    /// The default partition sentinel.
    Default,
    /// Explicit partition ids.
    Ids(Vec<i32>),
}

impl RequestPartition {
    /// Scope over a single partition.
    #[must_use]
    pub fn single(id: i32) -> Self {
        Self::Ids(vec![id])
    }

    /// Returns `true` for the all-partitions sentinel.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Returns `true` for the default-partition sentinel.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Returns the explicit partition ids (empty for sentinels).
    #[must_use]
    pub fn partition_ids(&self) -> &[i32] {
        match self {
            Self::Ids(ids) => ids,
            Self::All | Self::Default => &[],
        }
    }
}

impl fmt::Display for RequestPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Default => f.write_str("default"),
            Self::Ids(ids) => {
                let ids: Vec<String> = ids.iter().map(i32::to_string).collect();
                write!(f, "[{}]", ids.join(","))
            }
        }
    }
}
