//! Data handed to the completion callbacks.

use crate::ConsentStatus;
use std::error::Error;
use std::fmt;

/// What happened during an operation, reported on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSummary {
    /// Whether `start_operation` was called.
    pub started: bool,
    /// Standing outcome when the operation ended.
    pub standing: ConsentStatus,
    /// Resources that went through at least one per-resource decision.
    pub evaluated: usize,
    /// Resources removed or swapped for a diagnostic.
    pub rejected: usize,
    /// Resources swapped for a replacement.
    pub replaced: usize,
}

impl OperationSummary {
    /// Summary of an operation that never evaluated anything.
    #[must_use]
    pub fn untouched() -> Self {
        Self {
            started: false,
            standing: ConsentStatus::Proceed,
            evaluated: 0,
            rejected: 0,
            replaced: 0,
        }
    }
}

impl Default for OperationSummary {
    fn default() -> Self {
        Self::untouched()
    }
}

/// Why an operation completed with failure.
#[derive(Debug, Clone, Copy)]
pub enum OperationFailure<'a> {
    /// An error escaped while producing or rendering resources.
    Error(&'a (dyn Error + Send + Sync + 'static)),
    /// The operation was abandoned before completing (client abort,
    /// dropped future, unwinding panic).
    Cancelled,
}

impl OperationFailure<'_> {
    /// Returns the underlying error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            Self::Error(err) => Some(*err),
            Self::Cancelled => None,
        }
    }

    /// Returns `true` for cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for OperationFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "{err}"),
            Self::Cancelled => f.write_str("operation cancelled before completion"),
        }
    }
}
