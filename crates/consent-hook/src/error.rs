//! Error types for the consent hook layer.

use consent_types::ErrorCode;
use thiserror::Error;

/// Errors from parsing consent configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsentError {
    /// Invalid resource pattern syntax.
    #[error("invalid resource pattern: {0}")]
    InvalidPattern(String),

    /// Unknown consent point string.
    #[error("unknown consent point: {0}")]
    UnknownPoint(String),

    /// Unknown rule action string.
    #[error("unknown rule action: {0}")]
    UnknownAction(String),
}

impl ErrorCode for ConsentError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidPattern(_) => "RULE_INVALID_PATTERN",
            Self::UnknownPoint(_) => "RULE_UNKNOWN_POINT",
            Self::UnknownAction(_) => "RULE_UNKNOWN_ACTION",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
