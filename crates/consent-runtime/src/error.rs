//! Pipeline error types.

use consent_types::{ErrorCode, SearchId};
use thiserror::Error;

/// A query modifier that cannot be honoured while consent filtering is
/// active.
///
/// Raised before the operation lifecycle starts. Maps to a 400 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnsupportedModifier {
    /// `_total=accurate`: a filtered count cannot be computed up front.
    #[error("_total=accurate is not permitted on this server")]
    AccurateTotal,

    /// `_summary=count`: a count-only response would leak filtered entries.
    #[error("_summary=count is not permitted on this server")]
    SummaryCount,
}

impl UnsupportedModifier {
    /// The offending query modifier, as written in the request.
    #[must_use]
    pub fn modifier(&self) -> &'static str {
        match self {
            Self::AccurateTotal => "_total=accurate",
            Self::SummaryCount => "_summary=count",
        }
    }

    /// HTTP status the transport should answer with.
    #[must_use]
    pub fn status(&self) -> u16 {
        400
    }
}

impl ErrorCode for UnsupportedModifier {
    fn code(&self) -> &'static str {
        match self {
            Self::AccurateTotal => "CONSENT_TOTAL_ACCURATE",
            Self::SummaryCount => "CONSENT_SUMMARY_COUNT",
        }
    }

    fn is_recoverable(&self) -> bool {
        // The client can retry without the modifier.
        true
    }
}

/// Failures serving a page of a stored search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PagingError {
    /// No stored search under this id (never stored, or evicted).
    #[error("search {0} is unknown or has expired")]
    UnknownSearch(SearchId),

    /// The requested offset lies past the end of the result set.
    #[error("page offset {offset} is beyond the {total} stored results")]
    OffsetOutOfRange { offset: usize, total: usize },
}

impl ErrorCode for PagingError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownSearch(_) => "PAGING_UNKNOWN_SEARCH",
            Self::OffsetOutOfRange { .. } => "PAGING_OFFSET_OUT_OF_RANGE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Error returned by [`ConsentPipeline::execute`](crate::ConsentPipeline::execute).
///
/// Downstream errors are surfaced unchanged: `Display` and `source()`
/// are those of the original error.
#[derive(Debug, Error)]
pub enum PipelineError<E> {
    /// Rejected before the lifecycle started.
    #[error(transparent)]
    Modifier(#[from] UnsupportedModifier),

    /// Producing the response failed. The policy has been notified.
    #[error(transparent)]
    Downstream(E),
}

impl<E> PipelineError<E> {
    /// Returns the downstream error, if this is one.
    pub fn downstream(&self) -> Option<&E> {
        match self {
            Self::Downstream(e) => Some(e),
            Self::Modifier(_) => None,
        }
    }

    /// Unwraps the downstream error, if this is one.
    pub fn into_downstream(self) -> Option<E> {
        match self {
            Self::Downstream(e) => Some(e),
            Self::Modifier(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_types::{assert_error_code, assert_error_codes};
    use std::error::Error as _;

    #[derive(Debug, Error)]
    #[error("A MESSAGE")]
    struct Boom(#[source] std::io::Error);

    // ── UnsupportedModifier ─────────────────────────────────

    #[test]
    fn modifier_messages_name_the_modifier() {
        for m in [UnsupportedModifier::AccurateTotal, UnsupportedModifier::SummaryCount] {
            assert!(m.to_string().contains(m.modifier()));
            assert_eq!(m.status(), 400);
        }
    }

    #[test]
    fn modifier_codes() {
        assert_error_codes(
            &[UnsupportedModifier::AccurateTotal, UnsupportedModifier::SummaryCount],
            "CONSENT_",
        );
        assert!(UnsupportedModifier::AccurateTotal.is_recoverable());
    }

    // ── PagingError ─────────────────────────────────────────

    #[test]
    fn paging_codes() {
        assert_error_code(&PagingError::UnknownSearch(SearchId::new()), "PAGING_");
        assert_error_code(
            &PagingError::OffsetOutOfRange {
                offset: 5,
                total: 2,
            },
            "PAGING_",
        );
    }

    // ── PipelineError ───────────────────────────────────────

    #[test]
    fn downstream_is_transparent() {
        let err: PipelineError<Boom> =
            PipelineError::Downstream(Boom(std::io::Error::other("disk")));
        assert_eq!(err.to_string(), "A MESSAGE");
        assert!(err.source().is_some());
        assert!(err.downstream().is_some());
        assert_eq!(
            err.into_downstream().map(|b| b.to_string()),
            Some("A MESSAGE".to_string())
        );
    }

    #[test]
    fn modifier_converts() {
        let err: PipelineError<Boom> = UnsupportedModifier::SummaryCount.into();
        assert_eq!(err.to_string(), "_summary=count is not permitted on this server");
        assert!(err.downstream().is_none());
    }
}
