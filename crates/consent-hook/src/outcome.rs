//! Consent outcome: return type of the decision points.
//!
//! `Default` is intentionally NOT implemented: a policy must state its
//! decision explicitly.

use consent_types::{Resource, ResourceNode};

/// Decision status without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsentStatus {
    /// No opinion, keep checking.
    Proceed,
    /// Explicitly approved; remaining checks are skipped.
    Authorized,
    /// Denied.
    Reject,
}

impl std::fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Proceed => "proceed",
            Self::Authorized => "authorized",
            Self::Reject => "reject",
        };
        f.write_str(s)
    }
}

/// What a policy decided for an operation or a resource.
///
/// At most one payload is carried, and the variant decides which kind:
///
/// | Variant | Status | Payload |
/// |---------|--------|---------|
/// | `Proceed` | proceed | none |
/// | `Authorized` | authorized | none |
/// | `Replace(node)` | proceed | substitute content |
/// | `Reject(Some(diag))` | reject | diagnostic explanation |
/// | `Reject(None)` | reject | none (entry is removed) |
#[derive(Debug, Clone, PartialEq)]
pub enum ConsentOutcome {
    /// Continue, no opinion.
    Proceed,

    /// Explicitly approved. Skips every remaining check of the operation.
    Authorized,

    /// Continue, but swap the resource for the given one.
    /// The replacement keeps the original's position.
    Replace(Box<ResourceNode>),

    /// Deny. The diagnostic, when given, takes the resource's position.
    Reject(Option<Resource>),
}

impl ConsentOutcome {
    /// Rejection without explanation.
    #[must_use]
    pub fn reject() -> Self {
        Self::Reject(None)
    }

    /// Rejection explained by a diagnostic payload.
    #[must_use]
    pub fn reject_with(diagnostic: Resource) -> Self {
        Self::Reject(Some(diagnostic))
    }

    /// Proceed with a substitute resource.
    #[must_use]
    pub fn replace(replacement: impl Into<ResourceNode>) -> Self {
        Self::Replace(Box::new(replacement.into()))
    }

    /// Returns the payload-free status.
    #[must_use]
    pub fn status(&self) -> ConsentStatus {
        match self {
            Self::Proceed | Self::Replace(_) => ConsentStatus::Proceed,
            Self::Authorized => ConsentStatus::Authorized,
            Self::Reject(_) => ConsentStatus::Reject,
        }
    }

    /// Returns `true` for `Proceed` (without replacement).
    #[must_use]
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    /// Returns `true` for `Authorized`.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }

    /// Returns `true` for `Replace`.
    #[must_use]
    pub fn is_replace(&self) -> bool {
        matches!(self, Self::Replace(_))
    }

    /// Returns `true` for `Reject`, with or without diagnostic.
    #[must_use]
    pub fn is_reject(&self) -> bool {
        matches!(self, Self::Reject(_))
    }
}
