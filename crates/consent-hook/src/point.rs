//! Consent decision points.
//!
//! Every point where the pipeline calls into a [`ConsentService`](crate::ConsentService).
//! The first three are decisions; the last two are lifecycle notifications.

use crate::ConsentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// All points at which a consent service is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsentPoint {
    /// Once per operation (once per page), before any resource is evaluated.
    StartOperation,
    /// Once per candidate resource, before it is fetched/rendered.
    CanSeeResource,
    /// Once per resource and per container, before it enters the response.
    WillSeeResource,
    /// Operation finished normally.
    CompleteSuccess,
    /// Operation failed or was cancelled.
    CompleteFailure,
}

impl ConsentPoint {
    /// All points in lifecycle order.
    pub const ALL: [ConsentPoint; 5] = [
        Self::StartOperation,
        Self::CanSeeResource,
        Self::WillSeeResource,
        Self::CompleteSuccess,
        Self::CompleteFailure,
    ];

    /// Returns `true` for points that return a [`ConsentOutcome`](crate::ConsentOutcome).
    #[must_use]
    pub fn is_decision(&self) -> bool {
        matches!(
            self,
            Self::StartOperation | Self::CanSeeResource | Self::WillSeeResource
        )
    }

    /// Returns `true` for the completion notifications.
    #[must_use]
    pub fn is_completion(&self) -> bool {
        matches!(self, Self::CompleteSuccess | Self::CompleteFailure)
    }

    /// Returns `true` for the per-resource decision points.
    #[must_use]
    pub fn is_per_resource(&self) -> bool {
        matches!(self, Self::CanSeeResource | Self::WillSeeResource)
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartOperation => "start_operation",
            Self::CanSeeResource => "can_see_resource",
            Self::WillSeeResource => "will_see_resource",
            Self::CompleteSuccess => "complete_success",
            Self::CompleteFailure => "complete_failure",
        }
    }
}

impl fmt::Display for ConsentPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentPoint {
    type Err = ConsentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ConsentError::UnknownPoint(s.to_string()))
    }
}
