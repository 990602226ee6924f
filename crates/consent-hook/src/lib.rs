//! Consent decision layer.
//!
//! This crate defines the port between the request pipeline and the
//! pluggable consent policy.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  consent-types   : ResourceNode, Container, ids, ErrorCode  │
//! └─────────────────────────────────────────────────────────────┘
//!           ↕
//! ┌─────────────────────────────────────────────────────────────┐
//! │  consent-hook    : ConsentService, Outcome, Chain, Rules    │ ◄── HERE
//! └─────────────────────────────────────────────────────────────┘
//!           ↕
//! ┌─────────────────────────────────────────────────────────────┐
//! │  consent-runtime : Pipeline, lifecycle, filter, paging      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Consent Points
//!
//! [`ConsentPoint`] names the five interception points: three decision
//! points (`start_operation`, `can_see_resource`, `will_see_resource`)
//! and two completion points (`complete_success`, `complete_failure`).
//!
//! ## Outcomes
//!
//! [`ConsentOutcome`] is what a decision point answers:
//!
//! - `Proceed`: no opinion
//! - `Authorized`: approve, skip remaining checks
//! - `Replace(node)`: substitute the resource
//! - `Reject(diag)`: deny, optionally explained
//!
//! ## Services
//!
//! [`ConsentService`] is the policy trait. [`ConsentChain`] composes
//! several services; [`RulePolicy`] answers from declarative
//! [`RulesConfig`] rules.
//!
//! # Example
//!
//! ```
//! use consent_hook::{
//!     ConsentChain, ConsentPoint, ConsentService, OperationContext, RuleAction, RuleDef,
//!     RulePolicy, RulesConfig,
//! };
//! use consent_types::{Resource, ResourceNode};
//! use std::sync::Arc;
//!
//! let rules = RulesConfig {
//!     rules: vec![RuleDef::new(
//!         "hide-b",
//!         ConsentPoint::WillSeeResource,
//!         "Patient/PTB",
//!         RuleAction::Reject,
//!     )],
//! };
//! let policy = RulePolicy::from_config(&rules).expect("valid rules");
//!
//! let mut chain = ConsentChain::new();
//! chain.register("rules", 100, Arc::new(policy));
//!
//! let ctx = OperationContext::search("Patient");
//! let mut b: ResourceNode = Resource::new("Patient", "PTB").into();
//! assert!(chain.will_see_resource(&ctx, &mut b).is_reject());
//! ```

mod chain;
mod completion;
mod config;
mod context;
mod error;
mod outcome;
mod pattern;
mod point;
mod rule;
mod service;

pub use chain::ConsentChain;
pub use completion::{OperationFailure, OperationSummary};
pub use config::{RuleDef, RuleDefValidationError, RulesConfig};
pub use context::{OperationContext, OperationKind, PageInfo};
pub use error::ConsentError;
pub use outcome::{ConsentOutcome, ConsentStatus};
pub use pattern::{PatternSegment, ResourcePattern};
pub use point::ConsentPoint;
pub use rule::{RuleAction, RulePolicy};
pub use service::ConsentService;

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    pub use crate::service::testing::MockConsentService;
}
