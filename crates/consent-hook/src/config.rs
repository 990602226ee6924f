//! Rule configuration: declarative consent rules.
//!
//! These types are embedded in the runtime's `ConsentConfig` and
//! compiled into a [`RulePolicy`](crate::RulePolicy) at startup.
//!
//! # Example TOML
//!
//! ```toml
//! [[rules]]
//! id = "hide-inactive-b"
//! point = "will_see_resource"
//! pattern = "Patient/PTB"
//! action = "reject"
//! diagnostic = "record withheld by consent directive"
//! priority = 50
//!
//! [[rules]]
//! id = "trusted-observations"
//! point = "start_operation"
//! pattern = "Observation"
//! action = "authorized"
//! ```

use crate::{ConsentError, ConsentPoint, ResourcePattern, RuleAction};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Collection of declarative rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule definitions.
    pub rules: Vec<RuleDef>,
}

/// A single declarative rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleDef {
    /// Unique rule id. Anonymous rules cannot be overridden by later layers.
    pub id: Option<String>,

    /// Decision point (`start_operation`, `can_see_resource`, `will_see_resource`).
    pub point: String,

    /// Resource pattern (e.g. `"Patient/*"`).
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// `proceed`, `authorized` or `reject`.
    pub action: String,

    /// Diagnostic text attached to a rejection.
    pub diagnostic: Option<String>,

    /// Priority (lower = earlier). Default: 100.
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Whether the rule is active. Default: true.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_pattern() -> String {
    "*".into()
}

fn default_priority() -> i32 {
    100
}

fn default_enabled() -> bool {
    true
}

/// Errors from validating a [`RuleDef`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleDefValidationError {
    /// Invalid resource pattern.
    #[error("rule '{label}': {source}")]
    InvalidPattern { label: String, source: ConsentError },

    /// Unknown decision point.
    #[error("rule '{label}': {source}")]
    InvalidPoint { label: String, source: ConsentError },

    /// Rules only attach to decision points, not completions.
    #[error("rule '{label}': '{point}' is not a decision point")]
    NotDecisionPoint { label: String, point: String },

    /// Unknown action.
    #[error("rule '{label}': {source}")]
    InvalidAction { label: String, source: ConsentError },

    /// A diagnostic was given for a non-reject action.
    #[error("rule '{label}': 'diagnostic' is only valid with action 'reject'")]
    DiagnosticWithoutReject { label: String },
}

impl RuleDef {
    /// Creates an enabled rule with default priority.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        point: ConsentPoint,
        pattern: impl Into<String>,
        action: RuleAction,
    ) -> Self {
        Self {
            id: Some(id.into()),
            point: point.as_str().to_string(),
            pattern: pattern.into(),
            action: action.as_str().to_string(),
            diagnostic: None,
            priority: default_priority(),
            enabled: default_enabled(),
        }
    }

    /// Sets the rejection diagnostic.
    #[must_use]
    pub fn with_diagnostic(mut self, text: impl Into<String>) -> Self {
        self.diagnostic = Some(text.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Label used in error messages.
    #[must_use]
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or("<anonymous>")
    }

    /// Validates this rule.
    ///
    /// Checks:
    /// - `point` is a known decision point
    /// - `pattern` parses
    /// - `action` is known
    /// - `diagnostic` only accompanies `reject`
    pub fn validate(&self) -> Result<(), RuleDefValidationError> {
        let label = self.label().to_string();

        let point = ConsentPoint::from_str(&self.point).map_err(|e| {
            RuleDefValidationError::InvalidPoint {
                label: label.clone(),
                source: e,
            }
        })?;
        if !point.is_decision() {
            return Err(RuleDefValidationError::NotDecisionPoint {
                label,
                point: self.point.clone(),
            });
        }

        ResourcePattern::parse(&self.pattern).map_err(|e| {
            RuleDefValidationError::InvalidPattern {
                label: label.clone(),
                source: e,
            }
        })?;

        let action = RuleAction::from_str(&self.action).map_err(|e| {
            RuleDefValidationError::InvalidAction {
                label: label.clone(),
                source: e,
            }
        })?;

        if self.diagnostic.is_some() && action != RuleAction::Reject {
            return Err(RuleDefValidationError::DiagnosticWithoutReject { label });
        }

        Ok(())
    }
}

impl RulesConfig {
    /// Merges another config into this one.
    ///
    /// A rule in `other` whose `id` matches an existing rule replaces it;
    /// other rules are appended.
    pub fn merge(&mut self, other: &Self) {
        for rule in &other.rules {
            if let Some(id) = &rule.id {
                self.rules.retain(|r| r.id.as_deref() != Some(id));
            }
            self.rules.push(rule.clone());
        }
    }

    /// Validates every rule, returning all errors.
    pub fn validate_all(&self) -> Vec<RuleDefValidationError> {
        self.rules
            .iter()
            .filter_map(|r| r.validate().err())
            .collect()
    }
}
