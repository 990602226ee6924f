//! Declarative rule policy.
//!
//! A [`RulePolicy`] is compiled from [`RulesConfig`] and answers the
//! decision points with the first matching rule, in priority order.

use crate::{
    ConsentError, ConsentOutcome, ConsentPoint, ConsentService, OperationContext, PatternSegment,
    ResourcePattern, RuleDefValidationError, RulesConfig,
};
use consent_types::{Resource, ResourceNode};
use std::fmt;
use std::str::FromStr;

/// What a matching rule answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleAction {
    /// Explicit pass; stops lower-priority rules from matching.
    Proceed,
    /// Approve and skip remaining checks.
    Authorized,
    /// Deny.
    Reject,
}

impl RuleAction {
    /// Returns the config string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::Authorized => "authorized",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = ConsentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proceed" => Ok(Self::Proceed),
            "authorized" => Ok(Self::Authorized),
            "reject" => Ok(Self::Reject),
            other => Err(ConsentError::UnknownAction(other.to_string())),
        }
    }
}

struct CompiledRule {
    id: String,
    point: ConsentPoint,
    pattern: ResourcePattern,
    action: RuleAction,
    diagnostic: Option<String>,
}

impl CompiledRule {
    fn outcome(&self) -> ConsentOutcome {
        match self.action {
            RuleAction::Proceed => ConsentOutcome::Proceed,
            RuleAction::Authorized => ConsentOutcome::Authorized,
            RuleAction::Reject => {
                ConsentOutcome::Reject(self.diagnostic.as_deref().map(Resource::diagnostic))
            }
        }
    }
}

/// A consent service driven by declarative rules.
///
/// Disabled rules are dropped at compile time. Rules keep their config
/// order within the same priority.
pub struct RulePolicy {
    rules: Vec<CompiledRule>,
}

impl RulePolicy {
    /// Compiles a policy from configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error.
    pub fn from_config(config: &RulesConfig) -> Result<Self, RuleDefValidationError> {
        let mut indexed = Vec::new();
        for (index, def) in config.rules.iter().enumerate() {
            def.validate()?;
            if !def.enabled {
                continue;
            }
            let label = def.label().to_string();
            // validate() has already accepted these strings.
            let point = ConsentPoint::from_str(&def.point).map_err(|source| {
                RuleDefValidationError::InvalidPoint {
                    label: label.clone(),
                    source,
                }
            })?;
            let pattern = ResourcePattern::parse(&def.pattern).map_err(|source| {
                RuleDefValidationError::InvalidPattern {
                    label: label.clone(),
                    source,
                }
            })?;
            let action = RuleAction::from_str(&def.action).map_err(|source| {
                RuleDefValidationError::InvalidAction {
                    label: label.clone(),
                    source,
                }
            })?;

            indexed.push((
                def.priority,
                index,
                CompiledRule {
                    id: label,
                    point,
                    pattern,
                    action,
                    diagnostic: def.diagnostic.clone(),
                },
            ));
        }

        indexed.sort_by_key(|(priority, index, _)| (*priority, *index));
        Ok(Self {
            rules: indexed.into_iter().map(|(_, _, rule)| rule).collect(),
        })
    }

    /// Number of active rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rule is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn first_match(
        &self,
        point: ConsentPoint,
        matches: impl Fn(&ResourcePattern) -> bool,
    ) -> ConsentOutcome {
        let Some(rule) = self
            .rules
            .iter()
            .find(|r| r.point == point && matches(&r.pattern))
        else {
            return ConsentOutcome::Proceed;
        };

        tracing::debug!(rule_id = %rule.id, point = %point, action = %rule.action, "rule matched");
        rule.outcome()
    }
}

impl ConsentService for RulePolicy {
    fn start_operation(&self, ctx: &OperationContext) -> ConsentOutcome {
        self.first_match(ConsentPoint::StartOperation, |pattern| {
            match ctx.resource_type.as_deref() {
                Some(ty) => pattern.matches_type(ty),
                None => pattern.resource_type == PatternSegment::Wildcard,
            }
        })
    }

    fn can_see_resource(&self, _ctx: &OperationContext, resource: &ResourceNode) -> ConsentOutcome {
        self.first_match(ConsentPoint::CanSeeResource, |pattern| {
            pattern.matches(resource)
        })
    }

    fn will_see_resource(
        &self,
        _ctx: &OperationContext,
        resource: &mut ResourceNode,
    ) -> ConsentOutcome {
        let node: &ResourceNode = resource;
        self.first_match(ConsentPoint::WillSeeResource, |pattern| pattern.matches(node))
    }
}

impl fmt::Debug for RulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulePolicy")
            .field(
                "rules",
                &self.rules.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
