//! Consent chain: composes several services into one.
//!
//! The pipeline talks to a single [`ConsentService`]. Deployments that
//! need more than one policy register them on a [`ConsentChain`], which
//! is itself a service.
//!
//! Build the chain with `&mut self` methods, then share it behind an
//! `Arc`. Runtime toggling needs an outer lock.

use crate::{
    ConsentOutcome, ConsentPoint, ConsentService, OperationContext, OperationFailure,
    OperationSummary,
};
use consent_types::ResourceNode;
use std::sync::Arc;

struct RegisteredService {
    id: String,
    priority: i32,
    enabled: bool,
    service: Arc<dyn ConsentService>,
}

/// An ordered set of consent services.
///
/// Services run in priority order (ascending, FIFO for ties).
///
/// Chain semantics for the decision points:
///
/// - `Reject` or `Authorized` → stop immediately, return it
/// - `Replace` in `will_see_resource` → substitute, continue the chain;
///   the chain then answers `Replace` with the final resource
/// - `Replace` anywhere else → ignored with a warning
///
/// Completion callbacks reach every enabled service.
pub struct ConsentChain {
    services: Vec<RegisteredService>,
}

impl ConsentChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
        }
    }

    /// Registers a service. Returns its id.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        priority: i32,
        service: Arc<dyn ConsentService>,
    ) -> String {
        let id = id.into();
        let pos = self
            .services
            .iter()
            .position(|s| s.priority > priority)
            .unwrap_or(self.services.len());
        self.services.insert(
            pos,
            RegisteredService {
                id: id.clone(),
                priority,
                enabled: true,
                service,
            },
        );
        id
    }

    /// Unregisters a service by id. Returns `true` if found and removed.
    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.services.len();
        self.services.retain(|s| s.id != id);
        self.services.len() < before
    }

    /// Enables or disables a service by id.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) {
        if let Some(s) = self.services.iter_mut().find(|s| s.id == id) {
            s.enabled = enabled;
        }
    }

    /// Ids in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.id.as_str()).collect()
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    fn active(&self) -> impl Iterator<Item = &RegisteredService> {
        self.services.iter().filter(|s| s.enabled)
    }

    fn decide(
        &self,
        point: ConsentPoint,
        mut call: impl FnMut(&dyn ConsentService) -> ConsentOutcome,
    ) -> ConsentOutcome {
        for rs in self.active() {
            match call(rs.service.as_ref()) {
                ConsentOutcome::Proceed => {}
                ConsentOutcome::Replace(_) => {
                    tracing::warn!(
                        service_id = %rs.id,
                        point = %point,
                        "Replace returned outside will_see_resource, ignoring"
                    );
                }
                decisive @ (ConsentOutcome::Authorized | ConsentOutcome::Reject(_)) => {
                    tracing::debug!(service_id = %rs.id, point = %point, "chain stopped");
                    return decisive;
                }
            }
        }
        ConsentOutcome::Proceed
    }
}

impl Default for ConsentChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsentService for ConsentChain {
    fn start_operation(&self, ctx: &OperationContext) -> ConsentOutcome {
        self.decide(ConsentPoint::StartOperation, |s| s.start_operation(ctx))
    }

    fn can_see_resource(&self, ctx: &OperationContext, resource: &ResourceNode) -> ConsentOutcome {
        self.decide(ConsentPoint::CanSeeResource, |s| {
            s.can_see_resource(ctx, resource)
        })
    }

    fn will_see_resource(
        &self,
        ctx: &OperationContext,
        resource: &mut ResourceNode,
    ) -> ConsentOutcome {
        let mut replaced = false;
        for rs in self.active() {
            match rs.service.will_see_resource(ctx, resource) {
                ConsentOutcome::Proceed => {}
                ConsentOutcome::Replace(replacement) => {
                    *resource = *replacement;
                    replaced = true;
                }
                decisive @ (ConsentOutcome::Authorized | ConsentOutcome::Reject(_)) => {
                    tracing::debug!(
                        service_id = %rs.id,
                        point = %ConsentPoint::WillSeeResource,
                        "chain stopped"
                    );
                    return decisive;
                }
            }
        }

        if replaced {
            ConsentOutcome::replace(resource.clone())
        } else {
            ConsentOutcome::Proceed
        }
    }

    fn complete_operation_success(&self, ctx: &OperationContext, summary: &OperationSummary) {
        for rs in self.active() {
            rs.service.complete_operation_success(ctx, summary);
        }
    }

    fn complete_operation_failure(
        &self,
        ctx: &OperationContext,
        failure: &OperationFailure<'_>,
        summary: &OperationSummary,
    ) {
        for rs in self.active() {
            rs.service.complete_operation_failure(ctx, failure, summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::MockConsentService;
    use consent_types::Resource;

    fn patient(id: &str) -> ResourceNode {
        Resource::new("Patient", id).into()
    }

    fn ctx() -> OperationContext {
        OperationContext::search("Patient")
    }

    // ── Registration ────────────────────────────────────────

    #[test]
    fn priority_order_fifo_for_ties() {
        let mut chain = ConsentChain::new();
        chain.register("b", 100, Arc::new(MockConsentService::proceeding()));
        chain.register("a", 10, Arc::new(MockConsentService::proceeding()));
        chain.register("c", 100, Arc::new(MockConsentService::proceeding()));
        assert_eq!(chain.ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn unregister() {
        let mut chain = ConsentChain::new();
        chain.register("a", 100, Arc::new(MockConsentService::proceeding()));
        assert!(chain.unregister("a"));
        assert!(!chain.unregister("a"));
        assert!(chain.is_empty());
    }

    #[test]
    fn disabled_service_skipped() {
        let rejecting = Arc::new(MockConsentService::proceeding().on_start(|_| ConsentOutcome::reject()));
        let mut chain = ConsentChain::new();
        chain.register("r", 100, rejecting.clone());
        chain.set_enabled("r", false);

        assert!(chain.start_operation(&ctx()).is_proceed());
        assert_eq!(rejecting.count(ConsentPoint::StartOperation), 0);
    }

    // ── Decision semantics ──────────────────────────────────

    #[test]
    fn reject_stops_chain() {
        let first = Arc::new(MockConsentService::proceeding().on_can_see(|_, _| ConsentOutcome::reject()));
        let second = Arc::new(MockConsentService::proceeding());
        let mut chain = ConsentChain::new();
        chain.register("first", 1, first.clone());
        chain.register("second", 2, second.clone());

        assert!(chain.can_see_resource(&ctx(), &patient("PTA")).is_reject());
        assert_eq!(first.count(ConsentPoint::CanSeeResource), 1);
        assert_eq!(second.count(ConsentPoint::CanSeeResource), 0);
    }

    #[test]
    fn authorized_stops_chain() {
        let second = Arc::new(MockConsentService::proceeding());
        let mut chain = ConsentChain::new();
        chain.register(
            "first",
            1,
            Arc::new(MockConsentService::proceeding().on_start(|_| ConsentOutcome::Authorized)),
        );
        chain.register("second", 2, second.clone());

        assert!(chain.start_operation(&ctx()).is_authorized());
        assert_eq!(second.count(ConsentPoint::StartOperation), 0);
    }

    #[test]
    fn replace_substitutes_and_continues() {
        let second = Arc::new(MockConsentService::proceeding());
        let mut chain = ConsentChain::new();
        chain.register(
            "swap",
            1,
            Arc::new(
                MockConsentService::proceeding()
                    .on_will_see(|_, _| ConsentOutcome::replace(Resource::new("Patient", "PTC"))),
            ),
        );
        chain.register("second", 2, second.clone());

        let mut node = patient("PTA");
        match chain.will_see_resource(&ctx(), &mut node) {
            ConsentOutcome::Replace(final_node) => assert_eq!(final_node.id(), Some("PTC")),
            other => panic!("expected Replace, got {other:?}"),
        }
        assert_eq!(second.labels(ConsentPoint::WillSeeResource), vec!["Patient/PTC"]);
    }

    #[test]
    fn replace_outside_will_see_ignored() {
        let mut chain = ConsentChain::new();
        chain.register(
            "swap",
            1,
            Arc::new(
                MockConsentService::proceeding()
                    .on_can_see(|_, _| ConsentOutcome::replace(Resource::new("Patient", "PTC"))),
            ),
        );
        assert!(chain.can_see_resource(&ctx(), &patient("PTA")).is_proceed());
    }

    #[test]
    fn empty_chain_proceeds() {
        let chain = ConsentChain::default();
        let mut node = patient("PTA");
        assert!(chain.start_operation(&ctx()).is_proceed());
        assert!(chain.will_see_resource(&ctx(), &mut node).is_proceed());
    }

    // ── Completion ──────────────────────────────────────────

    #[test]
    fn completion_reaches_every_service() {
        let a = Arc::new(MockConsentService::proceeding().on_start(|_| ConsentOutcome::reject()));
        let b = Arc::new(MockConsentService::proceeding());
        let mut chain = ConsentChain::new();
        chain.register("a", 1, a.clone());
        chain.register("b", 2, b.clone());

        chain.complete_operation_success(&ctx(), &OperationSummary::default());
        chain.complete_operation_failure(
            &ctx(),
            &OperationFailure::Cancelled,
            &OperationSummary::default(),
        );

        for svc in [&a, &b] {
            assert_eq!(svc.count(ConsentPoint::CompleteSuccess), 1);
            assert_eq!(svc.count(ConsentPoint::CompleteFailure), 1);
        }
    }
}
