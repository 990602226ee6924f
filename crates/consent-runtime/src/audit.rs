//! Audit trail service.
//!
//! [`AuditService`] never decides anything. It emits one `tracing` event
//! per consent point so a chain can record what the policy saw.

use consent_hook::{
    ConsentOutcome, ConsentService, OperationContext, OperationFailure, OperationSummary,
};
use consent_types::ResourceNode;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Logs every consent point and answers `Proceed`.
///
/// Register it ahead of the deciding services (lower priority number) so
/// every resource is recorded before a decision stops the chain.
#[derive(Debug, Default)]
pub struct AuditService {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Operation counters kept by [`AuditService`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditCounters {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl AuditService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the operation counters.
    #[must_use]
    pub fn counters(&self) -> AuditCounters {
        AuditCounters {
            started: self.started.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl ConsentService for AuditService {
    fn start_operation(&self, ctx: &OperationContext) -> ConsentOutcome {
        self.started.fetch_add(1, Ordering::Relaxed);
        info!(
            target: "consent::audit",
            operation = %ctx.operation_id,
            kind = %ctx.kind,
            resource_type = ctx.resource_type.as_deref().unwrap_or("-"),
            principal = ctx.principal.as_deref().unwrap_or("-"),
            "start"
        );
        ConsentOutcome::Proceed
    }

    fn can_see_resource(&self, ctx: &OperationContext, resource: &ResourceNode) -> ConsentOutcome {
        debug!(
            target: "consent::audit",
            operation = %ctx.operation_id,
            resource = %resource.label(),
            "can_see"
        );
        ConsentOutcome::Proceed
    }

    fn will_see_resource(
        &self,
        ctx: &OperationContext,
        resource: &mut ResourceNode,
    ) -> ConsentOutcome {
        debug!(
            target: "consent::audit",
            operation = %ctx.operation_id,
            resource = %resource.label(),
            "will_see"
        );
        ConsentOutcome::Proceed
    }

    fn complete_operation_success(&self, ctx: &OperationContext, summary: &OperationSummary) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        info!(
            target: "consent::audit",
            operation = %ctx.operation_id,
            evaluated = summary.evaluated,
            rejected = summary.rejected,
            replaced = summary.replaced,
            "complete"
        );
    }

    fn complete_operation_failure(
        &self,
        ctx: &OperationContext,
        failure: &OperationFailure<'_>,
        summary: &OperationSummary,
    ) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        warn!(
            target: "consent::audit",
            operation = %ctx.operation_id,
            failure = %failure,
            evaluated = summary.evaluated,
            "failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_types::Resource;

    #[test]
    fn audit_always_proceeds() {
        let audit = AuditService::new();
        let ctx = OperationContext::search("Patient");
        let mut node: ResourceNode = Resource::new("Patient", "PTA").into();

        assert!(audit.start_operation(&ctx).is_proceed());
        assert!(audit.can_see_resource(&ctx, &node).is_proceed());
        assert!(audit.will_see_resource(&ctx, &mut node).is_proceed());
        assert_eq!(node.id(), Some("PTA"));
    }

    #[test]
    fn audit_counts_operations() {
        let audit = AuditService::new();
        let ctx = OperationContext::search("Patient");
        let summary = OperationSummary::default();

        audit.start_operation(&ctx);
        audit.complete_operation_success(&ctx, &summary);
        audit.start_operation(&ctx);
        audit.complete_operation_failure(&ctx, &OperationFailure::Cancelled, &summary);

        assert_eq!(
            audit.counters(),
            AuditCounters {
                started: 2,
                succeeded: 1,
                failed: 1,
            }
        );
    }
}
