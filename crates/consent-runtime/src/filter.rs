//! Resource stream filter.
//!
//! Walks a response tree depth-first, post-order, applying the policy's
//! per-resource decisions:
//!
//! ```text
//! for each entry, in document order:
//!     can_see_resource(entry)          reject → drop or diagnostic
//!     recurse into entry's children    (containers only)
//!     will_see_resource(entry)         reject → drop or diagnostic
//!                                      replace → swap, keep position
//!                                      authorized → stop checking
//! will_see_resource(root container)
//! ```
//!
//! The root container is not offered to `can_see_resource`; a root that
//! is a single resource goes through both points.

use crate::lifecycle::{LifecycleRecord, OperationScope, StartDecision};
use crate::ConsentResponse;
use consent_hook::{ConsentOutcome, ConsentService, OperationContext};
use consent_types::ResourceNode;
use tracing::{debug, warn};

/// Filters `root` through the policy attached to `scope`.
///
/// Starts the operation if needed. Does not complete it.
pub fn filter_response(scope: &mut OperationScope, root: ResourceNode) -> ConsentResponse {
    let keep_total = match scope.ensure_started() {
        StartDecision::Exempt => return ConsentResponse::Content(root),
        StartDecision::Authorized => true,
        StartDecision::Reject(diagnostic) => {
            return match diagnostic {
                Some(diag) => ConsentResponse::Content(diag.clone().into()),
                None => ConsentResponse::NoContent,
            };
        }
        StartDecision::Proceed => false,
    };

    let (service, ctx, record) = scope.parts();
    let filtered = match service {
        Some(service) if !keep_total => {
            let offer_can_see = !root.is_container();
            let mut walk = Walk {
                service,
                ctx,
                record,
            };
            walk.visit(root, offer_can_see)
        }
        _ => Some(root),
    };

    match filtered {
        Some(ResourceNode::Container(mut container)) => {
            if !keep_total {
                container.total = None;
            }
            ConsentResponse::Content(ResourceNode::Container(container))
        }
        Some(node) => ConsentResponse::Content(node),
        None => ConsentResponse::NoContent,
    }
}

struct Walk<'a> {
    service: &'a dyn ConsentService,
    ctx: &'a OperationContext,
    record: &'a mut LifecycleRecord,
}

impl Walk<'_> {
    /// Returns what takes `node`'s position: the node (possibly modified
    /// or replaced), a diagnostic, or nothing.
    fn visit(&mut self, node: ResourceNode, offer_can_see: bool) -> Option<ResourceNode> {
        if self.record.is_authorized() {
            return Some(node);
        }

        self.record.note_evaluated();

        if offer_can_see {
            match self.service.can_see_resource(self.ctx, &node) {
                ConsentOutcome::Proceed => {}
                ConsentOutcome::Authorized => {
                    debug!(resource = %node.label(), "can_see authorized, skipping subtree");
                    return Some(node);
                }
                ConsentOutcome::Reject(diagnostic) => {
                    debug!(resource = %node.label(), "can_see rejected");
                    self.record.note_rejected();
                    return diagnostic.map(ResourceNode::from);
                }
                ConsentOutcome::Replace(_) => {
                    warn!(
                        resource = %node.label(),
                        "Replace returned from can_see_resource, treating as proceed"
                    );
                }
            }
        }

        let mut node = node;
        if let ResourceNode::Container(container) = &mut node {
            let entries = std::mem::take(&mut container.entries);
            container.entries = entries
                .into_iter()
                .filter_map(|entry| self.visit(entry, true))
                .collect();
        }

        // A child may have authorized the rest of the operation.
        if self.record.is_authorized() {
            return Some(node);
        }

        match self.service.will_see_resource(self.ctx, &mut node) {
            ConsentOutcome::Proceed => Some(node),
            ConsentOutcome::Authorized => {
                debug!(resource = %node.label(), "will_see authorized the rest of the operation");
                self.record.authorize_rest();
                Some(node)
            }
            ConsentOutcome::Replace(replacement) => {
                debug!(
                    resource = %node.label(),
                    replacement = %replacement.label(),
                    "will_see replaced"
                );
                self.record.note_replaced();
                Some(*replacement)
            }
            ConsentOutcome::Reject(diagnostic) => {
                debug!(resource = %node.label(), "will_see rejected");
                self.record.note_rejected();
                diagnostic.map(ResourceNode::from)
            }
        }
    }
}
