//! Consent service trait and testing utilities.

use crate::{ConsentOutcome, OperationContext, OperationFailure, OperationSummary};
use consent_types::ResourceNode;

/// The pluggable consent policy.
///
/// The pipeline guarantees, per operation:
///
/// - `start_operation` at most once, before any per-resource call
/// - `can_see_resource` before `will_see_resource` for the same resource
/// - children before their container (`will_see_resource` is post-order)
/// - exactly one of `complete_operation_success` /
///   `complete_operation_failure`, on every exit path
///
/// Every method has a pass-through default so a policy only implements
/// the points it cares about.
///
/// # Thread Safety
///
/// Services must be `Send + Sync`: the pipeline may call the same
/// service concurrently for different operations.
///
/// # Example
///
/// ```
/// use consent_hook::{ConsentOutcome, ConsentService, OperationContext};
/// use consent_types::{Resource, ResourceNode};
///
/// struct HideInactive;
///
/// impl ConsentService for HideInactive {
///     fn will_see_resource(
///         &self,
///         _ctx: &OperationContext,
///         resource: &mut ResourceNode,
///     ) -> ConsentOutcome {
///         let inactive = resource
///             .as_resource()
///             .and_then(|r| r.content.get("active"))
///             .and_then(|v| v.as_bool())
///             == Some(false);
///         if inactive {
///             ConsentOutcome::reject_with(Resource::diagnostic("inactive record"))
///         } else {
///             ConsentOutcome::Proceed
///         }
///     }
/// }
///
/// let policy = HideInactive;
/// let ctx = OperationContext::search("Patient");
/// let mut node: ResourceNode = Resource::new("Patient", "PTA").into();
/// assert!(policy.will_see_resource(&ctx, &mut node).is_proceed());
/// ```
pub trait ConsentService: Send + Sync {
    /// Called once per operation before any resource is evaluated.
    ///
    /// - `Authorized` skips every per-resource check of the operation
    /// - `Reject` short-circuits the operation before resources are fetched
    fn start_operation(&self, _ctx: &OperationContext) -> ConsentOutcome {
        ConsentOutcome::Proceed
    }

    /// Called once per candidate resource, before it is rendered.
    ///
    /// `Replace` is not meaningful here and is treated as `Proceed`.
    fn can_see_resource(&self, _ctx: &OperationContext, _resource: &ResourceNode) -> ConsentOutcome {
        ConsentOutcome::Proceed
    }

    /// Called once per resource, and once per container after its
    /// children, right before it enters the response.
    ///
    /// The resource may be modified in place.
    fn will_see_resource(
        &self,
        _ctx: &OperationContext,
        _resource: &mut ResourceNode,
    ) -> ConsentOutcome {
        ConsentOutcome::Proceed
    }

    /// Called once when the operation completes normally.
    fn complete_operation_success(&self, _ctx: &OperationContext, _summary: &OperationSummary) {}

    /// Called once when the operation fails or is cancelled.
    fn complete_operation_failure(
        &self,
        _ctx: &OperationContext,
        _failure: &OperationFailure<'_>,
        _summary: &OperationSummary,
    ) {
    }
}

/// Test utilities for consent services.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use crate::ConsentPoint;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    type StartFn = Box<dyn Fn(&OperationContext) -> ConsentOutcome + Send + Sync>;
    type CanSeeFn = Box<dyn Fn(&OperationContext, &ResourceNode) -> ConsentOutcome + Send + Sync>;
    type WillSeeFn =
        Box<dyn Fn(&OperationContext, &mut ResourceNode) -> ConsentOutcome + Send + Sync>;

    /// A recording consent service for tests.
    ///
    /// Every decision point defaults to `Proceed`; override individual
    /// points with the `on_*` builders. Every call is logged as
    /// `(point, label)` where the label is the resource label
    /// (`Patient/PTA`) or the operation kind for operation-level points.
    pub struct MockConsentService {
        start: StartFn,
        can_see: CanSeeFn,
        will_see: WillSeeFn,
        log: Mutex<Vec<(ConsentPoint, String)>>,
        failures: Mutex<Vec<String>>,
        summaries: Mutex<Vec<OperationSummary>>,
    }

    impl MockConsentService {
        /// Creates a mock that returns `Proceed` everywhere.
        #[must_use]
        pub fn proceeding() -> Self {
            Self {
                start: Box::new(|_| ConsentOutcome::Proceed),
                can_see: Box::new(|_, _| ConsentOutcome::Proceed),
                will_see: Box::new(|_, _| ConsentOutcome::Proceed),
                log: Mutex::new(Vec::new()),
                failures: Mutex::new(Vec::new()),
                summaries: Mutex::new(Vec::new()),
            }
        }

        /// Overrides `start_operation`.
        #[must_use]
        pub fn on_start(
            mut self,
            f: impl Fn(&OperationContext) -> ConsentOutcome + Send + Sync + 'static,
        ) -> Self {
            self.start = Box::new(f);
            self
        }

        /// Overrides `can_see_resource`.
        #[must_use]
        pub fn on_can_see(
            mut self,
            f: impl Fn(&OperationContext, &ResourceNode) -> ConsentOutcome + Send + Sync + 'static,
        ) -> Self {
            self.can_see = Box::new(f);
            self
        }

        /// Overrides `will_see_resource`.
        #[must_use]
        pub fn on_will_see(
            mut self,
            f: impl Fn(&OperationContext, &mut ResourceNode) -> ConsentOutcome
                + Send
                + Sync
                + 'static,
        ) -> Self {
            self.will_see = Box::new(f);
            self
        }

        /// Number of calls recorded for `point`.
        pub fn count(&self, point: ConsentPoint) -> usize {
            self.log.lock().iter().filter(|(p, _)| *p == point).count()
        }

        /// Call counts for every point.
        pub fn counts(&self) -> HashMap<ConsentPoint, usize> {
            let mut counts = HashMap::new();
            for (point, _) in self.log.lock().iter() {
                *counts.entry(*point).or_insert(0) += 1;
            }
            counts
        }

        /// Full call log in invocation order.
        pub fn log(&self) -> Vec<(ConsentPoint, String)> {
            self.log.lock().clone()
        }

        /// Labels passed to `point`, in order.
        pub fn labels(&self, point: ConsentPoint) -> Vec<String> {
            self.log
                .lock()
                .iter()
                .filter(|(p, _)| *p == point)
                .map(|(_, label)| label.clone())
                .collect()
        }

        /// Messages of the failures reported via `complete_operation_failure`.
        pub fn failures(&self) -> Vec<String> {
            self.failures.lock().clone()
        }

        /// Summaries reported on completion, in order.
        pub fn summaries(&self) -> Vec<OperationSummary> {
            self.summaries.lock().clone()
        }

        /// Clears the log, failures and summaries; keeps behaviour.
        pub fn reset(&self) {
            self.log.lock().clear();
            self.failures.lock().clear();
            self.summaries.lock().clear();
        }

        fn record(&self, point: ConsentPoint, label: String) {
            self.log.lock().push((point, label));
        }
    }

    impl ConsentService for MockConsentService {
        fn start_operation(&self, ctx: &OperationContext) -> ConsentOutcome {
            self.record(ConsentPoint::StartOperation, ctx.kind.to_string());
            (self.start)(ctx)
        }

        fn can_see_resource(&self, ctx: &OperationContext, resource: &ResourceNode) -> ConsentOutcome {
            self.record(ConsentPoint::CanSeeResource, resource.label());
            (self.can_see)(ctx, resource)
        }

        fn will_see_resource(
            &self,
            ctx: &OperationContext,
            resource: &mut ResourceNode,
        ) -> ConsentOutcome {
            self.record(ConsentPoint::WillSeeResource, resource.label());
            (self.will_see)(ctx, resource)
        }

        fn complete_operation_success(&self, ctx: &OperationContext, summary: &OperationSummary) {
            self.record(ConsentPoint::CompleteSuccess, ctx.kind.to_string());
            self.summaries.lock().push(*summary);
        }

        fn complete_operation_failure(
            &self,
            ctx: &OperationContext,
            failure: &OperationFailure<'_>,
            summary: &OperationSummary,
        ) {
            self.record(ConsentPoint::CompleteFailure, ctx.kind.to_string());
            self.failures.lock().push(failure.to_string());
            self.summaries.lock().push(*summary);
        }
    }
}
