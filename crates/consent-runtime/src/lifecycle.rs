//! Operation lifecycle tracking.
//!
//! Every operation moves `NotStarted → Started → Completed`. The
//! [`OperationScope`] guard owns that state for one operation:
//!
//! - `start_operation` fires at most once, on first resource access
//!   ([`OperationScope::ensure_started`])
//! - exactly one completion fires, on every exit path: [`finish`],
//!   [`fail`], or `Drop` (reported as [`OperationFailure::Cancelled`])
//!
//! `finish` and `fail` consume the scope, so completing twice does not
//! type-check.
//!
//! [`finish`]: OperationScope::finish
//! [`fail`]: OperationScope::fail

use consent_hook::{
    ConsentOutcome, ConsentService, ConsentStatus, OperationContext, OperationFailure,
    OperationSummary,
};
use consent_types::Resource;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No resource touched yet.
    NotStarted,
    /// `start_operation` has been answered (or skipped for exempt kinds).
    Started,
    /// A completion callback has fired.
    Completed,
}

/// What the operation start decided.
#[derive(Debug, Clone, PartialEq)]
pub enum StartDecision {
    /// Exempt operation or consent disabled: no per-resource checks.
    Exempt,
    /// Check every resource.
    Proceed,
    /// Skip every per-resource check; keep the total.
    Authorized,
    /// Refuse the whole operation, optionally explained.
    Reject(Option<Resource>),
}

impl StartDecision {
    /// Returns `true` if resources pass without per-resource checks.
    #[must_use]
    pub fn skips_checks(&self) -> bool {
        matches!(self, Self::Exempt | Self::Authorized)
    }
}

/// Bookkeeping for one operation.
#[derive(Debug, Clone)]
pub struct LifecycleRecord {
    state: LifecycleState,
    start: Option<StartDecision>,
    start_called: bool,
    standing: ConsentStatus,
    evaluated: usize,
    rejected: usize,
    replaced: usize,
}

impl LifecycleRecord {
    fn new() -> Self {
        Self {
            state: LifecycleState::NotStarted,
            start: None,
            start_called: false,
            standing: ConsentStatus::Proceed,
            evaluated: 0,
            rejected: 0,
            replaced: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The start decision, once started.
    #[must_use]
    pub fn start_decision(&self) -> Option<&StartDecision> {
        self.start.as_ref()
    }

    /// Standing outcome of the operation.
    #[must_use]
    pub fn standing(&self) -> ConsentStatus {
        self.standing
    }

    /// Snapshot reported to the completion callbacks.
    #[must_use]
    pub fn summary(&self) -> OperationSummary {
        OperationSummary {
            started: self.start_called,
            standing: self.standing,
            evaluated: self.evaluated,
            rejected: self.rejected,
            replaced: self.replaced,
        }
    }

    pub(crate) fn note_evaluated(&mut self) {
        self.evaluated += 1;
    }

    pub(crate) fn note_rejected(&mut self) {
        self.rejected += 1;
    }

    pub(crate) fn note_replaced(&mut self) {
        self.replaced += 1;
    }

    pub(crate) fn authorize_rest(&mut self) {
        self.standing = ConsentStatus::Authorized;
    }

    pub(crate) fn is_authorized(&self) -> bool {
        self.standing == ConsentStatus::Authorized
    }
}

/// Scoped guard over one operation's lifecycle.
///
/// Created by [`ConsentPipeline::open`](crate::ConsentPipeline::open).
/// Dropping an unfinished scope reports a cancellation to the policy.
pub struct OperationScope {
    service: Option<Arc<dyn ConsentService>>,
    ctx: OperationContext,
    record: LifecycleRecord,
}

impl OperationScope {
    /// Opens a scope reporting to `service`.
    #[must_use]
    pub fn new(service: Arc<dyn ConsentService>, ctx: OperationContext) -> Self {
        Self {
            service: Some(service),
            ctx,
            record: LifecycleRecord::new(),
        }
    }

    /// Opens a scope with no policy attached. Every resource passes and
    /// no callback fires.
    #[must_use]
    pub fn detached(ctx: OperationContext) -> Self {
        Self {
            service: None,
            ctx,
            record: LifecycleRecord::new(),
        }
    }

    /// The operation context.
    #[must_use]
    pub fn context(&self) -> &OperationContext {
        &self.ctx
    }

    /// The lifecycle record.
    #[must_use]
    pub fn record(&self) -> &LifecycleRecord {
        &self.record
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.record.state
    }

    /// Starts the operation if it has not started yet and returns the
    /// start decision.
    ///
    /// `start_operation` is called on the first invocation only; later
    /// calls return the recorded decision.
    pub fn ensure_started(&mut self) -> &StartDecision {
        match self.record.start {
            Some(ref decision) => decision,
            None => {
                let (decision, called) = begin(self.service.as_deref(), &self.ctx);
                self.record.state = LifecycleState::Started;
                self.record.start_called = called;
                self.record.standing = match decision {
                    StartDecision::Authorized => ConsentStatus::Authorized,
                    StartDecision::Reject(_) => ConsentStatus::Reject,
                    StartDecision::Exempt | StartDecision::Proceed => ConsentStatus::Proceed,
                };
                self.record.start.insert(decision)
            }
        }
    }

    /// Completes the operation successfully.
    pub fn finish(mut self) -> OperationSummary {
        self.complete(None)
    }

    /// Completes the operation with failure, handing `err` to the policy.
    pub fn fail(mut self, err: &(dyn Error + Send + Sync + 'static)) -> OperationSummary {
        self.complete(Some(OperationFailure::Error(err)))
    }

    pub(crate) fn parts(
        &mut self,
    ) -> (
        Option<&dyn ConsentService>,
        &OperationContext,
        &mut LifecycleRecord,
    ) {
        (self.service.as_deref(), &self.ctx, &mut self.record)
    }

    fn complete(&mut self, failure: Option<OperationFailure<'_>>) -> OperationSummary {
        let summary = self.record.summary();
        debug_assert_ne!(
            self.record.state,
            LifecycleState::Completed,
            "operation completed twice"
        );
        if self.record.state == LifecycleState::Completed {
            tracing::error!(
                operation = %self.ctx.operation_id,
                "operation completed twice, ignoring second completion"
            );
            return summary;
        }
        self.record.state = LifecycleState::Completed;

        let Some(service) = self.service.as_deref() else {
            return summary;
        };

        match failure {
            None => {
                info!(
                    operation = %self.ctx.operation_id,
                    kind = %self.ctx.kind,
                    standing = %summary.standing,
                    rejected = summary.rejected,
                    replaced = summary.replaced,
                    "operation completed"
                );
                service.complete_operation_success(&self.ctx, &summary);
            }
            Some(failure) => {
                info!(
                    operation = %self.ctx.operation_id,
                    kind = %self.ctx.kind,
                    failure = %failure,
                    "operation failed"
                );
                service.complete_operation_failure(&self.ctx, &failure, &summary);
            }
        }
        summary
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        if self.record.state != LifecycleState::Completed {
            warn!(
                operation = %self.ctx.operation_id,
                "operation dropped before completion"
            );
            self.complete(Some(OperationFailure::Cancelled));
        }
    }
}

impl std::fmt::Debug for OperationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationScope")
            .field("operation", &self.ctx.operation_id)
            .field("attached", &self.service.is_some())
            .field("record", &self.record)
            .finish()
    }
}

/// Runs `start_operation`. Returns the decision and whether the policy
/// was called.
fn begin(service: Option<&dyn ConsentService>, ctx: &OperationContext) -> (StartDecision, bool) {
    let Some(service) = service else {
        return (StartDecision::Exempt, false);
    };
    if ctx.is_exempt() {
        debug!(operation = %ctx.operation_id, kind = %ctx.kind, "exempt operation, no checks");
        return (StartDecision::Exempt, false);
    }

    let decision = match service.start_operation(ctx) {
        ConsentOutcome::Proceed => StartDecision::Proceed,
        ConsentOutcome::Authorized => StartDecision::Authorized,
        ConsentOutcome::Reject(diagnostic) => StartDecision::Reject(diagnostic),
        ConsentOutcome::Replace(_) => {
            warn!(
                operation = %ctx.operation_id,
                "Replace returned from start_operation, treating as proceed"
            );
            StartDecision::Proceed
        }
    };
    info!(
        operation = %ctx.operation_id,
        kind = %ctx.kind,
        decision = ?decision,
        "operation started"
    );
    (decision, true)
}
