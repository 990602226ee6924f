//! Consent pipeline: entry point for the request layer.

use crate::config::ConsentConfig;
use crate::filter::filter_response;
use crate::lifecycle::{OperationScope, StartDecision};
use crate::modifiers::ModifierGuard;
use crate::{PipelineError, UnsupportedModifier};
use consent_hook::{ConsentService, OperationContext};
use consent_types::ResourceNode;
use std::error::Error;
use std::sync::Arc;
use tracing::debug;

/// What is sent back to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsentResponse {
    /// A body: the filtered resource tree, or a diagnostic.
    Content(ResourceNode),
    /// No body and no content type.
    NoContent,
}

impl ConsentResponse {
    /// Returns the body, if any.
    #[must_use]
    pub fn content(&self) -> Option<&ResourceNode> {
        match self {
            Self::Content(node) => Some(node),
            Self::NoContent => None,
        }
    }

    /// Consumes the response, returning the body.
    #[must_use]
    pub fn into_content(self) -> Option<ResourceNode> {
        match self {
            Self::Content(node) => Some(node),
            Self::NoContent => None,
        }
    }

    /// Returns `true` for the no-content terminal state.
    #[must_use]
    pub fn is_no_content(&self) -> bool {
        matches!(self, Self::NoContent)
    }

    /// HTTP status for the response.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Content(_) => 200,
            Self::NoContent => 204,
        }
    }
}

/// Runs operations through a consent policy.
///
/// The policy is shared by every operation; each call to
/// [`execute`](Self::execute) or [`open`](Self::open) gets its own
/// lifecycle.
///
/// # Example
///
/// ```
/// use consent_hook::{ConsentOutcome, ConsentService, OperationContext};
/// use consent_runtime::{ConsentPipeline, ConsentResponse};
/// use consent_types::{Container, Resource, ResourceNode};
/// use std::convert::Infallible;
/// use std::sync::Arc;
///
/// struct RejectAll;
/// impl ConsentService for RejectAll {
///     fn will_see_resource(&self, _: &OperationContext, _: &mut ResourceNode) -> ConsentOutcome {
///         ConsentOutcome::reject()
///     }
/// }
///
/// let pipeline = ConsentPipeline::new(Arc::new(RejectAll));
/// let response = pipeline
///     .execute(OperationContext::search("Patient"), |_| {
///         Ok::<_, Infallible>(Container::searchset(vec![Resource::new("Patient", "A").into()]).into())
///     })
///     .expect("no downstream error");
/// assert_eq!(response, ConsentResponse::NoContent);
/// ```
#[derive(Clone)]
pub struct ConsentPipeline {
    service: Arc<dyn ConsentService>,
    guard: ModifierGuard,
    enabled: bool,
}

impl ConsentPipeline {
    /// Creates an enabled pipeline refusing both count-style modifiers.
    #[must_use]
    pub fn new(service: Arc<dyn ConsentService>) -> Self {
        Self {
            service,
            guard: ModifierGuard::strict(),
            enabled: true,
        }
    }

    /// Creates a pipeline honouring `config.enabled` and `config.modifiers`.
    #[must_use]
    pub fn with_config(service: Arc<dyn ConsentService>, config: &ConsentConfig) -> Self {
        Self {
            service,
            guard: ModifierGuard::from_config(&config.modifiers),
            enabled: config.enabled,
        }
    }

    /// Returns `true` if consent filtering is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The shared policy.
    #[must_use]
    pub fn service(&self) -> &Arc<dyn ConsentService> {
        &self.service
    }

    /// Refuses count-style modifiers. Always passes when disabled.
    ///
    /// # Errors
    ///
    /// Returns the refused modifier.
    pub fn check_request(&self, ctx: &OperationContext) -> Result<(), UnsupportedModifier> {
        if !self.enabled {
            return Ok(());
        }
        self.guard.check(ctx).inspect_err(|m| {
            debug!(operation = %ctx.operation_id, modifier = m.modifier(), "modifier refused");
        })
    }

    /// Checks the request and opens a lifecycle scope for it.
    ///
    /// Use this when producing and rendering are driven by the caller;
    /// otherwise prefer [`execute`](Self::execute).
    ///
    /// # Errors
    ///
    /// Returns the refused modifier; no lifecycle is opened then.
    pub fn open(&self, ctx: OperationContext) -> Result<OperationScope, UnsupportedModifier> {
        self.check_request(&ctx)?;
        Ok(if self.enabled {
            OperationScope::new(self.service.clone(), ctx)
        } else {
            OperationScope::detached(ctx)
        })
    }

    /// Runs one operation end to end and returns the filtered response.
    ///
    /// Shorthand for [`execute_with`](Self::execute_with) with a render
    /// step that hands the response back unchanged.
    ///
    /// # Errors
    ///
    /// As for [`execute_with`](Self::execute_with).
    pub fn execute<E, F>(
        &self,
        ctx: OperationContext,
        produce: F,
    ) -> Result<ConsentResponse, PipelineError<E>>
    where
        E: Error + Send + Sync + 'static,
        F: FnOnce(&OperationContext) -> Result<ResourceNode, E>,
    {
        self.execute_with(ctx, produce, Ok)
    }

    /// Runs one operation end to end, finalizing the response inside the
    /// operation.
    ///
    /// 1. refuses count-style modifiers (lifecycle never starts)
    /// 2. starts the operation; a rejection short-circuits before
    ///    `produce` runs
    /// 3. runs `produce`; an error is reported to the policy, then
    ///    returned unchanged as [`PipelineError::Downstream`]
    /// 4. filters the produced tree
    /// 5. runs `render` on the response; an error is handled as in 3
    /// 6. completes the operation successfully
    ///
    /// # Errors
    ///
    /// See steps 1, 3 and 5.
    pub fn execute_with<T, E, F, R>(
        &self,
        ctx: OperationContext,
        produce: F,
        render: R,
    ) -> Result<T, PipelineError<E>>
    where
        E: Error + Send + Sync + 'static,
        F: FnOnce(&OperationContext) -> Result<ResourceNode, E>,
        R: FnOnce(ConsentResponse) -> Result<T, E>,
    {
        let mut scope = self.open(ctx)?;

        let rejected = match scope.ensure_started() {
            StartDecision::Reject(diagnostic) => Some(diagnostic.clone()),
            _ => None,
        };

        let response = match rejected {
            Some(Some(diag)) => ConsentResponse::Content(diag.into()),
            Some(None) => ConsentResponse::NoContent,
            None => match produce(scope.context()) {
                Ok(root) => filter_response(&mut scope, root),
                Err(err) => {
                    scope.fail(&err);
                    return Err(PipelineError::Downstream(err));
                }
            },
        };

        match render(response) {
            Ok(rendered) => {
                scope.finish();
                Ok(rendered)
            }
            Err(err) => {
                debug!(operation = %scope.context().operation_id, "render failed");
                scope.fail(&err);
                Err(PipelineError::Downstream(err))
            }
        }
    }
}

impl std::fmt::Debug for ConsentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentPipeline")
            .field("guard", &self.guard)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_hook::testing::MockConsentService;
    use consent_hook::{ConsentOutcome, ConsentPoint};
    use consent_types::{Container, Resource};
    use std::convert::Infallible;

    fn two_patients() -> ResourceNode {
        Container::searchset(vec![
            Resource::new("Patient", "PTA").into(),
            Resource::new("Patient", "PTB").into(),
        ])
        .into()
    }

    #[test]
    fn response_accessors() {
        let content = ConsentResponse::Content(Resource::new("Patient", "A").into());
        assert_eq!(content.status_code(), 200);
        assert!(content.content().is_some());
        assert!(!content.is_no_content());

        assert_eq!(ConsentResponse::NoContent.status_code(), 204);
        assert!(ConsentResponse::NoContent.into_content().is_none());
    }

    #[test]
    fn start_reject_short_circuits_produce() {
        let mock = Arc::new(MockConsentService::proceeding().on_start(|_| ConsentOutcome::reject()));
        let pipeline = ConsentPipeline::new(mock.clone());

        let mut produced = false;
        let response = pipeline
            .execute(OperationContext::search("Patient"), |_| {
                produced = true;
                Ok::<_, Infallible>(two_patients())
            })
            .expect("no downstream error");

        assert!(!produced);
        assert!(response.is_no_content());
        assert_eq!(mock.count(ConsentPoint::WillSeeResource), 0);
        assert_eq!(mock.count(ConsentPoint::CompleteSuccess), 1);
    }

    #[test]
    fn start_reject_with_diagnostic() {
        let mock = Arc::new(MockConsentService::proceeding().on_start(|_| {
            ConsentOutcome::reject_with(Resource::diagnostic("not today"))
        }));
        let pipeline = ConsentPipeline::new(mock);

        let response = pipeline
            .execute(OperationContext::search("Patient"), |_| {
                Ok::<_, Infallible>(two_patients())
            })
            .expect("no downstream error");

        let diag = response.content().and_then(ResourceNode::as_resource);
        assert_eq!(diag.and_then(Resource::diagnostics), Some("not today"));
    }

    // ── Render ──────────────────────────────────────────────

    #[derive(Debug)]
    struct WriteFailed;

    impl std::fmt::Display for WriteFailed {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("stdout closed")
        }
    }

    impl Error for WriteFailed {}

    #[test]
    fn render_runs_inside_the_operation() {
        let mock = Arc::new(MockConsentService::proceeding());
        let pipeline = ConsentPipeline::new(mock.clone());

        let status = pipeline
            .execute_with(
                OperationContext::search("Patient"),
                |_| Ok::<_, WriteFailed>(two_patients()),
                |response| {
                    // Nothing completed yet while rendering.
                    assert_eq!(mock.count(ConsentPoint::CompleteSuccess), 0);
                    Ok(response.status_code())
                },
            )
            .expect("render succeeds");

        assert_eq!(status, 200);
        assert_eq!(mock.count(ConsentPoint::CompleteSuccess), 1);
    }

    #[test]
    fn render_failure_reaches_failure_callback() {
        let mock = Arc::new(MockConsentService::proceeding());
        let pipeline = ConsentPipeline::new(mock.clone());

        let err = pipeline
            .execute_with(
                OperationContext::search("Patient"),
                |_| Ok(two_patients()),
                |_| Err::<(), _>(WriteFailed),
            )
            .unwrap_err();

        assert_eq!(err.to_string(), "stdout closed");
        assert!(err.downstream().is_some());
        assert_eq!(mock.count(ConsentPoint::CompleteFailure), 1);
        assert_eq!(mock.count(ConsentPoint::CompleteSuccess), 0);
        assert_eq!(mock.failures(), vec!["stdout closed".to_string()]);
    }

    #[test]
    fn rejected_start_is_rendered_too() {
        let mock = Arc::new(MockConsentService::proceeding().on_start(|_| ConsentOutcome::reject()));
        let pipeline = ConsentPipeline::new(mock.clone());

        let err = pipeline
            .execute_with(
                OperationContext::search("Patient"),
                |_| Ok(two_patients()),
                |response| {
                    assert!(response.is_no_content());
                    Err::<(), _>(WriteFailed)
                },
            )
            .unwrap_err();

        assert!(err.downstream().is_some());
        assert_eq!(mock.count(ConsentPoint::CompleteFailure), 1);
        assert_eq!(mock.count(ConsentPoint::CompleteSuccess), 0);
    }

    #[test]
    fn disabled_pipeline_passes_through() {
        let mock = Arc::new(MockConsentService::proceeding().on_will_see(|_, _| ConsentOutcome::reject()));
        let config = ConsentConfig {
            enabled: false,
            ..ConsentConfig::default()
        };
        let pipeline = ConsentPipeline::with_config(mock.clone(), &config);
        assert!(!pipeline.is_enabled());

        let ctx = OperationContext::search("Patient").with_param("_total", "accurate");
        let response = pipeline
            .execute(ctx, |_| Ok::<_, Infallible>(two_patients()))
            .expect("disabled pipeline accepts every modifier");

        assert_eq!(response, ConsentResponse::Content(two_patients()));
        assert!(mock.log().is_empty());
    }

    #[test]
    fn open_refuses_modifier_before_lifecycle() {
        let mock = Arc::new(MockConsentService::proceeding());
        let pipeline = ConsentPipeline::new(mock.clone());

        let ctx = OperationContext::search("Patient").with_param("_summary", "count");
        assert_eq!(
            pipeline.open(ctx).unwrap_err(),
            UnsupportedModifier::SummaryCount
        );
        assert!(mock.log().is_empty());
    }
}
