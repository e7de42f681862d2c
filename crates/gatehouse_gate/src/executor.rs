//! The action executor: orchestrates the admission pipeline.

use crate::state::{ExecutionEvent, ExecutionStateMachine};
use crate::{ActionValidator, CallerRateLimiter, Decision, GateConfig, PolicyEngine};
use gatehouse_core::{
    marker, Action, ActionResult, ActionStatus, AuditLogger, AuthContext, ResourceHandler,
};
use gatehouse_error::{GateError, GateErrorKind, GateResult};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Registry mapping a resource kind to the handler that owns it.
///
/// Populated at startup; the executor performs a map lookup, never a type
/// switch over concrete handler types, so new kinds register without
/// touching the executor.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ResourceHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a resource kind.
    ///
    /// # Errors
    ///
    /// Returns [`GateErrorKind::DuplicateHandler`] if the kind is taken.
    pub fn register(
        &mut self,
        resource_kind: impl Into<String>,
        handler: Arc<dyn ResourceHandler>,
    ) -> GateResult<()> {
        let resource_kind = resource_kind.into();
        if self.handlers.contains_key(&resource_kind) {
            return Err(GateError::new(GateErrorKind::DuplicateHandler {
                resource_kind,
            }));
        }
        self.handlers.insert(resource_kind, handler);
        Ok(())
    }

    /// Look up the handler for a resource kind.
    pub fn get(&self, resource_kind: &str) -> Option<&Arc<dyn ResourceHandler>> {
        self.handlers.get(resource_kind)
    }

    /// The registered resource kinds.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

/// Sequences validation, rate checking, authorization, dispatch, and audit
/// emission, mapping every failure into a uniform [`ActionResult`].
///
/// The executor never lets an exception propagate to its caller: handler
/// panics are caught at the dispatch boundary and downgraded to FAILURE.
pub struct ActionExecutor {
    validator: ActionValidator,
    policy: PolicyEngine,
    rate_limiter: Arc<CallerRateLimiter>,
    registry: HandlerRegistry,
    audit: Arc<dyn AuditLogger>,
}

impl ActionExecutor {
    /// Assemble an executor from already-built parts.
    pub fn new(
        validator: ActionValidator,
        policy: PolicyEngine,
        rate_limiter: Arc<CallerRateLimiter>,
        registry: HandlerRegistry,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            validator,
            policy,
            rate_limiter,
            registry,
            audit,
        }
    }

    /// Build an executor from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured scanner pattern fails to compile.
    pub fn from_config(
        config: &GateConfig,
        registry: HandlerRegistry,
        audit: Arc<dyn AuditLogger>,
    ) -> GateResult<Self> {
        Ok(Self::new(
            config.build_validator()?,
            PolicyEngine::new(config.environment),
            Arc::new(CallerRateLimiter::new(config.rate_limit.clone())),
            registry,
            audit,
        ))
    }

    /// The executor's rate limiter, for status queries.
    pub fn rate_limiter(&self) -> &CallerRateLimiter {
        &self.rate_limiter
    }

    /// Execute one action through the full pipeline.
    #[instrument(skip(self, action, identity), fields(correlation_id = action.correlation_id(), caller = identity.id.as_str()))]
    pub fn execute(&self, action: &Action, identity: &AuthContext) -> ActionResult {
        info!(
            kind = %action.kind(),
            resource_kind = action.resource_kind(),
            target = action.target_path(),
            "Executing action"
        );
        let start = Instant::now();
        let mut machine = ExecutionStateMachine::new();

        let mut result = self.run(action, identity, &mut machine);
        result.correlation_id = action.correlation_id().to_string();
        result.duration_ms = start.elapsed().as_millis() as u64;

        // Audit emission is not optional and not skippable on error paths.
        self.audit_swallowing_panics(|audit| {
            audit.log_action_result(action.correlation_id(), &result);
        });
        debug!(status = %result.status, state = ?machine.state(), "Action finished");
        result
    }

    /// Async variant with identical semantics, suspending only at the
    /// dispatch boundary.
    pub async fn execute_async(
        self: Arc<Self>,
        action: Action,
        identity: AuthContext,
    ) -> ActionResult {
        let correlation_id = action.correlation_id().to_string();
        let task =
            tokio::task::spawn_blocking(move || self.execute(&action, &identity));
        match task.await {
            Ok(result) => result,
            Err(join_error) => ActionResult::failure(
                correlation_id,
                "execution task failed",
                format!("execution task failed: {join_error}"),
            ),
        }
    }

    /// Shut down shared pipeline state (the rate limiter's bucket map).
    pub fn shutdown(&self) {
        self.rate_limiter.shutdown();
    }

    fn run(
        &self,
        action: &Action,
        identity: &AuthContext,
        machine: &mut ExecutionStateMachine,
    ) -> ActionResult {
        // 1. Validation, including content scanning.
        let validation = self.validator.validate(action);
        if !validation.is_valid() {
            machine.apply(ExecutionEvent::ValidationFailed);
            if validation.has_security_violations() {
                for violation in &validation.security_violations {
                    self.audit_swallowing_panics(|audit| {
                        audit.log_security_event(
                            "blocked_pattern",
                            &format!("{} ({})", violation.description, violation.pattern),
                            &identity.id,
                        );
                    });
                }
            }
            return ActionResult::builder(action.correlation_id())
                .status(ActionStatus::Failure)
                .message("validation failed")
                .errors(validation.error_strings())
                .warnings(validation.warnings.clone())
                .finish();
        }
        machine.apply(ExecutionEvent::ValidationPassed);

        // 2. Rate check, before authorization so a flooding caller cannot
        // probe the policy engine.
        let estimated_units = estimate_units(action);
        match self.rate_limiter.check(&identity.id, estimated_units) {
            Ok(check) if !check.allowed => {
                machine.apply(ExecutionEvent::RateLimited);
                return ActionResult::builder(action.correlation_id())
                    .status(ActionStatus::Failure)
                    .message(check.message.clone())
                    .error(format!("{}: {}", marker::RATE_LIMITED, check.message))
                    .finish();
            }
            Ok(_) => {}
            Err(e) => {
                machine.apply(ExecutionEvent::RateLimited);
                return ActionResult::builder(action.correlation_id())
                    .status(ActionStatus::Failure)
                    .message("rate limiter unavailable")
                    .error(e.to_string())
                    .finish();
            }
        }

        // 3. Authorization. Confirmation is widened by the handler and by
        // unacknowledged scan warnings.
        let handler = self.registry.get(action.resource_kind());
        let requires_confirmation = handler
            .map(|h| h.requires_confirmation(action))
            .unwrap_or_else(|| action.is_destructive())
            || (!validation.warnings.is_empty() && !action.acknowledges_warnings());

        match self.policy.authorize(identity, action, requires_confirmation) {
            Decision::Deny { reason } => {
                machine.apply(ExecutionEvent::AuthorizationDenied);
                self.audit_swallowing_panics(|audit| {
                    audit.log_authorization_event(
                        action.correlation_id(),
                        &identity.id,
                        action.kind(),
                        action.target_path(),
                        false,
                        &reason,
                    );
                });
                let error_marker = if reason.starts_with("UNSUPPORTED_RESOURCE") {
                    marker::UNSUPPORTED_RESOURCE_TYPE
                } else {
                    marker::FORBIDDEN
                };
                return ActionResult::builder(action.correlation_id())
                    .status(ActionStatus::Failure)
                    .message(reason.clone())
                    .error(format!("{error_marker}: {reason}"))
                    .finish();
            }
            Decision::RequireConfirmation { reason, context } => {
                machine.apply(ExecutionEvent::ConfirmationRequired);
                self.audit_swallowing_panics(|audit| {
                    audit.log_authorization_event(
                        action.correlation_id(),
                        &identity.id,
                        action.kind(),
                        action.target_path(),
                        true,
                        &format!("pending confirmation: {reason}"),
                    );
                });
                return ActionResult::builder(action.correlation_id())
                    .status(ActionStatus::PendingConfirmation)
                    .message(reason)
                    .data(serde_json::json!({ "confirmation": context }))
                    .warnings(validation.warnings.clone())
                    .finish();
            }
            Decision::Allow => {
                machine.apply(ExecutionEvent::AuthorizationGranted);
                self.audit_swallowing_panics(|audit| {
                    audit.log_authorization_event(
                        action.correlation_id(),
                        &identity.id,
                        action.kind(),
                        action.target_path(),
                        true,
                        "allowed",
                    );
                });
            }
        }

        // 4. Dispatch: dry-run preview or the mutating path, panics caught.
        let Some(handler) = handler else {
            machine.apply(ExecutionEvent::HandlerFailed);
            return ActionResult::builder(action.correlation_id())
                .status(ActionStatus::Failure)
                .message(format!(
                    "no handler registered for resource kind '{}'",
                    action.resource_kind()
                ))
                .error(format!(
                    "{}: {}",
                    marker::UNSUPPORTED_RESOURCE_TYPE,
                    action.resource_kind()
                ))
                .finish();
        };

        let dispatch = catch_unwind(AssertUnwindSafe(|| {
            if action.options().dry_run {
                handler.dry_run_preview(action, identity)
            } else {
                handler.handle(action, identity)
            }
        }));

        let mut result = match dispatch {
            Ok(result) => {
                machine.apply(match result.status {
                    ActionStatus::Failure => ExecutionEvent::HandlerFailed,
                    _ => ExecutionEvent::HandlerCompleted,
                });
                result
            }
            Err(panic) => {
                machine.apply(ExecutionEvent::HandlerFailed);
                let text = panic_message(panic);
                error!(panic = %text, "Handler panicked");
                ActionResult::builder(action.correlation_id())
                    .status(ActionStatus::Failure)
                    .message("handler panicked")
                    .error(text)
                    .finish()
            }
        };

        // 5. Reconcile the optimistic unit debit against the true cost.
        let actual_units = result
            .data
            .as_ref()
            .and_then(|data| data.get("unitsUsed"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(estimated_units);
        self.rate_limiter
            .record_usage(&identity.id, estimated_units, actual_units);

        result.warnings.extend(validation.warnings);
        result
    }

    /// Audit failures must never abort the response path: panicking sinks
    /// are reported on a fallback channel instead.
    fn audit_swallowing_panics(&self, log: impl FnOnce(&dyn AuditLogger)) {
        let audit = Arc::clone(&self.audit);
        if catch_unwind(AssertUnwindSafe(|| log(audit.as_ref()))).is_err() {
            warn!(
                target: "gatehouse::audit_fallback",
                "audit logger panicked; event dropped"
            );
        }
    }
}

/// Rough unit cost estimate: payload size in tokens-worth of bytes.
fn estimate_units(action: &Action) -> u64 {
    match action.payload() {
        Some(payload) => {
            let serialized = serde_json::to_string(payload).unwrap_or_default();
            1 + (serialized.len() as u64 / 4)
        }
        None => 1,
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "handler panicked".to_string()
    }
}
