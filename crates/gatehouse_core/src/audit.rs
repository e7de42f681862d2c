//! The audit logger boundary trait.

use crate::{ActionKind, ActionResult};
use tracing::{info, warn};

/// Append-only audit sink consumed by the executor.
///
/// Implementations must never raise an error that aborts the executor's
/// response path: logging failures are swallowed and reported on a fallback
/// channel, never surfaced to the caller.
pub trait AuditLogger: Send + Sync {
    /// Record an authorization decision.
    fn log_authorization_event(
        &self,
        correlation_id: &str,
        caller_id: &str,
        verb: ActionKind,
        target_path: &str,
        granted: bool,
        reason: &str,
    );

    /// Record the terminal outcome of an action.
    fn log_action_result(&self, correlation_id: &str, result: &ActionResult);

    /// Record a security-relevant event (blocked pattern, violation).
    fn log_security_event(&self, event_type: &str, details: &str, caller_id: &str);
}

/// Audit logger emitting structured `tracing` events on the
/// `gatehouse::audit` target.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    /// Create a new tracing-backed audit logger.
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for TracingAuditLogger {
    fn log_authorization_event(
        &self,
        correlation_id: &str,
        caller_id: &str,
        verb: ActionKind,
        target_path: &str,
        granted: bool,
        reason: &str,
    ) {
        if granted {
            info!(
                target: "gatehouse::audit",
                correlation_id,
                caller_id,
                %verb,
                target_path,
                granted,
                reason,
                "authorization"
            );
        } else {
            warn!(
                target: "gatehouse::audit",
                correlation_id,
                caller_id,
                %verb,
                target_path,
                granted,
                reason,
                "authorization denied"
            );
        }
    }

    fn log_action_result(&self, correlation_id: &str, result: &ActionResult) {
        info!(
            target: "gatehouse::audit",
            correlation_id,
            status = %result.status,
            message = %result.message,
            error_count = result.errors.len(),
            warning_count = result.warnings.len(),
            duration_ms = result.duration_ms,
            "action result"
        );
    }

    fn log_security_event(&self, event_type: &str, details: &str, caller_id: &str) {
        warn!(
            target: "gatehouse::audit",
            event_type,
            details,
            caller_id,
            "security event"
        );
    }
}

/// No-op audit logger for tests.
#[derive(Debug, Clone, Default)]
pub struct NullAuditLogger;

impl AuditLogger for NullAuditLogger {
    fn log_authorization_event(
        &self,
        _correlation_id: &str,
        _caller_id: &str,
        _verb: ActionKind,
        _target_path: &str,
        _granted: bool,
        _reason: &str,
    ) {
    }

    fn log_action_result(&self, _correlation_id: &str, _result: &ActionResult) {}

    fn log_security_event(&self, _event_type: &str, _details: &str, _caller_id: &str) {}
}
