//! Action outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known error markers surfaced in [`ActionResult::errors`].
pub mod marker {
    /// Structurally invalid target path
    pub const INVALID_PATH: &str = "INVALID_PATH";
    /// Blocked content pattern detected; never bypassable
    pub const SECURITY_VIOLATION: &str = "SECURITY_VIOLATION";
    /// Authorization denial
    pub const FORBIDDEN: &str = "FORBIDDEN";
    /// Handler-reported missing resource
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// Handler-reported resource-state conflict
    pub const CONFLICT: &str = "CONFLICT";
    /// No handler registered for the action's resource kind
    pub const UNSUPPORTED_RESOURCE_TYPE: &str = "UNSUPPORTED_RESOURCE_TYPE";
    /// Caller exhausted a rate-limit ceiling
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
}

/// Terminal (and one non-terminal) outcome statuses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    /// The action completed successfully
    Success,
    /// The action failed; `errors` explains why
    Failure,
    /// Some of a multi-target action succeeded
    Partial,
    /// Preview of effects; nothing was mutated
    DryRun,
    /// A destructive action awaits confirmation (retry with `force=true`)
    PendingConfirmation,
}

/// The outcome of one executed action.
///
/// Constructed exactly once per action via [`ActionResultBuilder`] and never
/// mutated after return.
///
/// # Examples
///
/// ```
/// use gatehouse_core::{ActionResult, ActionStatus};
///
/// let result = ActionResult::builder("req-1")
///     .status(ActionStatus::Success)
///     .message("tag created")
///     .finish();
/// assert_eq!(result.status, ActionStatus::Success);
/// assert!(result.errors.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Echoes the action's correlation id
    pub correlation_id: String,
    /// Outcome status
    pub status: ActionStatus,
    /// Human-readable summary
    pub message: String,
    /// Opaque success payload (or confirmation context)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Non-fatal findings
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Fatal findings; non-empty iff status is FAILURE
    #[serde(default)]
    pub errors: Vec<String>,
    /// When the result was finalized
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration of the execution
    pub duration_ms: u64,
}

impl ActionResult {
    /// Start building a result for the given correlation id.
    pub fn builder(correlation_id: impl Into<String>) -> ActionResultBuilder {
        ActionResultBuilder::new(correlation_id)
    }

    /// Shorthand for a successful result.
    pub fn success(correlation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::builder(correlation_id)
            .status(ActionStatus::Success)
            .message(message)
            .finish()
    }

    /// Shorthand for a failed result with a single error marker.
    pub fn failure(
        correlation_id: impl Into<String>,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::builder(correlation_id)
            .status(ActionStatus::Failure)
            .message(message)
            .error(error)
            .finish()
    }

    /// Whether the result carries a given error marker, either as the whole
    /// error string or as its `MARKER: detail` prefix.
    pub fn has_error(&self, marker: &str) -> bool {
        self.errors
            .iter()
            .any(|e| e == marker || e.starts_with(marker) && e[marker.len()..].starts_with(':'))
    }
}

/// Builder producing a final immutable [`ActionResult`].
///
/// `finish` normalizes the status/errors invariants: a SUCCESS with errors is
/// downgraded to FAILURE, and a FAILURE without errors gains a generic one.
#[derive(Debug)]
pub struct ActionResultBuilder {
    correlation_id: String,
    status: ActionStatus,
    message: String,
    data: Option<Value>,
    warnings: Vec<String>,
    errors: Vec<String>,
    duration_ms: u64,
}

impl ActionResultBuilder {
    /// Start a builder for the given correlation id.
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status: ActionStatus::Failure,
            message: String::new(),
            data: None,
            warnings: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Set the outcome status.
    pub fn status(mut self, status: ActionStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the summary message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the opaque data payload.
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Append one warning.
    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Append many warnings.
    pub fn warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Append one error.
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Append many errors.
    pub fn errors(mut self, errors: impl IntoIterator<Item = String>) -> Self {
        self.errors.extend(errors);
        self
    }

    /// Record the execution duration.
    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Finalize the result, enforcing the status/errors invariants.
    pub fn finish(self) -> ActionResult {
        let mut status = self.status;
        let mut errors = self.errors;
        match status {
            ActionStatus::Failure if errors.is_empty() => {
                errors.push("unspecified failure".to_string());
            }
            ActionStatus::Success | ActionStatus::DryRun | ActionStatus::PendingConfirmation
                if !errors.is_empty() =>
            {
                status = ActionStatus::Failure;
            }
            _ => {}
        }
        ActionResult {
            correlation_id: self.correlation_id,
            status,
            message: self.message,
            data: self.data,
            warnings: self.warnings,
            errors,
            timestamp: Utc::now(),
            duration_ms: self.duration_ms,
        }
    }
}
