//! The action model: the unit of work flowing through the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Payload map carried by Create/Update actions.
pub type Payload = serde_json::Map<String, Value>;

/// The verb an action performs against its target.
///
/// Read doubles as List when the target path ends in a `*` wildcard segment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum ActionKind {
    /// Create a new resource instance
    Create,
    /// Read an existing resource (or list, via wildcard target)
    Read,
    /// Update an existing resource
    Update,
    /// Delete an existing resource
    Delete,
}

impl ActionKind {
    /// Whether this verb mutates the target.
    pub fn is_mutating(self) -> bool {
        !matches!(self, ActionKind::Read)
    }
}

/// Caller-supplied execution options.
///
/// # Examples
///
/// ```
/// use gatehouse_core::ActionOptions;
///
/// let options = ActionOptions::default();
/// assert!(!options.dry_run);
/// assert!(!options.force);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActionOptions {
    /// Perform all checks and preview effects without mutating
    #[serde(default)]
    pub dry_run: bool,
    /// Caller-asserted override of the confirmation requirement
    #[serde(default)]
    pub force: bool,
    /// Apply the operation recursively below the target
    #[serde(default)]
    pub recursive: bool,
    /// Free-form audit comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// An immutable requested mutation.
///
/// The payload and options are never mutated after construction; all
/// transformations produce new maps.
///
/// # Examples
///
/// ```
/// use gatehouse_core::{Action, ActionKind};
///
/// let action = Action::new(ActionKind::Read, "tag", "default/Pumps/Pump1");
/// assert_eq!(action.kind(), ActionKind::Read);
/// assert!(!action.correlation_id().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    correlation_id: String,
    kind: ActionKind,
    resource_kind: String,
    target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Payload>,
    #[serde(default)]
    options: ActionOptions,
}

impl Action {
    /// Create an action with a freshly generated correlation id.
    pub fn new(
        kind: ActionKind,
        resource_kind: impl Into<String>,
        target_path: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            kind,
            resource_kind: resource_kind.into(),
            target_path: target_path.into(),
            payload: None,
            options: ActionOptions::default(),
        }
    }

    /// Replace the generated correlation id with a caller-supplied one.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Attach a payload (required for Create/Update).
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach execution options.
    pub fn with_options(mut self, options: ActionOptions) -> Self {
        self.options = options;
        self
    }

    /// The opaque identifier correlating logs for this request.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// The verb this action performs.
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// String tag identifying which handler owns the target.
    pub fn resource_kind(&self) -> &str {
        &self.resource_kind
    }

    /// Hierarchical path identifying the resource instance.
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// The payload, if any.
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// The execution options.
    pub fn options(&self) -> &ActionOptions {
        &self.options
    }

    /// Whether this Read targets a wildcard (list) path.
    pub fn is_wildcard_read(&self) -> bool {
        self.kind == ActionKind::Read && self.target_path.ends_with('*')
    }

    /// Whether this action is destructive on its face.
    ///
    /// Delete is always destructive. Updates may also be destructive, but
    /// that is declared by the owning handler
    /// ([`crate::ResourceHandler::is_destructive_update`]), not the caller.
    pub fn is_destructive(&self) -> bool {
        self.kind == ActionKind::Delete
    }

    /// A new payload map with `extra` entries merged over the existing ones.
    ///
    /// The action's own payload is left untouched.
    pub fn merged_payload(&self, extra: &Payload) -> Payload {
        let mut merged = self.payload.clone().unwrap_or_default();
        for (key, value) in extra {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Look up a string field in the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }

    /// Look up a boolean field in the payload.
    pub fn payload_bool(&self, key: &str) -> Option<bool> {
        self.payload.as_ref()?.get(key)?.as_bool()
    }

    /// Whether the caller acknowledged scan warnings in the payload.
    pub fn acknowledges_warnings(&self) -> bool {
        self.payload_bool("acknowledgeWarnings").unwrap_or(false)
    }
}
