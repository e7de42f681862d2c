//! The resource handler boundary trait.

use crate::{Action, ActionKind, ActionResult, AuthContext};

/// One implementation per resource kind performs the actual mutation.
///
/// The pipeline requires each implementation to:
/// - never panic on "not found": return FAILURE with the
///   [`crate::marker::NOT_FOUND`] marker instead;
/// - re-check `options.force` for destructive operations itself and return
///   PENDING_CONFIRMATION when it is false (the policy engine's confirmation
///   check is not assumed to be the only gate);
/// - honor `options.dry_run` by returning a DRY_RUN preview without mutating.
pub trait ResourceHandler: Send + Sync {
    /// Create the target resource.
    fn create(&self, action: &Action, identity: &AuthContext) -> ActionResult;

    /// Read the target resource (or list, for wildcard targets).
    fn read(&self, action: &Action, identity: &AuthContext) -> ActionResult;

    /// Update the target resource.
    fn update(&self, action: &Action, identity: &AuthContext) -> ActionResult;

    /// Delete the target resource.
    fn delete(&self, action: &Action, identity: &AuthContext) -> ActionResult;

    /// Whether this Update would overwrite existing content irrecoverably.
    ///
    /// Handler-declared, not caller-declared. Defaults to false.
    fn is_destructive_update(&self, _action: &Action) -> bool {
        false
    }

    /// Whether this action needs human confirmation before executing.
    ///
    /// Defaults to the action's destructiveness; a resource kind may widen
    /// this (e.g. any payload carrying a security warning).
    fn requires_confirmation(&self, action: &Action) -> bool {
        action.is_destructive()
            || (action.kind() == ActionKind::Update && self.is_destructive_update(action))
    }

    /// A "what would happen" projection for dry runs.
    ///
    /// The default preview names the verb and target without touching the
    /// resource; handlers override this to include resource counts and diffs.
    fn dry_run_preview(&self, action: &Action, _identity: &AuthContext) -> ActionResult {
        ActionResult::builder(action.correlation_id())
            .status(crate::ActionStatus::DryRun)
            .message(format!(
                "dry run: would {} {} '{}'",
                action.kind(),
                action.resource_kind(),
                action.target_path()
            ))
            .finish()
    }

    /// Dispatch on the action's verb.
    fn handle(&self, action: &Action, identity: &AuthContext) -> ActionResult {
        match action.kind() {
            ActionKind::Create => self.create(action, identity),
            ActionKind::Read => self.read(action, identity),
            ActionKind::Update => self.update(action, identity),
            ActionKind::Delete => self.delete(action, identity),
        }
    }
}
