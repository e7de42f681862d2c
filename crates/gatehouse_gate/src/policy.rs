//! Capability-based authorization.

use gatehouse_core::{Action, ActionKind, AuthContext, EnvironmentMode, Permission};
use gatehouse_error::{GateError, GateErrorKind, GateResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// The permissions gating each verb for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourcePermissions {
    /// Permission required to Read (and List)
    pub read: Permission,
    /// Permission required to Create
    pub create: Permission,
    /// Permission required to Update
    pub update: Permission,
    /// Permission required to Delete
    pub delete: Permission,
}

impl ResourcePermissions {
    /// The permission gating the given verb.
    pub fn for_kind(&self, kind: ActionKind) -> Permission {
        match kind {
            ActionKind::Read => self.read,
            ActionKind::Create => self.create,
            ActionKind::Update => self.update,
            ActionKind::Delete => self.delete,
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The action may proceed
    Allow,
    /// The action is refused outright
    Deny {
        /// Why the action was refused
        reason: String,
    },
    /// The action may proceed once the caller confirms with `force=true`
    RequireConfirmation {
        /// Why confirmation is required
        reason: String,
        /// Context for the caller to safely retry
        context: Value,
    },
}

impl Decision {
    fn deny(reason: impl Into<String>) -> Self {
        Decision::Deny {
            reason: reason.into(),
        }
    }
}

/// Evaluates a capability set plus an environment mode against an action.
///
/// The check ordering is deliberate: permission absence is decided before
/// confirmation requirements, so a caller without rights never learns how
/// `force` would have changed the outcome.
pub struct PolicyEngine {
    mode: EnvironmentMode,
    resource_permissions: HashMap<String, ResourcePermissions>,
}

impl PolicyEngine {
    /// Create an engine for the given environment mode with the five
    /// built-in resource kinds registered.
    pub fn new(mode: EnvironmentMode) -> Self {
        let mut resource_permissions = HashMap::new();
        resource_permissions.insert(
            "tag".to_string(),
            ResourcePermissions {
                read: Permission::TagRead,
                create: Permission::TagCreate,
                update: Permission::TagUpdate,
                delete: Permission::TagDelete,
            },
        );
        resource_permissions.insert(
            "view".to_string(),
            ResourcePermissions {
                read: Permission::ViewRead,
                create: Permission::ViewCreate,
                update: Permission::ViewUpdate,
                delete: Permission::ViewDelete,
            },
        );
        resource_permissions.insert(
            "script".to_string(),
            ResourcePermissions {
                read: Permission::ScriptRead,
                create: Permission::ScriptCreate,
                update: Permission::ScriptUpdate,
                delete: Permission::ScriptDelete,
            },
        );
        resource_permissions.insert(
            "named-query".to_string(),
            ResourcePermissions {
                read: Permission::NamedQueryRead,
                create: Permission::NamedQueryCreate,
                update: Permission::NamedQueryUpdate,
                delete: Permission::NamedQueryDelete,
            },
        );
        resource_permissions.insert(
            "project".to_string(),
            ResourcePermissions {
                read: Permission::ProjectRead,
                create: Permission::ProjectCreate,
                update: Permission::ProjectUpdate,
                delete: Permission::ProjectDelete,
            },
        );
        Self {
            mode,
            resource_permissions,
        }
    }

    /// The engine's environment mode.
    pub fn mode(&self) -> EnvironmentMode {
        self.mode
    }

    /// Register permissions for an additional resource kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is already registered.
    pub fn register_resource(
        &mut self,
        resource_kind: impl Into<String>,
        permissions: ResourcePermissions,
    ) -> GateResult<()> {
        let resource_kind = resource_kind.into();
        if self.resource_permissions.contains_key(&resource_kind) {
            return Err(GateError::new(GateErrorKind::Configuration(format!(
                "resource kind '{resource_kind}' already has permissions registered"
            ))));
        }
        self.resource_permissions.insert(resource_kind, permissions);
        Ok(())
    }

    /// Authorize an action.
    ///
    /// `requires_confirmation` is the handler-widened confirmation predicate
    /// (defaulting to the action's own destructiveness) plus any
    /// unacknowledged scan warnings.
    #[instrument(skip(self, identity, action), fields(caller = identity.id.as_str(), resource_kind = action.resource_kind()))]
    pub fn authorize(
        &self,
        identity: &AuthContext,
        action: &Action,
        requires_confirmation: bool,
    ) -> Decision {
        debug!("Authorizing action");

        // 1. Map (resource kind, verb) to the required permission.
        let Some(permissions) = self.resource_permissions.get(action.resource_kind()) else {
            debug!("Unknown resource kind");
            return Decision::deny(format!(
                "UNSUPPORTED_RESOURCE: no permissions registered for resource kind '{}'",
                action.resource_kind()
            ));
        };
        let required = permissions.for_kind(action.kind());

        // 2. Expired credentials and missing permissions deny before any
        // confirmation logic runs.
        if identity.is_expired() {
            debug!("Identity expired");
            return Decision::deny("credentials have expired");
        }
        if !identity.has_permission(required) {
            debug!(%required, "Missing permission");
            return Decision::deny(format!("missing permission {required}"));
        }

        // 3. DRY_RUN_ONLY is a hard ceiling, not advisory.
        if identity.is_dry_run_only()
            && action.kind().is_mutating()
            && !action.options().dry_run
        {
            debug!("Dry-run-only identity attempted live mutation");
            return Decision::deny(
                "identity is restricted to dry-run execution; re-issue with dryRun=true",
            );
        }

        // 4. Environment-mode confirmation defaults.
        let mode_requires_confirmation = match self.mode {
            EnvironmentMode::Development => false,
            EnvironmentMode::Test => action.kind() == ActionKind::Delete,
            EnvironmentMode::Production => {
                action.kind().is_mutating()
                    && !identity.permissions.contains(&Permission::Admin)
            }
        };

        // 5. Confirmation gate, bypassable only by force. A dry run mutates
        // nothing, so confirmation is moot for it.
        if (requires_confirmation || mode_requires_confirmation)
            && !action.options().force
            && !action.options().dry_run
        {
            debug!("Confirmation required");
            let reason = if requires_confirmation {
                format!(
                    "{} of {} '{}' is destructive and requires confirmation",
                    action.kind(),
                    action.resource_kind(),
                    action.target_path()
                )
            } else {
                format!(
                    "{} mode requires confirmation for {} actions",
                    self.mode,
                    action.kind()
                )
            };
            let context = json!({
                "resourceKind": action.resource_kind(),
                "targetPath": action.target_path(),
                "verb": action.kind().to_string(),
                "retry": "re-issue the same action with options.force = true",
            });
            return Decision::RequireConfirmation { reason, context };
        }

        debug!("Action allowed");
        Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use gatehouse_core::ActionOptions;

    fn engine(mode: EnvironmentMode) -> PolicyEngine {
        PolicyEngine::new(mode)
    }

    fn forced() -> ActionOptions {
        ActionOptions {
            force: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_read_with_tag_read_allows() {
        let identity = AuthContext::new("agent").with_permission(Permission::TagRead);
        let action = Action::new(ActionKind::Read, "tag", "default/Pump1");
        let decision = engine(EnvironmentMode::Development).authorize(&identity, &action, false);
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn test_tag_read_cannot_delete() {
        // Scenario B: TAG_READ holder attempting a tag Delete is denied.
        let identity = AuthContext::new("agent").with_permission(Permission::TagRead);
        let action = Action::new(ActionKind::Delete, "tag", "default/Pump1");
        let decision = engine(EnvironmentMode::Development).authorize(&identity, &action, true);
        assert!(matches!(decision, Decision::Deny { .. }));
    }

    #[test]
    fn test_denial_comes_before_confirmation() {
        // A caller without rights must not learn what force would have done:
        // even with force set, the missing permission wins.
        let identity = AuthContext::new("agent").with_permission(Permission::TagRead);
        let action =
            Action::new(ActionKind::Delete, "tag", "default/Pump1").with_options(forced());
        let decision = engine(EnvironmentMode::Production).authorize(&identity, &action, true);
        assert!(matches!(decision, Decision::Deny { .. }));
    }

    #[test]
    fn test_unknown_resource_kind_denies_unsupported() {
        let identity = AuthContext::new("agent").with_permission(Permission::Admin);
        let action = Action::new(ActionKind::Read, "pipeline", "scope/p1");
        let decision = engine(EnvironmentMode::Development).authorize(&identity, &action, false);
        match decision {
            Decision::Deny { reason } => assert!(reason.contains("UNSUPPORTED_RESOURCE")),
            other => panic!("expected deny, got {other:?}"),
        }
    }

    #[test]
    fn test_dry_run_only_is_a_hard_ceiling() {
        let identity = AuthContext::new("agent")
            .with_permission(Permission::TagCreate)
            .with_permission(Permission::DryRunOnly);
        let live = Action::new(ActionKind::Create, "tag", "default/Pump1");
        let decision = engine(EnvironmentMode::Development).authorize(&identity, &live, false);
        assert!(matches!(decision, Decision::Deny { .. }));

        let dry = Action::new(ActionKind::Create, "tag", "default/Pump1").with_options(
            ActionOptions {
                dry_run: true,
                ..Default::default()
            },
        );
        let decision = engine(EnvironmentMode::Development).authorize(&identity, &dry, false);
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn test_expired_identity_denies() {
        let identity = AuthContext::new("agent")
            .with_permission(Permission::TagRead)
            .with_expiry(Utc::now() - Duration::seconds(5));
        let action = Action::new(ActionKind::Read, "tag", "default/Pump1");
        let decision = engine(EnvironmentMode::Development).authorize(&identity, &action, false);
        assert!(matches!(decision, Decision::Deny { .. }));
    }

    #[test]
    fn test_development_mode_allows_all_verbs() {
        let identity = AuthContext::new("agent").with_permission(Permission::Admin);
        for kind in [
            ActionKind::Create,
            ActionKind::Read,
            ActionKind::Update,
            ActionKind::Delete,
        ] {
            let action = Action::new(kind, "tag", "default/Pump1");
            let decision =
                engine(EnvironmentMode::Development).authorize(&identity, &action, false);
            assert_eq!(decision, Decision::Allow, "verb {kind}");
        }
    }

    #[test]
    fn test_test_mode_requires_confirmation_for_delete_only() {
        let identity = AuthContext::new("agent").with_permission(Permission::Admin);
        let update = Action::new(ActionKind::Update, "tag", "default/Pump1");
        assert_eq!(
            engine(EnvironmentMode::Test).authorize(&identity, &update, false),
            Decision::Allow
        );
        let delete = Action::new(ActionKind::Delete, "tag", "default/Pump1");
        assert!(matches!(
            engine(EnvironmentMode::Test).authorize(&identity, &delete, false),
            Decision::RequireConfirmation { .. }
        ));
    }

    #[test]
    fn test_production_mode_requires_confirmation_for_mutations() {
        let identity = AuthContext::new("agent").with_permissions([
            Permission::TagCreate,
            Permission::TagRead,
        ]);
        let create = Action::new(ActionKind::Create, "tag", "default/Pump1");
        assert!(matches!(
            engine(EnvironmentMode::Production).authorize(&identity, &create, false),
            Decision::RequireConfirmation { .. }
        ));
        let read = Action::new(ActionKind::Read, "tag", "default/Pump1");
        assert_eq!(
            engine(EnvironmentMode::Production).authorize(&identity, &read, false),
            Decision::Allow
        );
    }

    #[test]
    fn test_production_admin_skips_mode_confirmation() {
        let identity = AuthContext::new("agent").with_permission(Permission::Admin);
        let create = Action::new(ActionKind::Create, "tag", "default/Pump1");
        assert_eq!(
            engine(EnvironmentMode::Production).authorize(&identity, &create, false),
            Decision::Allow
        );
    }

    #[test]
    fn test_dry_run_skips_confirmation() {
        // A dry-run delete previews without a confirmation round-trip, which
        // is what makes DryRunOnly identities useful in production.
        let identity = AuthContext::new("agent").with_permissions([
            Permission::TagDelete,
            Permission::DryRunOnly,
        ]);
        let action = Action::new(ActionKind::Delete, "tag", "default/Pump1").with_options(
            ActionOptions {
                dry_run: true,
                ..Default::default()
            },
        );
        let decision = engine(EnvironmentMode::Production).authorize(&identity, &action, true);
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn test_force_bypasses_confirmation() {
        let identity = AuthContext::new("agent").with_permission(Permission::TagDelete);
        let action =
            Action::new(ActionKind::Delete, "tag", "default/Pump1").with_options(forced());
        let decision = engine(EnvironmentMode::Development).authorize(&identity, &action, true);
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn test_confirmation_context_carries_retry_instructions() {
        let identity = AuthContext::new("agent").with_permission(Permission::TagDelete);
        let action = Action::new(ActionKind::Delete, "tag", "default/Pump1");
        match engine(EnvironmentMode::Development).authorize(&identity, &action, true) {
            Decision::RequireConfirmation { context, .. } => {
                assert_eq!(context["targetPath"], "default/Pump1");
                assert!(context["retry"].as_str().unwrap().contains("force"));
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[test]
    fn test_builtin_permissions_gate_the_verb_they_name() {
        // for_kind and Permission::verb are two views of the same mapping;
        // every built-in registration must keep them in agreement.
        let engine = engine(EnvironmentMode::Development);
        for (resource_kind, permissions) in &engine.resource_permissions {
            for kind in [
                ActionKind::Create,
                ActionKind::Read,
                ActionKind::Update,
                ActionKind::Delete,
            ] {
                assert_eq!(
                    permissions.for_kind(kind).verb(),
                    Some(kind),
                    "{resource_kind} / {kind}"
                );
            }
        }
    }

    #[test]
    fn test_register_resource_rejects_duplicates() {
        let mut engine = engine(EnvironmentMode::Development);
        let permissions = ResourcePermissions {
            read: Permission::TagRead,
            create: Permission::TagCreate,
            update: Permission::TagUpdate,
            delete: Permission::TagDelete,
        };
        assert!(engine.register_resource("alarm", permissions).is_ok());
        assert!(engine.register_resource("alarm", permissions).is_err());
    }
}
