//! The authenticated principal and its capability set.

use crate::ActionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Closed capability enumeration gating one (resource kind, verb) pair or a
/// cross-cutting capability.
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
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum Permission {
    /// Subsumes every other permission
    Admin,
    /// Subsumes every read capability
    ReadAll,
    /// Hard ceiling: rejects non-dry-run mutating actions regardless of
    /// other grants
    DryRunOnly,
    TagRead,
    TagCreate,
    TagUpdate,
    TagDelete,
    ViewRead,
    ViewCreate,
    ViewUpdate,
    ViewDelete,
    ScriptRead,
    ScriptCreate,
    ScriptUpdate,
    ScriptDelete,
    NamedQueryRead,
    NamedQueryCreate,
    NamedQueryUpdate,
    NamedQueryDelete,
    ProjectRead,
    ProjectCreate,
    ProjectUpdate,
    ProjectDelete,
}

impl Permission {
    /// Whether this permission denotes a read capability.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Permission::ReadAll
                | Permission::TagRead
                | Permission::ViewRead
                | Permission::ScriptRead
                | Permission::NamedQueryRead
                | Permission::ProjectRead
        )
    }

    /// The single auditable widening rule: does holding `self` satisfy a
    /// requirement for `required`?
    ///
    /// Admin implies everything; ReadAll implies every read capability; every
    /// permission implies itself. DryRunOnly implies nothing (it is a
    /// restriction, not a grant).
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_core::Permission;
    ///
    /// assert!(Permission::Admin.implies(Permission::TagDelete));
    /// assert!(Permission::ReadAll.implies(Permission::ViewRead));
    /// assert!(!Permission::ReadAll.implies(Permission::ViewUpdate));
    /// assert!(Permission::TagRead.implies(Permission::TagRead));
    /// ```
    pub fn implies(self, required: Permission) -> bool {
        if self == required {
            return true;
        }
        match self {
            Permission::Admin => true,
            Permission::ReadAll => required.is_read(),
            _ => false,
        }
    }

    /// The verb a (resource kind, verb) permission gates, if any.
    pub fn verb(self) -> Option<ActionKind> {
        match self {
            Permission::TagCreate
            | Permission::ViewCreate
            | Permission::ScriptCreate
            | Permission::NamedQueryCreate
            | Permission::ProjectCreate => Some(ActionKind::Create),
            Permission::TagRead
            | Permission::ViewRead
            | Permission::ScriptRead
            | Permission::NamedQueryRead
            | Permission::ProjectRead => Some(ActionKind::Read),
            Permission::TagUpdate
            | Permission::ViewUpdate
            | Permission::ScriptUpdate
            | Permission::NamedQueryUpdate
            | Permission::ProjectUpdate => Some(ActionKind::Update),
            Permission::TagDelete
            | Permission::ViewDelete
            | Permission::ScriptDelete
            | Permission::NamedQueryDelete
            | Permission::ProjectDelete => Some(ActionKind::Delete),
            Permission::Admin | Permission::ReadAll | Permission::DryRunOnly => None,
        }
    }
}

/// Deployment posture shifting default confirmation requirements without
/// changing permission grants.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnvironmentMode {
    /// All four verbs proceed without mode-imposed confirmation
    Development,
    /// Delete requires confirmation; the rest proceed freely
    Test,
    /// Create/Update/Delete require confirmation by default
    #[default]
    Production,
}

/// The authenticated principal, built once per inbound request from validated
/// credentials and discarded at request end.
///
/// # Examples
///
/// ```
/// use gatehouse_core::{AuthContext, Permission};
///
/// let identity = AuthContext::new("agent-1")
///     .with_permission(Permission::ReadAll);
/// assert!(identity.has_permission(Permission::TagRead));
/// assert!(!identity.has_permission(Permission::TagDelete));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Stable identifier for the principal
    pub id: String,
    /// Granted capability set
    pub permissions: HashSet<Permission>,
    /// Credential expiry, if bounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// Network address the request arrived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_address: Option<String>,
    /// Free-form identity attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl AuthContext {
    /// Create an identity with no permissions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            permissions: HashSet::new(),
            expiry: None,
            client_address: None,
            attributes: HashMap::new(),
        }
    }

    /// Grant one permission.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    /// Grant many permissions.
    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// Set the credential expiry.
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Whether any held permission satisfies `required` after widening.
    pub fn has_permission(&self, required: Permission) -> bool {
        self.permissions.iter().any(|held| held.implies(required))
    }

    /// Whether the credentials have expired.
    pub fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|expiry| Utc::now() > expiry)
    }

    /// Whether the identity is restricted to dry-run execution.
    pub fn is_dry_run_only(&self) -> bool {
        self.permissions.contains(&Permission::DryRunOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use strum::IntoEnumIterator;

    #[test]
    fn test_admin_implies_everything() {
        for required in Permission::iter() {
            assert!(
                Permission::Admin.implies(required),
                "Admin should imply {required}"
            );
        }
    }

    #[test]
    fn test_read_all_implies_exactly_the_reads() {
        for required in Permission::iter() {
            assert_eq!(
                Permission::ReadAll.implies(required),
                required.is_read(),
                "ReadAll vs {required}"
            );
        }
    }

    #[test]
    fn test_ordinary_permissions_imply_only_themselves() {
        for held in Permission::iter() {
            if matches!(held, Permission::Admin | Permission::ReadAll) {
                continue;
            }
            for required in Permission::iter() {
                assert_eq!(
                    held.implies(required),
                    held == required,
                    "{held} vs {required}"
                );
            }
        }
    }

    #[test]
    fn test_dry_run_only_grants_nothing() {
        let identity = AuthContext::new("agent").with_permission(Permission::DryRunOnly);
        assert!(!identity.has_permission(Permission::TagRead));
        assert!(identity.is_dry_run_only());
    }

    #[test]
    fn test_expiry() {
        let expired =
            AuthContext::new("agent").with_expiry(Utc::now() - Duration::seconds(1));
        assert!(expired.is_expired());
        let fresh = AuthContext::new("agent").with_expiry(Utc::now() + Duration::hours(1));
        assert!(!fresh.is_expired());
        assert!(!AuthContext::new("agent").is_expired());
    }

    #[test]
    fn test_permission_round_trips_screaming_snake() {
        let json = serde_json::to_string(&Permission::NamedQueryDelete).unwrap();
        assert_eq!(json, "\"NAMED_QUERY_DELETE\"");
        assert_eq!(
            format!("{}", Permission::DryRunOnly),
            "DRY_RUN_ONLY"
        );
    }
}
