//! Permission decisions for `resource.action` strings.
//!
//! Guests and principals without an organization are always denied. Owners
//! and admins are always allowed. Everyone else is allowed only when their
//! membership's map holds `true` at `[resource][action]`.

use std::sync::Arc;

use tracing::instrument;

use crate::models::{Principal, StaffMembership};
use crate::services::metrics;
use crate::services::store::Store;
use crate::services::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Guest role or no organization on the principal.
    NoAffiliation,
    /// No membership row for the principal in its organization.
    ProfileNotFound,
    NotGranted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    fn label(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny(DenyReason::NoAffiliation) => "deny_no_affiliation",
            Decision::Deny(DenyReason::ProfileNotFound) => "deny_profile_not_found",
            Decision::Deny(DenyReason::NotGranted) => "deny_not_granted",
        }
    }
}

/// A parsed `resource.action` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission<'a> {
    pub resource: &'a str,
    pub action: &'a str,
}

impl<'a> Permission<'a> {
    /// Exactly two non-empty dot-separated segments.
    pub fn parse(permission: &'a str) -> Result<Self, ServiceError> {
        let mut parts = permission.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(resource), Some(action), None) if !resource.is_empty() && !action.is_empty() => {
                Ok(Self { resource, action })
            }
            _ => Err(ServiceError::PermissionConfig(permission.to_string())),
        }
    }
}

/// Decide without touching storage. `membership` is the principal's row in
/// its organization, if one was found; it is ignored for guests and for
/// roles that bypass the map.
pub fn decide(
    principal: &Principal,
    permission: &str,
    membership: Option<&StaffMembership>,
) -> Result<Decision, ServiceError> {
    if principal.affiliation().is_none() {
        return Ok(Decision::Deny(DenyReason::NoAffiliation));
    }

    if principal.role.bypasses_permission_map() {
        return Ok(Decision::Allow);
    }

    let Some(membership) = membership else {
        return Ok(Decision::Deny(DenyReason::ProfileNotFound));
    };

    let permission = Permission::parse(permission)?;
    if membership
        .permissions
        .is_allowed(permission.resource, permission.action)
    {
        Ok(Decision::Allow)
    } else {
        Ok(Decision::Deny(DenyReason::NotGranted))
    }
}

/// [`decide`] plus the membership lookup it needs.
#[derive(Clone)]
pub struct PermissionEvaluator {
    store: Arc<dyn Store>,
}

impl PermissionEvaluator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id, role = %principal.role))]
    pub async fn allowed(
        &self,
        principal: &Principal,
        permission: &str,
    ) -> Result<Decision, ServiceError> {
        let membership = match principal.affiliation() {
            Some(org_id) if !principal.role.bypasses_permission_map() => {
                self.store.find_membership(principal.user_id, org_id).await?
            }
            _ => None,
        };

        let decision = decide(principal, permission, membership.as_ref())?;
        metrics::record_authorization_decision(decision.label());

        if !decision.is_allowed() {
            tracing::info!(?decision, "Permission denied");
        }

        Ok(decision)
    }

    pub async fn allowed_action(
        &self,
        principal: &Principal,
        resource: &str,
        action: &str,
    ) -> Result<Decision, ServiceError> {
        self.allowed(principal, &format!("{}.{}", resource, action))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewStaffMembership, PermissionMap, Role};
    use crate::services::store::{FailPoint, MemoryStore};
    use chrono::Utc;
    use uuid::Uuid;

    fn principal(role: Role, org_id: Option<Uuid>) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            org_id,
            role,
        }
    }

    fn membership(principal: &Principal, permissions: PermissionMap) -> StaffMembership {
        StaffMembership {
            id: Uuid::new_v4(),
            org_id: principal.org_id.unwrap(),
            user_id: principal.user_id,
            role: principal.role.clone(),
            permissions,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_permission() {
        let parsed = Permission::parse("invoices.read").unwrap();
        assert_eq!(parsed.resource, "invoices");
        assert_eq!(parsed.action, "read");

        for bad in ["invoices", "invoices.", ".read", "a.b.c", ""] {
            assert!(
                matches!(Permission::parse(bad), Err(ServiceError::PermissionConfig(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_admin_and_owner_always_allowed() {
        for role in [Role::Admin, Role::Owner] {
            let p = principal(role, Some(Uuid::new_v4()));
            assert_eq!(decide(&p, "anything.at_all", None).unwrap(), Decision::Allow);
        }
    }

    #[test]
    fn test_guest_always_denied() {
        let p = principal(Role::Guest, Some(Uuid::new_v4()));
        let everything = PermissionMap::new().with("invoices", "read", true).unwrap();
        let row = membership(&p, everything);

        assert_eq!(
            decide(&p, "invoices.read", Some(&row)).unwrap(),
            Decision::Deny(DenyReason::NoAffiliation)
        );
    }

    #[test]
    fn test_missing_org_denied_even_for_admin() {
        let p = principal(Role::Admin, None);
        assert_eq!(
            decide(&p, "invoices.read", None).unwrap(),
            Decision::Deny(DenyReason::NoAffiliation)
        );
    }

    #[test]
    fn test_staff_follows_map() {
        let p = principal(Role::Staff, Some(Uuid::new_v4()));
        let map = PermissionMap::new()
            .with("invoices", "read", true)
            .unwrap()
            .with("invoices", "delete", false)
            .unwrap();
        let row = membership(&p, map);

        assert_eq!(decide(&p, "invoices.read", Some(&row)).unwrap(), Decision::Allow);
        assert_eq!(
            decide(&p, "invoices.delete", Some(&row)).unwrap(),
            Decision::Deny(DenyReason::NotGranted)
        );
        assert_eq!(
            decide(&p, "invoices.create", Some(&row)).unwrap(),
            Decision::Deny(DenyReason::NotGranted)
        );
        assert_eq!(
            decide(&p, "payroll.read", Some(&row)).unwrap(),
            Decision::Deny(DenyReason::NotGranted)
        );
    }

    #[test]
    fn test_custom_role_follows_map() {
        let p = principal(Role::from("accountant"), Some(Uuid::new_v4()));
        let row = membership(&p, PermissionMap::new().with("ledger", "read", true).unwrap());

        assert_eq!(decide(&p, "ledger.read", Some(&row)).unwrap(), Decision::Allow);
        assert!(!decide(&p, "ledger.write", Some(&row)).unwrap().is_allowed());
    }

    #[test]
    fn test_staff_without_profile_denied() {
        let p = principal(Role::Staff, Some(Uuid::new_v4()));
        assert_eq!(
            decide(&p, "invoices.read", None).unwrap(),
            Decision::Deny(DenyReason::ProfileNotFound)
        );
    }

    #[test]
    fn test_malformed_permission_only_fails_map_lookups() {
        let admin = principal(Role::Admin, Some(Uuid::new_v4()));
        let guest = principal(Role::Guest, Some(Uuid::new_v4()));
        let staff = principal(Role::Staff, Some(Uuid::new_v4()));
        let row = membership(&staff, PermissionMap::new());

        for bad in ["invoices", "staff.read.all"] {
            assert_eq!(decide(&admin, bad, None).unwrap(), Decision::Allow);
            assert_eq!(
                decide(&guest, bad, None).unwrap(),
                Decision::Deny(DenyReason::NoAffiliation)
            );
            assert!(matches!(
                decide(&staff, bad, Some(&row)),
                Err(ServiceError::PermissionConfig(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_evaluator_role_rules_precede_permission_parsing() {
        let evaluator = PermissionEvaluator::new(Arc::new(MemoryStore::default()));
        let admin = principal(Role::Admin, Some(Uuid::new_v4()));
        let guest = principal(Role::Guest, None);

        assert_eq!(
            evaluator.allowed_action(&admin, "staff", "read.all").await.unwrap(),
            Decision::Allow
        );
        assert_eq!(
            evaluator.allowed(&guest, "staff").await.unwrap(),
            Decision::Deny(DenyReason::NoAffiliation)
        );
    }

    #[tokio::test]
    async fn test_evaluator_loads_membership() {
        let store = MemoryStore::default();
        let org_id = Uuid::new_v4();
        let p = principal(Role::Staff, Some(org_id));
        store
            .seed_membership(&NewStaffMembership {
                org_id,
                user_id: p.user_id,
                role: Role::Staff,
                permissions: PermissionMap::new().with("staff", "read", true).unwrap(),
            })
            .unwrap();
        let evaluator = PermissionEvaluator::new(Arc::new(store));

        assert_eq!(evaluator.allowed(&p, "staff.read").await.unwrap(), Decision::Allow);
        assert_eq!(
            evaluator.allowed_action(&p, "staff", "manage").await.unwrap(),
            Decision::Deny(DenyReason::NotGranted)
        );
    }

    #[tokio::test]
    async fn test_evaluator_storage_failure_is_error() {
        let store = MemoryStore::default();
        store.fail_at(FailPoint::FindMembership);
        let evaluator = PermissionEvaluator::new(Arc::new(store.clone()));
        let p = principal(Role::Staff, Some(Uuid::new_v4()));

        assert!(matches!(
            evaluator.allowed(&p, "staff.read").await,
            Err(ServiceError::Store(_))
        ));

        // Admins never reach storage.
        let admin = principal(Role::Admin, Some(Uuid::new_v4()));
        assert_eq!(evaluator.allowed(&admin, "staff.read").await.unwrap(), Decision::Allow);
    }
}
