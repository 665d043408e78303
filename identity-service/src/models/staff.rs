//! Staff membership - binds a user to an organization with a role and a
//! two-level `resource -> action -> allowed` permission map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role label carried by a membership and by access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Admin,
    Staff,
    Guest,
    /// Any other label. Evaluated through the permission map like `Staff`.
    Custom(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Guest => "guest",
            Role::Custom(label) => label,
        }
    }

    /// Owners and admins are never checked against the stored map.
    pub fn bypasses_permission_map(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl From<String> for Role {
    fn from(label: String) -> Self {
        match label.as_str() {
            "owner" => Role::Owner,
            "admin" => Role::Admin,
            "staff" => Role::Staff,
            "guest" => Role::Guest,
            _ => Role::Custom(label),
        }
    }
}

impl From<&str> for Role {
    fn from(label: &str) -> Self {
        Role::from(label.to_string())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Role::from)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionMapError {
    #[error("permission document must map resource names to objects of booleans: {0}")]
    Shape(String),

    #[error("invalid {kind} name {name:?}: names must be non-empty and contain no '.' or whitespace")]
    InvalidKey { kind: &'static str, name: String },
}

type RawPermissions = BTreeMap<String, BTreeMap<String, bool>>;

/// Validated permission document. Keys are checked on every construction
/// path, so a value of this type is always well formed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawPermissions")]
#[schema(value_type = Object, example = json!({"staff": {"read": true, "manage": false}}))]
pub struct PermissionMap(RawPermissions);

fn validate_key(kind: &'static str, name: &str) -> Result<(), PermissionMapError> {
    if name.is_empty() || name.contains('.') || name.chars().any(char::is_whitespace) {
        return Err(PermissionMapError::InvalidKey {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

impl TryFrom<RawPermissions> for PermissionMap {
    type Error = PermissionMapError;

    fn try_from(raw: RawPermissions) -> Result<Self, Self::Error> {
        for (resource, actions) in &raw {
            validate_key("resource", resource)?;
            for action in actions.keys() {
                validate_key("action", action)?;
            }
        }
        Ok(Self(raw))
    }
}

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored JSON document, rejecting anything that is not
    /// `{resource: {action: bool}}` with valid names.
    pub fn from_json(value: serde_json::Value) -> Result<Self, PermissionMapError> {
        let raw: RawPermissions = serde_json::from_value(value)
            .map_err(|e| PermissionMapError::Shape(e.to_string()))?;
        Self::try_from(raw)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_else(|_| serde_json::json!({}))
    }

    pub fn set(
        &mut self,
        resource: &str,
        action: &str,
        allowed: bool,
    ) -> Result<(), PermissionMapError> {
        validate_key("resource", resource)?;
        validate_key("action", action)?;
        self.0
            .entry(resource.to_string())
            .or_default()
            .insert(action.to_string(), allowed);
        Ok(())
    }

    /// Builder form of [`PermissionMap::set`].
    pub fn with(mut self, resource: &str, action: &str, allowed: bool) -> Result<Self, PermissionMapError> {
        self.set(resource, action, allowed)?;
        Ok(self)
    }

    /// True only when the entry exists and is `true`.
    pub fn is_allowed(&self, resource: &str, action: &str) -> bool {
        self.0
            .get(resource)
            .and_then(|actions| actions.get(action))
            .copied()
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StaffMembership {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = String, example = "staff")]
    pub role: Role,
    pub permissions: PermissionMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStaffMembership {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub permissions: PermissionMap,
}

impl NewStaffMembership {
    /// The membership created with a new organization.
    pub fn founding_admin(org_id: Uuid, user_id: Uuid) -> Self {
        Self {
            org_id,
            user_id,
            role: Role::Admin,
            permissions: PermissionMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_round_trips_known_labels() {
        for label in ["owner", "admin", "staff", "guest"] {
            assert_eq!(Role::from(label).as_str(), label);
        }
        assert_eq!(Role::from("auditor"), Role::Custom("auditor".to_string()));
        assert!(Role::Admin.bypasses_permission_map());
        assert!(Role::Owner.bypasses_permission_map());
        assert!(!Role::Staff.bypasses_permission_map());
        assert!(!Role::from("auditor").bypasses_permission_map());
    }

    #[test]
    fn test_is_allowed_requires_explicit_true() {
        let map = PermissionMap::from_json(json!({
            "orders": {"read": true, "delete": false}
        }))
        .unwrap();

        assert!(map.is_allowed("orders", "read"));
        assert!(!map.is_allowed("orders", "delete"));
        assert!(!map.is_allowed("orders", "update"));
        assert!(!map.is_allowed("invoices", "read"));
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(matches!(
            PermissionMap::from_json(json!({"orders": {"read": "yes"}})),
            Err(PermissionMapError::Shape(_))
        ));
        assert!(matches!(
            PermissionMap::from_json(json!(["orders.read"])),
            Err(PermissionMapError::Shape(_))
        ));
        assert!(matches!(
            PermissionMap::from_json(json!({"orders.v2": {"read": true}})),
            Err(PermissionMapError::InvalidKey { kind: "resource", .. })
        ));
        assert!(matches!(
            PermissionMap::from_json(json!({"orders": {"": true}})),
            Err(PermissionMapError::InvalidKey { kind: "action", .. })
        ));
    }

    #[test]
    fn test_deserialize_validates_keys() {
        let parsed: Result<PermissionMap, _> =
            serde_json::from_value(json!({"staff members": {"read": true}}));
        assert!(parsed.is_err());

        let parsed: PermissionMap = serde_json::from_value(json!({"staff": {"read": true}})).unwrap();
        assert!(parsed.is_allowed("staff", "read"));
    }

    #[test]
    fn test_set_and_serialize() {
        let map = PermissionMap::new()
            .with("staff", "read", true)
            .unwrap()
            .with("staff", "manage", false)
            .unwrap();

        assert_eq!(map.to_json(), json!({"staff": {"manage": false, "read": true}}));
        assert!(PermissionMap::new().with("staff", "read.all", true).is_err());
    }

    #[test]
    fn test_founding_admin_has_empty_map() {
        let membership = NewStaffMembership::founding_admin(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(membership.role, Role::Admin);
        assert!(membership.permissions.is_empty());
    }
}
