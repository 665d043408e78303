use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Replacement permission map. Shape is checked when converted into a
/// `PermissionMap`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePermissionsRequest {
    #[schema(value_type = Object, example = json!({"invoices": {"read": true, "delete": false}}))]
    pub permissions: serde_json::Value,
}
