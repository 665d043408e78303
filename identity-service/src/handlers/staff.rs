use service_core::{
    axum::{
        extract::{Path, State},
        response::IntoResponse,
    },
    error::AppError,
    response::ApiResponse,
};
use uuid::Uuid;

use crate::{
    dtos::UpdatePermissionsRequest,
    middleware::AuthPrincipal,
    models::{PermissionMap, StaffMembership},
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

fn organization_of(principal: &crate::models::Principal) -> Result<Uuid, AppError> {
    // The permission gate already denies principals without an organization.
    principal
        .affiliation()
        .ok_or_else(|| AppError::Forbidden(anyhow::anyhow!("Insufficient permissions")))
}

/// List the staff memberships of the caller's organization
#[utoipa::path(
    get,
    path = "/api/v1/staff",
    responses(
        (status = 200, description = "Memberships in the caller's organization", body = Vec<StaffMembership>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing staff.read")
    ),
    tag = "Staff",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_staff(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<impl IntoResponse, AppError> {
    let org_id = organization_of(&principal)?;
    let staff = state
        .store
        .list_memberships(org_id)
        .await
        .map_err(ServiceError::from)?;

    Ok(ApiResponse::ok(staff))
}

/// Replace the permission map of one membership
#[utoipa::path(
    put,
    path = "/api/v1/staff/{staff_id}/permissions",
    params(
        ("staff_id" = Uuid, Path, description = "Membership id")
    ),
    request_body = UpdatePermissionsRequest,
    responses(
        (status = 200, description = "Updated membership", body = StaffMembership),
        (status = 400, description = "Malformed permission map"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing staff.manage"),
        (status = 404, description = "No such membership in the caller's organization")
    ),
    tag = "Staff",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_permissions(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(staff_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdatePermissionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let org_id = organization_of(&principal)?;
    let permissions = PermissionMap::from_json(req.permissions)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let updated = state
        .store
        .update_permissions(org_id, staff_id, &permissions)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| ServiceError::NotFound("Staff member not found".to_string()))?;

    tracing::info!(
        staff_id = %staff_id,
        org_id = %org_id,
        updated_by = %principal.user_id,
        "Staff permissions replaced"
    );

    Ok(ApiResponse::ok(updated))
}
