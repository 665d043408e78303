use chrono::{DateTime, Utc};
use sqlx::{types::Json, Executor, FromRow, Postgres};
use uuid::Uuid;

use crate::models::{NewStaffMembership, PermissionMap, PermissionMapError, Role, StaffMembership};

const STAFF_COLUMNS: &str = "id, org_id, user_id, role, permissions, created_at, updated_at";

/// Raw `staff` row; the permission document is validated on conversion.
#[derive(Debug, FromRow)]
pub struct StaffRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub permissions: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<StaffRow> for StaffMembership {
    type Error = PermissionMapError;

    fn try_from(row: StaffRow) -> Result<Self, Self::Error> {
        Ok(StaffMembership {
            id: row.id,
            org_id: row.org_id,
            user_id: row.user_id,
            role: Role::from(row.role),
            permissions: PermissionMap::from_json(row.permissions.0)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert<'e, E>(
    executor: E,
    membership: &NewStaffMembership,
) -> Result<StaffRow, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, StaffRow>(&format!(
        r#"
        INSERT INTO staff (org_id, user_id, role, permissions)
        VALUES ($1, $2, $3, $4)
        RETURNING {STAFF_COLUMNS}
        "#
    ))
    .bind(membership.org_id)
    .bind(membership.user_id)
    .bind(membership.role.as_str())
    .bind(Json(membership.permissions.to_json()))
    .fetch_one(executor)
    .await
}

pub async fn find_first_for_user<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<StaffRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, StaffRow>(&format!(
        "SELECT {STAFF_COLUMNS} FROM staff WHERE user_id = $1 ORDER BY created_at, id LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn find<'e, E>(
    executor: E,
    user_id: Uuid,
    org_id: Uuid,
) -> Result<Option<StaffRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, StaffRow>(&format!(
        "SELECT {STAFF_COLUMNS} FROM staff WHERE user_id = $1 AND org_id = $2"
    ))
    .bind(user_id)
    .bind(org_id)
    .fetch_optional(executor)
    .await
}

pub async fn list_for_org<'e, E>(executor: E, org_id: Uuid) -> Result<Vec<StaffRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, StaffRow>(&format!(
        "SELECT {STAFF_COLUMNS} FROM staff WHERE org_id = $1 ORDER BY created_at, id"
    ))
    .bind(org_id)
    .fetch_all(executor)
    .await
}

pub async fn update_permissions<'e, E>(
    executor: E,
    org_id: Uuid,
    staff_id: Uuid,
    permissions: &PermissionMap,
) -> Result<Option<StaffRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, StaffRow>(&format!(
        r#"
        UPDATE staff
        SET permissions = $3, updated_at = NOW()
        WHERE id = $1 AND org_id = $2
        RETURNING {STAFF_COLUMNS}
        "#
    ))
    .bind(staff_id)
    .bind(org_id)
    .bind(Json(permissions.to_json()))
    .fetch_optional(executor)
    .await
}
