use sqlx::{Executor, Postgres};

use crate::models::{organization::generate_slug, NewOrganization, Organization};

/// Insert an organization; the slug is derived from its name.
pub async fn insert<'e, E>(
    executor: E,
    organization: &NewOrganization,
) -> Result<Organization, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Organization>(
        r#"
        INSERT INTO organizations (name, slug, owner_user_id)
        VALUES ($1, $2, $3)
        RETURNING id, name, slug, owner_user_id, created_at, updated_at
        "#,
    )
    .bind(&organization.name)
    .bind(generate_slug(&organization.name))
    .bind(organization.owner_user_id)
    .fetch_one(executor)
    .await
}
