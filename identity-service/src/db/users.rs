use sqlx::{Executor, Postgres};

use crate::models::{NewUser, User, EMAIL_PROVIDER};

const USER_COLUMNS: &str = "id, email, email_verified, password_hash, auth_provider, first_name, \
     last_name, phone, profile_image_url, is_active, created_at, updated_at";

pub async fn insert<'e, E>(executor: E, user: &NewUser) -> Result<User, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (email, password_hash, auth_provider, first_name, last_name, is_active)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(EMAIL_PROVIDER)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .fetch_one(executor)
    .await
}

pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(executor)
    .await
}
