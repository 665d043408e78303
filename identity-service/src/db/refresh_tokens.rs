use sqlx::{Executor, Postgres};

use crate::models::{NewRefreshToken, RefreshToken};

pub async fn insert<'e, E>(executor: E, token: &NewRefreshToken) -> Result<RefreshToken, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, RefreshToken>(
        r#"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, token_hash, expires_at, created_at
        "#,
    )
    .bind(token.user_id)
    .bind(&token.token_hash)
    .bind(token.expires_at)
    .fetch_one(executor)
    .await
}
