use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifetime of a refresh token.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Persisted refresh token. Only the SHA-256 digest of the raw value is kept.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Hash a token using SHA-256
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Row to insert for a freshly issued refresh token.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl NewRefreshToken {
    /// Record for `raw_token` issued at `now`, expiring after the fixed lifetime.
    pub fn issue(user_id: Uuid, raw_token: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            token_hash: RefreshToken::hash_token(raw_token),
            expires_at: now + Duration::days(REFRESH_TOKEN_TTL_DAYS),
        }
    }
}
