//! User model - one account per email address.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Authentication provider recorded for password accounts.
pub const EMAIL_PROVIDER: &str = "email";

/// User row. `password_hash` is an Argon2 PHC string.
#[derive(Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub password_hash: String,
    pub auth_provider: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub profile_image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("auth_provider", &self.auth_provider)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Fields supplied when creating a user; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_prints_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            email_verified: false,
            password_hash: "$argon2id$v=19$secret".to_string(),
            auth_provider: EMAIL_PROVIDER.to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            phone: None,
            profile_image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let rendered = format!("{:?}", user);
        assert!(rendered.contains("a@x.com"));
        assert!(!rendered.contains("argon2"));
    }
}
