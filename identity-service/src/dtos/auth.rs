use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Missing fields deserialize as empty strings so they are reported per
/// field by validation rather than as an unparsable body.
#[derive(Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "Secretpass1", min_length = 8)]
    pub password: String,

    #[validate(length(min = 1, message = "First name is required"))]
    #[schema(example = "Ada")]
    pub first_name: String,

    #[validate(length(min = 1, message = "Last name is required"))]
    #[schema(example = "Lovelace")]
    pub last_name: String,

    #[validate(length(min = 1, message = "Organization name is required"))]
    #[schema(example = "Acme")]
    pub org_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub user_id: Uuid,
    #[schema(example = "6ba7b810-9dad-11d1-80b4-00c04fd430c8")]
    pub org_id: Uuid,
    #[schema(example = "Registration successful")]
    pub message: String,
}

#[derive(Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "Secretpass1")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub refresh_token: String,
}
