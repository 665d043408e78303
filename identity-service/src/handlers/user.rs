use service_core::{axum::response::IntoResponse, response::ApiResponse};

use crate::{middleware::AuthPrincipal, models::Principal};

/// The principal behind the presented access token
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Authenticated principal", body = Principal),
        (status = 401, description = "Missing, malformed or expired token")
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(AuthPrincipal(principal): AuthPrincipal) -> impl IntoResponse {
    ApiResponse::ok(principal)
}
